//! Collection profile registry.
//!
//! Built-in profiles are constructed once and shared; a [`ProfileRegistry`]
//! layers the configured `[[collections]]` on top, replacing a built-in with the
//! same name or adding a new collection.

use once_cell::sync::Lazy;

use crate::config::PlannerConfig;
use crate::errors::PlannerError;
use crate::types::{CollectionProfile, builtin_profiles};

static BUILTIN: Lazy<Vec<CollectionProfile>> = Lazy::new(builtin_profiles);

/// Look up a built-in profile by name.
pub fn builtin_profile(name: &str) -> Option<&'static CollectionProfile> {
    BUILTIN.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRegistry {
    profiles: Vec<CollectionProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN.clone(),
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Result<Self, PlannerError> {
        let mut registry = Self::builtin();
        for profile in &config.collections {
            registry.register(profile.clone())?;
        }
        Ok(registry)
    }

    /// Add a profile, replacing any existing one with the same name.
    pub fn register(&mut self, profile: CollectionProfile) -> Result<(), PlannerError> {
        profile.validate()?;
        match self.profiles.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&profile.name)) {
            Some(existing) => {
                log::debug!("overriding built-in collection profile `{}`", profile.name);
                *existing = profile;
            }
            None => self.profiles.push(profile),
        }
        Ok(())
    }

    /// Find a profile by its name or by the collection it queries.
    pub fn get(&self, name: &str) -> Option<&CollectionProfile> {
        let name = name.trim();
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .or_else(|| self.profiles.iter().find(|p| p.collection == name))
    }

    pub fn resolve(&self, name: &str) -> Result<&CollectionProfile, PlannerError> {
        self.get(name).ok_or_else(|| PlannerError::UnknownCollection {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionProfile> {
        self.profiles.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_every_listing_collection() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["hotels", "restaurants", "attractions", "sports", "events"]
        );
        assert!(builtin_profile("HOTELS").is_some());
    }

    #[test]
    fn lookup_accepts_profile_or_collection_name() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.get("sports_facilities").map(|p| p.name.as_str()), Some("sports"));
        assert_eq!(registry.get(" Sports ").map(|p| p.collection.as_str()), Some("sports_facilities"));
    }

    #[test]
    fn unknown_collection_is_a_client_error() {
        let err = ProfileRegistry::builtin().resolve("spaceships").expect_err("unknown");
        assert!(matches!(err, PlannerError::UnknownCollection { ref name } if name == "spaceships"));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn configured_profiles_override_and_extend() {
        let config = PlannerConfig {
            collections: vec![
                CollectionProfile::listing("hotels").with_collection("hotels_v2"),
                CollectionProfile::listing("hostels"),
            ],
            ..PlannerConfig::default()
        };
        let registry = ProfileRegistry::from_config(&config).expect("registry");
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.resolve("hotels").expect("hotels").collection, "hotels_v2");
        assert!(registry.get("hostels").is_some());
    }
}
