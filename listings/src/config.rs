//! Planner configuration.
//!
//! Loaded from TOML; every key is optional and falls back to the defaults below.
//!
//! ```toml
//! max_page_size = 50
//! default_max_distance_km = 5.0
//!
//! [ranking]
//! rating = 0.3
//! views = 0.0001
//! featured = 2.0
//! promoted = 1.0
//!
//! [[collections]]
//! name = "hostels"
//! collection = "hostels"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::PlannerError;
use crate::planner::ranking::RankingWeights;
use crate::search::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::types::CollectionProfile;

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 10.0;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_page_size: u64,
    pub default_page_size: u64,
    /// Radius applied when a request carries an origin but no distance.
    pub default_max_distance_km: f64,
    pub query_timeout_ms: u64,
    pub ranking: RankingWeights,
    /// Extra profiles, or overrides of built-in profiles with the same name.
    pub collections: Vec<CollectionProfile>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_page_size: MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            default_max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            ranking: RankingWeights::default(),
            collections: Vec::new(),
        }
    }
}

impl PlannerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, PlannerError> {
        let config: Self = toml::from_str(raw).map_err(|err| PlannerError::Config {
            message: format!("failed to parse planner config: {err}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| PlannerError::Config {
            message: format!("failed to read {}: {err}", path.display()),
        })?;
        log::debug!("loaded planner config from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, PlannerError> {
        toml::to_string_pretty(self).map_err(|err| PlannerError::Config {
            message: format!("failed to serialize planner config: {err}"),
        })
    }

    #[inline]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        let fail = |message: &str| {
            Err(PlannerError::Config {
                message: message.to_string(),
            })
        };

        if self.max_page_size == 0 {
            return fail("max_page_size must be greater than 0");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return fail("default_page_size must be between 1 and max_page_size");
        }
        if !(self.default_max_distance_km.is_finite() && self.default_max_distance_km > 0.0) {
            return fail("default_max_distance_km must be a positive number");
        }
        if self.query_timeout_ms == 0 {
            return fail("query_timeout_ms must be greater than 0");
        }
        self.ranking.validate()?;

        for (i, profile) in self.collections.iter().enumerate() {
            profile.validate()?;
            if self.collections[..i].iter().any(|p| p.name == profile.name) {
                return Err(PlannerError::Config {
                    message: format!("collection `{}` is configured twice", profile.name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PlannerConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, PlannerConfig::default());
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_toml_overrides_selected_keys() {
        let config = PlannerConfig::from_toml_str(
            r#"
            max_page_size = 50
            default_page_size = 12

            [ranking]
            featured = 3.0

            [[collections]]
            name = "hostels"
            collection = "hostels_v2"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 12);
        assert_eq!(config.ranking.featured, 3.0);
        assert_eq!(config.ranking.rating, 0.3);
        assert_eq!(config.collections.len(), 1);
        assert_eq!(config.collections[0].collection, "hostels_v2");
        assert_eq!(config.collections[0].status_field, "status");
    }

    #[test]
    fn rejects_default_page_size_above_max() {
        let err = PlannerConfig::from_toml_str("max_page_size = 10\ndefault_page_size = 20")
            .expect_err("inconsistent sizes should fail");
        assert!(matches!(err, PlannerError::Config { .. }));
    }

    #[test]
    fn rejects_duplicate_collections() {
        let raw = "[[collections]]\nname = \"a\"\n[[collections]]\nname = \"a\"\n";
        assert!(PlannerConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "default_max_distance_km = 2.5").expect("write config");
        let config = PlannerConfig::load(file.path()).expect("config should load");
        assert_eq!(config.default_max_distance_km, 2.5);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = PlannerConfig::default();
        let raw = config.to_toml_string().expect("serialize");
        assert_eq!(PlannerConfig::from_toml_str(&raw).expect("parse"), config);
    }
}
