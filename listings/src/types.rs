use serde::{Deserialize, Serialize};

use crate::errors::PlannerError;
use crate::pipeline::{DISTANCE_FIELD, POPULARITY_FIELD, SCORE_FIELD};
use crate::search::SortOrder;

/// Sort names the planner resolves itself; profiles may not redefine them.
pub const RESERVED_SORTS: [&str; 2] = ["distance", "relevance"];

/// A text-indexed field and its weight inside the compound text index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextField {
    pub path: String,
    #[serde(default = "default_text_weight")]
    pub weight: u32,
}

fn default_text_weight() -> u32 {
    1
}

impl TextField {
    pub fn new(path: impl Into<String>, weight: u32) -> Self {
        Self {
            path: path.into(),
            weight,
        }
    }
}

/// Public range-filter name mapped onto the document path it constrains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeField {
    pub name: String,
    pub path: String,
}

impl RangeField {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Public sort name mapped onto a document path and its natural direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub default_order: SortOrder,
}

impl SortField {
    pub fn new(name: impl Into<String>, path: impl Into<String>, default_order: SortOrder) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            default_order,
        }
    }
}

/// Per-collection field layout consumed by the generic planner.
///
/// One profile replaces what would otherwise be a hand-written query function per
/// collection: every field name the planner touches is looked up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionProfile {
    /// Public name used in URLs and on the CLI (e.g. `hotels`).
    pub name: String,
    /// Storage collection the pipeline runs against.
    pub collection: String,
    pub status_field: String,
    /// Status value of publicly visible documents. Applied to every query.
    pub visible_status: String,
    pub text_fields: Vec<TextField>,
    pub category_field: String,
    pub amenities_field: String,
    pub area_field: String,
    /// GeoJSON point field carrying the 2dsphere index.
    pub location_field: String,
    pub rating_field: String,
    pub views_field: String,
    pub featured_field: String,
    pub promoted_field: String,
    pub created_field: String,
    pub ranges: Vec<RangeField>,
    pub sorts: Vec<SortField>,
    pub default_sort: String,
    /// Heavy fields dropped from list results.
    pub exclude_fields: Vec<String>,
}

impl Default for CollectionProfile {
    fn default() -> Self {
        Self::listing("listings")
    }
}

impl CollectionProfile {
    /// Base layout shared by every listing collection.
    pub fn listing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collection: name.to_string(),
            status_field: "status".to_string(),
            visible_status: "published".to_string(),
            text_fields: vec![
                TextField::new("name", 10),
                TextField::new("tags", 5),
                TextField::new("area", 3),
                TextField::new("description", 1),
            ],
            category_field: "category".to_string(),
            amenities_field: "amenities".to_string(),
            area_field: "area".to_string(),
            location_field: "location".to_string(),
            rating_field: "rating.average".to_string(),
            views_field: "views".to_string(),
            featured_field: "isFeatured".to_string(),
            promoted_field: "isPromoted".to_string(),
            created_field: "createdAt".to_string(),
            ranges: vec![RangeField::new("price", "price")],
            sorts: vec![
                SortField::new("popularity", SCORE_FIELD, SortOrder::Desc),
                SortField::new("rating", "rating.average", SortOrder::Desc),
                SortField::new("price", "price", SortOrder::Asc),
                SortField::new("newest", "createdAt", SortOrder::Desc),
                SortField::new("name", "name", SortOrder::Asc),
            ],
            default_sort: "popularity".to_string(),
            exclude_fields: vec!["reviews".to_string(), "gallery".to_string()],
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_category_field(mut self, field: impl Into<String>) -> Self {
        self.category_field = field.into();
        self
    }

    pub fn with_amenities_field(mut self, field: impl Into<String>) -> Self {
        self.amenities_field = field.into();
        self
    }

    /// Point the `price` range and sort at a collection-specific path.
    pub fn with_price_path(mut self, path: &str) -> Self {
        for range in self.ranges.iter_mut().filter(|r| r.name == "price") {
            range.path = path.to_string();
        }
        for sort in self.sorts.iter_mut().filter(|s| s.name == "price") {
            sort.path = path.to_string();
        }
        self
    }

    pub fn with_range(mut self, range: RangeField) -> Self {
        self.ranges.retain(|r| r.name != range.name);
        self.ranges.push(range);
        self
    }

    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sorts.retain(|s| s.name != sort.name);
        self.sorts.push(sort);
        self
    }

    pub fn range_field(&self, name: &str) -> Option<&RangeField> {
        self.ranges.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn sort_field(&self, name: &str) -> Option<&SortField> {
        self.sorts.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Check the profile is internally consistent before it is registered.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let fail = |message: String| PlannerError::Config { message };

        if self.name.trim().is_empty() {
            return Err(fail("collection profile requires a name".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(fail(format!("profile `{}` has no storage collection", self.name)));
        }
        if self.visible_status.trim().is_empty() {
            return Err(fail(format!("profile `{}` has an empty visible status", self.name)));
        }
        for (i, sort) in self.sorts.iter().enumerate() {
            if RESERVED_SORTS.iter().any(|r| sort.name.eq_ignore_ascii_case(r)) {
                return Err(fail(format!(
                    "profile `{}` redefines reserved sort `{}`",
                    self.name, sort.name
                )));
            }
            if self.sorts[..i].iter().any(|s| s.name.eq_ignore_ascii_case(&sort.name)) {
                return Err(fail(format!("profile `{}` repeats sort `{}`", self.name, sort.name)));
            }
        }
        if self.sort_field(&self.default_sort).is_none() {
            return Err(fail(format!(
                "profile `{}` default sort `{}` is not a declared sort",
                self.name, self.default_sort
            )));
        }
        for (i, range) in self.ranges.iter().enumerate() {
            if self.ranges[..i].iter().any(|r| r.name.eq_ignore_ascii_case(&range.name)) {
                return Err(fail(format!("profile `{}` repeats range `{}`", self.name, range.name)));
            }
        }
        if self
            .exclude_fields
            .iter()
            .any(|f| f == DISTANCE_FIELD || f == SCORE_FIELD || f == POPULARITY_FIELD)
        {
            return Err(fail(format!(
                "profile `{}` cannot exclude planner-computed fields",
                self.name
            )));
        }
        Ok(())
    }
}

/// Profiles for the collections the listing platform ships with.
pub fn builtin_profiles() -> Vec<CollectionProfile> {
    vec![
        CollectionProfile::listing("hotels")
            .with_price_path("pricePerNight")
            .with_range(RangeField::new("stars", "starRating"))
            .with_sort(SortField::new("stars", "starRating", SortOrder::Desc)),
        CollectionProfile::listing("restaurants")
            .with_category_field("cuisine")
            .with_amenities_field("features")
            .with_price_path("averageCostForTwo"),
        CollectionProfile::listing("attractions")
            .with_amenities_field("facilities")
            .with_price_path("entryFee"),
        CollectionProfile::listing("sports")
            .with_collection("sports_facilities")
            .with_category_field("sportType")
            .with_amenities_field("facilities")
            .with_price_path("pricePerHour")
            .with_range(RangeField::new("capacity", "capacity")),
        CollectionProfile::listing("events")
            .with_category_field("eventType")
            .with_amenities_field("tags")
            .with_price_path("ticketPrice")
            .with_sort(SortField::new("date", "startDate", SortOrder::Asc)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_are_valid() {
        for profile in builtin_profiles() {
            profile.validate().expect("builtin profile should validate");
        }
    }

    #[test]
    fn price_path_override_updates_range_and_sort() {
        let profile = CollectionProfile::listing("hotels").with_price_path("pricePerNight");
        assert_eq!(profile.range_field("price").map(|r| r.path.as_str()), Some("pricePerNight"));
        assert_eq!(profile.sort_field("PRICE").map(|s| s.path.as_str()), Some("pricePerNight"));
    }

    #[test]
    fn validate_rejects_reserved_sort_names() {
        let profile = CollectionProfile::listing("hotels").with_sort(SortField::new(
            "distance",
            "distance",
            SortOrder::Asc,
        ));
        let err = profile.validate().expect_err("reserved sort should fail");
        assert!(matches!(err, PlannerError::Config { message } if message.contains("reserved sort")));
    }

    #[test]
    fn validate_rejects_unknown_default_sort() {
        let mut profile = CollectionProfile::listing("events");
        profile.default_sort = "attendance".to_string();
        assert!(profile.validate().is_err());
    }
}
