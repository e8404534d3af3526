//! # Listing Search Requests
//!
//! Two layers:
//!
//! - [`SearchQuery`] is the loosely-typed parameter bag an HTTP handler deserializes
//!   from the query string. Every value is a string so malformed input surfaces as
//!   `InvalidParameter` naming the offending parameter instead of a serde error.
//! - [`FilterRequest`] is the normalized, typed request the planner consumes. It can
//!   also be built directly with the `with_*` builder methods.
//!
//! ```
//! use listings::search::{FilterRequest, SortOrder};
//!
//! let request = FilterRequest::new()
//!     .with_text("lake view")
//!     .with_categories(["boutique"])
//!     .with_range("price", Some(50.0), Some(200.0))
//!     .with_min_rating(4.0)
//!     .with_page(2, 10)
//!     .with_sort("price", Some(SortOrder::Asc));
//! assert_eq!(request.offset(), 10);
//! ```

use serde::{Deserialize, Serialize};

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::config::PlannerConfig;
use crate::errors::PlannerError;
use crate::filters::normalizers::{
    normalize_text, parse_bool, parse_f64, parse_list, parse_numeric_bound, parse_range_param, parse_sort_order,
    parse_u64,
};
use crate::pipeline::GeoPoint;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 100;

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Requested sort. A missing field means "the context default" (distance for
/// proximity searches, relevance for text searches, otherwise the profile default).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: Option<String>,
    pub order: Option<SortOrder>,
}

/// Inclusive numeric range over a profile-declared range name (e.g. `price`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub name: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeFilter {
    pub fn new(name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Proximity filter. Origin and distance always travel together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub origin: GeoPoint,
    pub max_distance_km: f64,
}

/// Normalized listing search request.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub text: Option<String>,
    /// Any-of category match.
    pub categories: Vec<String>,
    pub ranges: Vec<RangeFilter>,
    pub min_rating: Option<f64>,
    /// Any-of amenity/tag match.
    pub amenities: Vec<String>,
    /// Case-insensitive substring over the area field.
    pub area: Option<String>,
    pub featured_only: bool,
    pub geo: Option<GeoFilter>,
    pub page: u64,
    pub page_size: u64,
    pub sort: SortSpec,
}

impl Default for FilterRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRequest {
    pub fn new() -> Self {
        Self {
            text: None,
            categories: Vec::new(),
            ranges: Vec::new(),
            min_rating: None,
            amenities: Vec::new(),
            area: None,
            featured_only: false,
            geo: None,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortSpec::default(),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    #[inline]
    pub fn has_text_query(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    #[inline]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[inline]
    pub fn with_categories<S: Into<String>>(mut self, categories: impl IntoIterator<Item = S>) -> Self {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    #[inline]
    pub fn with_range(mut self, name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        self.ranges.push(RangeFilter::new(name, min, max));
        self
    }

    #[inline]
    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    #[inline]
    pub fn with_amenities<S: Into<String>>(mut self, amenities: impl IntoIterator<Item = S>) -> Self {
        self.amenities.extend(amenities.into_iter().map(Into::into));
        self
    }

    #[inline]
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    #[inline]
    pub fn featured_only(mut self) -> Self {
        self.featured_only = true;
        self
    }

    #[inline]
    pub fn near(mut self, latitude: f64, longitude: f64, max_distance_km: f64) -> Self {
        self.geo = Some(GeoFilter {
            origin: GeoPoint::new(latitude, longitude),
            max_distance_km,
        });
        self
    }

    #[inline]
    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    #[inline]
    pub fn with_sort(mut self, field: impl Into<String>, order: Option<SortOrder>) -> Self {
        self.sort = SortSpec {
            field: Some(field.into()),
            order,
        };
        self
    }
}

/// Raw query-string parameters as an HTTP handler receives them.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    /// Comma or pipe separated category list.
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_rating: Option<String>,
    /// Comma or pipe separated amenity list.
    pub amenities: Option<String>,
    pub area: Option<String>,
    pub featured: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// Kilometers.
    pub max_distance: Option<String>,
    /// Generic `name:min,max` ranges over profile-declared range fields.
    #[serde(default)]
    pub range: Vec<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SearchQuery {
    /// Parse the parameter bag into a [`FilterRequest`].
    ///
    /// Syntax errors are rejected here; semantic bounds (rating range, distance sign,
    /// known range and sort names) are enforced by the planner so that directly-built
    /// requests go through the same checks.
    pub fn into_request(self, config: &PlannerConfig) -> Result<FilterRequest, PlannerError> {
        let page = match parse_u64("page", self.page.as_deref())? {
            Some(0) => return Err(PlannerError::invalid_parameter("page", "page must be at least 1")),
            Some(page) => page,
            None => DEFAULT_PAGE,
        };
        let page_size = match parse_u64("page_size", self.page_size.as_deref())? {
            Some(0) => {
                return Err(PlannerError::invalid_parameter(
                    "page_size",
                    "page_size must be greater than 0",
                ));
            }
            Some(size) => size.min(config.max_page_size),
            None => config.default_page_size,
        };

        let mut request = FilterRequest::new().with_page(page, page_size);
        request.text = normalize_text(self.q.as_deref());

        if let Some(raw) = &self.category {
            request.categories = parse_list(raw);
        }
        if let Some(raw) = &self.amenities {
            request.amenities = parse_list(raw);
        }
        request.area = normalize_text(self.area.as_deref());

        if let Some(raw) = &self.featured {
            request.featured_only = parse_bool("featured", raw)?;
        }

        if let Some(raw) = self.min_rating.as_deref().filter(|s| !s.trim().is_empty()) {
            request.min_rating = Some(parse_f64("min_rating", raw)?);
        }

        let min_price = parse_numeric_bound("min_price", self.min_price.as_deref())?;
        let max_price = parse_numeric_bound("max_price", self.max_price.as_deref())?;
        if min_price.is_some() || max_price.is_some() {
            request.ranges.push(RangeFilter::new("price", min_price, max_price));
        }
        for raw in &self.range {
            request.ranges.push(parse_range_param(raw)?);
        }

        request.geo = parse_geo(
            self.lat.as_deref(),
            self.lng.as_deref(),
            self.max_distance.as_deref(),
            config.default_max_distance_km,
        )?;

        let field = self.sort_by.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let order = match self.sort_order.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(parse_sort_order("sort_order", raw)?),
            None => None,
        };
        request.sort = SortSpec { field, order };

        Ok(request)
    }
}

fn parse_geo(
    lat: Option<&str>,
    lng: Option<&str>,
    max_distance: Option<&str>,
    default_km: f64,
) -> Result<Option<GeoFilter>, PlannerError> {
    fn present(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|s| !s.is_empty())
    }

    match (present(lat), present(lng)) {
        (Some(lat), Some(lng)) => {
            let latitude = parse_f64("lat", lat)?;
            let longitude = parse_f64("lng", lng)?;
            let max_distance_km = match present(max_distance) {
                Some(raw) => parse_f64("max_distance", raw)?,
                None => default_km,
            };
            Ok(Some(GeoFilter {
                origin: GeoPoint::new(latitude, longitude),
                max_distance_km,
            }))
        }
        (None, None) => {
            if present(max_distance).is_some() {
                return Err(PlannerError::invalid_parameter(
                    "max_distance",
                    "max_distance requires lat and lng",
                ));
            }
            Ok(None)
        }
        (Some(_), None) => Err(PlannerError::invalid_parameter("lng", "lat was supplied without lng")),
        (None, Some(_)) => Err(PlannerError::invalid_parameter("lat", "lng was supplied without lat")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PlannerConfig {
        PlannerConfig::default()
    }

    #[test]
    fn into_request_applies_defaults() {
        let request = SearchQuery::default().into_request(&config()).expect("empty query should parse");
        assert_eq!(request, FilterRequest::new());
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 25);
    }

    #[test]
    fn into_request_caps_page_size_and_parses_sort() {
        let query = SearchQuery {
            page: Some("2".to_string()),
            page_size: Some("500".to_string()),
            sort_by: Some("price".to_string()),
            sort_order: Some("desc".to_string()),
            ..SearchQuery::default()
        };
        let request = query.into_request(&config()).expect("query should parse");
        assert_eq!(request.page, 2);
        assert_eq!(request.page_size, 100);
        assert_eq!(request.sort.field.as_deref(), Some("price"));
        assert_eq!(request.sort.order, Some(SortOrder::Desc));
    }

    #[test]
    fn into_request_rejects_zero_page_size() {
        let query = SearchQuery {
            page_size: Some("0".to_string()),
            ..SearchQuery::default()
        };
        let err = query.into_request(&config()).expect_err("zero page size should fail");
        assert!(matches!(err, PlannerError::InvalidParameter { field, .. } if field == "page_size"));
    }

    #[test]
    fn into_request_builds_price_range_from_single_bound() {
        let query = SearchQuery {
            min_price: Some("100".to_string()),
            ..SearchQuery::default()
        };
        let request = query.into_request(&config()).expect("query should parse");
        assert_eq!(request.ranges, vec![RangeFilter::new("price", Some(100.0), None)]);
    }

    #[test]
    fn into_request_parses_lists_and_flags() {
        let query = SearchQuery {
            q: Some("  rooftop   bar ".to_string()),
            category: Some("luxury|boutique".to_string()),
            amenities: Some("wifi,pool".to_string()),
            featured: Some("true".to_string()),
            range: vec!["stars:4,*".to_string()],
            ..SearchQuery::default()
        };
        let request = query.into_request(&config()).expect("query should parse");
        assert_eq!(request.text.as_deref(), Some("rooftop bar"));
        assert_eq!(request.categories, vec!["luxury", "boutique"]);
        assert_eq!(request.amenities, vec!["wifi", "pool"]);
        assert!(request.featured_only);
        assert_eq!(request.ranges, vec![RangeFilter::new("stars", Some(4.0), None)]);
    }

    #[test]
    fn geo_origin_without_distance_uses_configured_default() {
        let query = SearchQuery {
            lat: Some("22.5726".to_string()),
            lng: Some("88.3639".to_string()),
            ..SearchQuery::default()
        };
        let request = query.into_request(&config()).expect("query should parse");
        let geo = request.geo.expect("geo filter");
        assert_eq!(geo.origin, GeoPoint::new(22.5726, 88.3639));
        assert_eq!(geo.max_distance_km, config().default_max_distance_km);
    }

    #[test]
    fn blank_coordinates_count_as_absent_and_padded_ones_parse() {
        let blank = SearchQuery {
            lat: Some("   ".to_string()),
            lng: Some(String::new()),
            ..SearchQuery::default()
        };
        assert_eq!(blank.into_request(&config()).expect("blank geo").geo, None);

        let padded = SearchQuery {
            lat: Some(" 22.5726 ".to_string()),
            lng: Some("88.3639\t".to_string()),
            max_distance: Some(" 3 ".to_string()),
            ..SearchQuery::default()
        };
        let geo = padded.into_request(&config()).expect("padded geo").geo.expect("geo filter");
        assert_eq!(geo.origin, GeoPoint::new(22.5726, 88.3639));
        assert_eq!(geo.max_distance_km, 3.0);
    }

    #[test]
    fn geo_requires_both_coordinates() {
        let query = SearchQuery {
            lat: Some("22.5".to_string()),
            ..SearchQuery::default()
        };
        assert!(query.into_request(&config()).is_err());

        let query = SearchQuery {
            max_distance: Some("5".to_string()),
            ..SearchQuery::default()
        };
        let err = query.into_request(&config()).expect_err("distance without origin should fail");
        assert!(matches!(err, PlannerError::InvalidParameter { field, .. } if field == "max_distance"));
    }

    #[test]
    fn deserializes_from_json_params() {
        let query: SearchQuery = serde_json::from_value(serde_json::json!({
            "q": "spa",
            "page": "3",
            "range": ["capacity:10,50"]
        }))
        .expect("query should deserialize");
        assert_eq!(query.q.as_deref(), Some("spa"));
        assert_eq!(query.range.len(), 1);
    }
}
