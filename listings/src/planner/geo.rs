//! Proximity search clause.

use crate::errors::PlannerError;
use crate::pipeline::{DISTANCE_FIELD, GeoNearStage, GeoPoint, PipelineStage};
use crate::planner::predicate::PredicateDocument;

const METERS_PER_KM: f64 = 1000.0;

/// Wraps a predicate into a `$geoNear` stage keyed on a 2dsphere field.
#[derive(Debug, Clone, Copy)]
pub struct GeoClause<'a> {
    key: &'a str,
}

impl<'a> GeoClause<'a> {
    pub fn new(key: &'a str) -> Self {
        Self { key }
    }

    /// Embed `predicate` as the stage's own query. Callers must not emit a separate
    /// `Match` for the same predicate.
    pub fn apply(
        &self,
        predicate: PredicateDocument,
        origin: GeoPoint,
        max_distance_km: f64,
    ) -> Result<PipelineStage, PlannerError> {
        if !(max_distance_km.is_finite() && max_distance_km > 0.0) {
            return Err(PlannerError::invalid_parameter(
                "max_distance",
                format!("max distance must be a positive number of kilometers, got {}", max_distance_km),
            ));
        }
        if !(-90.0..=90.0).contains(&origin.latitude) {
            return Err(PlannerError::invalid_parameter(
                "lat",
                format!("latitude must be between -90 and 90, got {}", origin.latitude),
            ));
        }
        if !(-180.0..=180.0).contains(&origin.longitude) {
            return Err(PlannerError::invalid_parameter(
                "lng",
                format!("longitude must be between -180 and 180, got {}", origin.longitude),
            ));
        }
        // $geoNear cannot carry a $text query.
        if predicate.has_text() {
            return Err(PlannerError::invalid_parameter(
                "q",
                "free-text search cannot be combined with proximity search",
            ));
        }

        Ok(PipelineStage::GeoNear(GeoNearStage {
            near: origin,
            key: self.key.to_string(),
            distance_field: DISTANCE_FIELD.to_string(),
            max_distance_meters: max_distance_km * METERS_PER_KM,
            query: predicate,
            spherical: true,
        }))
    }
}
