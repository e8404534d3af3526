//! # Listing Query Planner
//!
//! Compiles a [`FilterRequest`] into one aggregation [`Pipeline`]:
//!
//! ```text
//! Idle -> BuildingPredicate -> BuildingGeo | BuildingMatch -> AddingRanking
//!      -> Optimizing -> Paginating -> Ready
//! ```
//!
//! Every step is a pure function call. The first failing step aborts the plan, so a
//! partially built pipeline never reaches storage.

pub mod geo;
pub mod optimizer;
pub mod pager;
pub mod predicate;
pub mod ranking;

use std::fmt;

use crate::config::PlannerConfig;
use crate::errors::PlannerError;
use crate::pipeline::{DISTANCE_FIELD, Pipeline, PipelineStage, Projection, SCORE_FIELD, SortKey};
use crate::search::{FilterRequest, SortOrder};
use crate::types::CollectionProfile;

pub use geo::GeoClause;
pub use pager::{FacetedPager, PageResult, to_page_result};
pub use predicate::{Clause, ClauseKind, PredicateBuilder, PredicateDocument, Scalar};
pub use ranking::{RankingStage, RankingWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPhase {
    Idle,
    BuildingPredicate,
    BuildingGeo,
    BuildingMatch,
    AddingRanking,
    Optimizing,
    Paginating,
    Ready,
}

impl fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanPhase::Idle => "idle",
            PlanPhase::BuildingPredicate => "building-predicate",
            PlanPhase::BuildingGeo => "building-geo",
            PlanPhase::BuildingMatch => "building-match",
            PlanPhase::AddingRanking => "adding-ranking",
            PlanPhase::Optimizing => "optimizing",
            PlanPhase::Paginating => "paginating",
            PlanPhase::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Resolved sort: the first key plus an `_id` tiebreaker for stable pages.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSort {
    pub name: String,
    pub keys: Vec<SortKey>,
}

/// Generic planner parameterized by a collection profile.
#[derive(Debug, Clone, Copy)]
pub struct ListingQueryPlanner<'a> {
    config: &'a PlannerConfig,
    profile: &'a CollectionProfile,
}

impl<'a> ListingQueryPlanner<'a> {
    pub fn new(config: &'a PlannerConfig, profile: &'a CollectionProfile) -> Self {
        Self { config, profile }
    }

    pub fn profile(&self) -> &'a CollectionProfile {
        self.profile
    }

    /// Page size the plan will use: requested size capped at the configured maximum.
    pub fn effective_page_size(&self, request: &FilterRequest) -> u64 {
        request.page_size.min(self.config.max_page_size)
    }

    pub fn plan(&self, request: &FilterRequest) -> Result<Pipeline, PlannerError> {
        let result = self.plan_inner(request);
        match &result {
            Ok(pipeline) => log::debug!(
                "planned {} pipeline with {} stages: {}",
                self.profile.name,
                pipeline.len(),
                pipeline.to_json()
            ),
            Err(err @ PlannerError::InvalidPipeline { .. }) => {
                log::error!("planner produced an invalid {} pipeline: {}", self.profile.name, err)
            }
            Err(err) => log::warn!("rejected {} search: {}", self.profile.name, err),
        }
        result
    }

    fn plan_inner(&self, request: &FilterRequest) -> Result<Pipeline, PlannerError> {
        let mut phase = PlanPhase::Idle;
        let mut advance = |next: PlanPhase| {
            log::trace!("{}: {} -> {}", self.profile.name, phase, next);
            phase = next;
        };

        if request.page_size == 0 {
            return Err(PlannerError::invalid_parameter("page_size", "page_size must be greater than 0"));
        }
        let page_size = self.effective_page_size(request);
        let has_text = request.has_text_query();
        let sort = self.resolve_sort(request)?;

        advance(PlanPhase::BuildingPredicate);
        let predicate = PredicateBuilder::new(self.profile).build(request)?;

        let mut stages = Vec::with_capacity(6);
        match &request.geo {
            Some(geo) => {
                advance(PlanPhase::BuildingGeo);
                let clause = GeoClause::new(&self.profile.location_field);
                stages.push(clause.apply(predicate, geo.origin, geo.max_distance_km)?);
            }
            None => {
                advance(PlanPhase::BuildingMatch);
                stages.push(PipelineStage::Match(predicate));
            }
        }

        advance(PlanPhase::AddingRanking);
        // Assembled in the order the optimizer would pick anyway except for the
        // projection, which is appended last and moved forward by `optimize`.
        stages.push(RankingStage::new(self.profile, &self.config.ranking).compute(has_text));
        stages.push(PipelineStage::Sort(sort.keys));
        if !self.profile.exclude_fields.is_empty() {
            stages.push(PipelineStage::Project(Projection {
                exclude: self.profile.exclude_fields.clone(),
            }));
        }

        advance(PlanPhase::Optimizing);
        let stages = optimizer::optimize(stages)?;

        advance(PlanPhase::Paginating);
        let pipeline = FacetedPager.paginate(stages, request.page, page_size)?;

        advance(PlanPhase::Ready);
        Ok(pipeline)
    }

    /// Resolve the requested sort against the profile and request context.
    pub fn resolve_sort(&self, request: &FilterRequest) -> Result<ResolvedSort, PlannerError> {
        let has_geo = request.geo.is_some();
        let has_text = request.has_text_query();

        let requested = request.sort.field.as_deref().map(str::trim).filter(|f| !f.is_empty());
        let name = match requested {
            Some(name) => name.to_ascii_lowercase(),
            None if has_geo => "distance".to_string(),
            None if has_text => "relevance".to_string(),
            None => self.profile.default_sort.clone(),
        };

        let (path, default_order) = match name.as_str() {
            "distance" => {
                if !has_geo {
                    return Err(PlannerError::invalid_parameter(
                        "sort_by",
                        "sorting by distance requires lat and lng",
                    ));
                }
                (DISTANCE_FIELD.to_string(), SortOrder::Asc)
            }
            "relevance" => {
                if !has_text {
                    return Err(PlannerError::invalid_parameter(
                        "sort_by",
                        "sorting by relevance requires a text query",
                    ));
                }
                (SCORE_FIELD.to_string(), SortOrder::Desc)
            }
            other => {
                let field = self.profile.sort_field(other).ok_or_else(|| {
                    PlannerError::invalid_parameter("sort_by", format!("Unsupported sort field: {}", other))
                })?;
                // `score` holds text relevance when a text query is present.
                let path = if field.path == SCORE_FIELD {
                    RankingStage::popularity_path(has_text).to_string()
                } else {
                    field.path.clone()
                };
                (path, field.default_order)
            }
        };

        let order = request.sort.order.unwrap_or(default_order);
        let mut keys = vec![SortKey::new(path, order)];
        if keys[0].field != "_id" {
            keys.push(SortKey::new("_id", SortOrder::Asc));
        }
        Ok(ResolvedSort { name, keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FACET_DATA, FacetBranch};

    fn hotels() -> CollectionProfile {
        crate::types::builtin_profiles()
            .into_iter()
            .find(|p| p.name == "hotels")
            .expect("hotels profile")
    }

    fn operators(pipeline: &Pipeline) -> Vec<&'static str> {
        pipeline.stages().iter().map(PipelineStage::operator).collect()
    }

    #[test]
    fn plain_request_plans_match_project_rank_sort_facet() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let pipeline = ListingQueryPlanner::new(&config, &profile)
            .plan(&FilterRequest::new())
            .expect("plan");
        assert_eq!(
            operators(&pipeline),
            vec!["$match", "$project", "$addFields", "$sort", "$facet"]
        );
    }

    #[test]
    fn geo_request_uses_geo_near_instead_of_match() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let pipeline = ListingQueryPlanner::new(&config, &profile)
            .plan(&FilterRequest::new().near(22.5726, 88.3639, 10.0))
            .expect("plan");
        let ops = operators(&pipeline);
        assert_eq!(ops[0], "$geoNear");
        assert!(!ops.contains(&"$match"));

        let PipelineStage::Sort(keys) = &pipeline.stages()[3] else {
            panic!("expected sort stage");
        };
        assert_eq!(keys[0], SortKey::new("distance", SortOrder::Asc));
    }

    #[test]
    fn geo_default_sort_can_be_overridden() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let request = FilterRequest::new()
            .near(22.5726, 88.3639, 5.0)
            .with_sort("rating", None);
        let sort = ListingQueryPlanner::new(&config, &profile).resolve_sort(&request).expect("sort");
        assert_eq!(sort.name, "rating");
        assert_eq!(sort.keys[0], SortKey::new("rating.average", SortOrder::Desc));
        assert_eq!(sort.keys[1], SortKey::new("_id", SortOrder::Asc));
    }

    #[test]
    fn text_request_defaults_to_relevance() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let request = FilterRequest::new().with_text("heritage");
        let sort = ListingQueryPlanner::new(&config, &profile).resolve_sort(&request).expect("sort");
        assert_eq!(sort.name, "relevance");
        assert_eq!(sort.keys[0], SortKey::new("score", SortOrder::Desc));
    }

    #[test]
    fn text_request_honors_explicit_popularity_sort() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let request = FilterRequest::new().with_text("heritage").with_sort("popularity", None);
        let pipeline = ListingQueryPlanner::new(&config, &profile).plan(&request).expect("plan");

        let sort = pipeline
            .stages()
            .iter()
            .find_map(|stage| match stage {
                PipelineStage::Sort(keys) => Some(keys.clone()),
                _ => None,
            })
            .expect("sort stage");
        assert_eq!(sort[0], SortKey::new("popularity", SortOrder::Desc));

        let computed = pipeline
            .stages()
            .iter()
            .find_map(|stage| match stage {
                PipelineStage::AddComputedFields(fields) => Some(fields.clone()),
                _ => None,
            })
            .expect("ranking stage");
        assert!(computed.iter().any(|f| f.name == "popularity"));
    }

    #[test]
    fn text_request_honors_explicit_field_sort() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let request = FilterRequest::new()
            .with_text("heritage")
            .with_sort("price", Some(SortOrder::Desc));
        let sort = ListingQueryPlanner::new(&config, &profile).resolve_sort(&request).expect("sort");
        assert_eq!(sort.name, "price");
        assert_eq!(sort.keys[0], SortKey::new("pricePerNight", SortOrder::Desc));
    }

    #[test]
    fn popularity_without_text_reads_the_score() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let sort = ListingQueryPlanner::new(&config, &profile)
            .resolve_sort(&FilterRequest::new())
            .expect("sort");
        assert_eq!(sort.name, "popularity");
        assert_eq!(sort.keys[0], SortKey::new("score", SortOrder::Desc));
    }

    #[test]
    fn context_sorts_require_their_context() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let planner = ListingQueryPlanner::new(&config, &profile);
        assert!(planner.resolve_sort(&FilterRequest::new().with_sort("distance", None)).is_err());
        assert!(planner.resolve_sort(&FilterRequest::new().with_sort("relevance", None)).is_err());
        assert!(planner.resolve_sort(&FilterRequest::new().with_sort("unknown", None)).is_err());
    }

    #[test]
    fn page_size_is_capped_at_configured_maximum() {
        let config = PlannerConfig {
            max_page_size: 20,
            default_page_size: 10,
            ..PlannerConfig::default()
        };
        let profile = hotels();
        let pipeline = ListingQueryPlanner::new(&config, &profile)
            .plan(&FilterRequest::new().with_page(2, 500))
            .expect("plan");
        let Some(PipelineStage::Facet(branches)) = pipeline.stages().last() else {
            panic!("expected facet stage");
        };
        let data: &FacetBranch = branches.iter().find(|b| b.name == FACET_DATA).expect("data branch");
        assert_eq!(data.stages, vec![PipelineStage::Skip(20), PipelineStage::Limit(20)]);
    }

    #[test]
    fn zero_page_size_is_rejected_before_planning() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let err = ListingQueryPlanner::new(&config, &profile)
            .plan(&FilterRequest::new().with_page(1, 0))
            .expect_err("zero page size should fail");
        assert!(matches!(err, PlannerError::InvalidParameter { field, .. } if field == "page_size"));
    }

    #[test]
    fn text_and_geo_together_are_rejected() {
        let config = PlannerConfig::default();
        let profile = hotels();
        let request = FilterRequest::new()
            .with_text("spa")
            .near(22.5726, 88.3639, 5.0)
            .with_sort("rating", None);
        let err = ListingQueryPlanner::new(&config, &profile)
            .plan(&request)
            .expect_err("text + geo should fail");
        assert!(err.is_client_error());
    }

    #[test]
    fn profile_without_exclusions_skips_projection() {
        let config = PlannerConfig::default();
        let mut profile = hotels();
        profile.exclude_fields.clear();
        let pipeline = ListingQueryPlanner::new(&config, &profile)
            .plan(&FilterRequest::new())
            .expect("plan");
        assert!(!operators(&pipeline).contains(&"$project"));
    }
}
