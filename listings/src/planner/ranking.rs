//! Ranking stage: writes the `score` field used by popularity and relevance sorts.
//!
//! Without a text query the score is a fixed linear blend:
//!
//! ```text
//! score = 0.3 * rating + 0.0001 * views + 2 (featured) + 1 (promoted)
//! ```
//!
//! Missing rating or view counts contribute 0. With a text query the score is the
//! engine's text-match relevance instead, and the blend moves to `popularity` so a
//! caller can still sort text results by it.

use serde::{Deserialize, Serialize};

use crate::errors::PlannerError;
use crate::pipeline::{ComputedField, Expression, POPULARITY_FIELD, PipelineStage, SCORE_FIELD};
use crate::types::CollectionProfile;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub rating: f64,
    pub views: f64,
    pub featured: f64,
    pub promoted: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            rating: 0.3,
            views: 0.0001,
            featured: 2.0,
            promoted: 1.0,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<(), PlannerError> {
        let all = [self.rating, self.views, self.featured, self.promoted];
        if all.iter().all(|w| w.is_finite() && *w >= 0.0) {
            Ok(())
        } else {
            Err(PlannerError::Config {
                message: "ranking weights must be finite and non-negative".to_string(),
            })
        }
    }

    /// Score for already-extracted inputs. Mirrors the expression the stage emits.
    pub fn score(&self, rating: f64, views: f64, featured: bool, promoted: bool) -> f64 {
        let mut score = self.rating * rating + self.views * views;
        if featured {
            score += self.featured;
        }
        if promoted {
            score += self.promoted;
        }
        score
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RankingStage<'a> {
    profile: &'a CollectionProfile,
    weights: &'a RankingWeights,
}

impl<'a> RankingStage<'a> {
    pub fn new(profile: &'a CollectionProfile, weights: &'a RankingWeights) -> Self {
        Self { profile, weights }
    }

    /// Adds the score field; never removes documents.
    pub fn compute(&self, has_text_query: bool) -> PipelineStage {
        let fields = if has_text_query {
            vec![
                ComputedField {
                    name: SCORE_FIELD.to_string(),
                    expr: Expression::TextScore,
                },
                ComputedField {
                    name: POPULARITY_FIELD.to_string(),
                    expr: self.blend(),
                },
            ]
        } else {
            vec![ComputedField {
                name: SCORE_FIELD.to_string(),
                expr: self.blend(),
            }]
        };
        PipelineStage::AddComputedFields(fields)
    }

    /// Where a sort on the popularity score reads from.
    pub fn popularity_path(has_text_query: bool) -> &'static str {
        if has_text_query { POPULARITY_FIELD } else { SCORE_FIELD }
    }

    fn blend(&self) -> Expression {
        let profile = self.profile;
        let weights = self.weights;
        Expression::Sum(vec![
            Expression::scaled(weights.rating, Expression::field(&profile.rating_field)),
            Expression::scaled(weights.views, Expression::field(&profile.views_field)),
            Expression::flag_bonus(&profile.featured_field, weights.featured),
            Expression::flag_bonus(&profile.promoted_field, weights.promoted),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popular_promoted_listing_outranks_highly_rated_quiet_one() {
        let weights = RankingWeights::default();
        let quiet = weights.score(4.0, 100.0, false, false);
        let loud = weights.score(3.0, 100_000.0, true, true);
        assert!((quiet - 1.21).abs() < 1e-9);
        assert!((loud - 13.9).abs() < 1e-9);
        assert!(loud > quiet);
    }

    #[test]
    fn text_queries_score_by_relevance_and_keep_the_blend() {
        let profile = CollectionProfile::listing("hotels");
        let weights = RankingWeights::default();
        let stage = RankingStage::new(&profile, &weights).compute(true);
        let PipelineStage::AddComputedFields(fields) = stage else {
            panic!("expected computed fields");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "score");
        assert_eq!(fields[0].expr, Expression::TextScore);
        assert_eq!(fields[1].name, "popularity");
        assert!(matches!(&fields[1].expr, Expression::Sum(terms) if terms.len() == 4));
    }

    #[test]
    fn popularity_path_follows_text_context() {
        assert_eq!(RankingStage::popularity_path(false), "score");
        assert_eq!(RankingStage::popularity_path(true), "popularity");
    }

    #[test]
    fn blend_uses_profile_paths() {
        let profile = CollectionProfile::listing("hotels");
        let weights = RankingWeights::default();
        let stage = RankingStage::new(&profile, &weights).compute(false);
        let PipelineStage::AddComputedFields(fields) = stage else {
            panic!("expected computed fields");
        };
        assert_eq!(fields.len(), 1);
        let Expression::Sum(terms) = &fields[0].expr else {
            panic!("expected weighted sum");
        };
        assert_eq!(terms.len(), 4);
        assert_eq!(terms[0], Expression::scaled(0.3, Expression::field("rating.average")));
        assert_eq!(terms[2], Expression::flag_bonus("isFeatured", 2.0));
    }

    #[test]
    fn negative_weights_are_rejected() {
        let weights = RankingWeights {
            views: -1.0,
            ..RankingWeights::default()
        };
        assert!(weights.validate().is_err());
    }
}
