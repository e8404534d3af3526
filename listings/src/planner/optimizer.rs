//! Stage reordering.
//!
//! Stages are stably partitioned by precedence class: selection, shaping,
//! computation, ordering, truncation. Relative order inside a class is kept.

use crate::errors::PlannerError;
use crate::pipeline::PipelineStage;

/// Reorder stages by precedence class. Pure and idempotent.
pub fn reorder(stages: Vec<PipelineStage>) -> Vec<PipelineStage> {
    let mut indexed: Vec<(usize, PipelineStage)> = stages.into_iter().enumerate().collect();
    indexed.sort_by_key(|(position, stage)| (stage.precedence(), *position));
    indexed.into_iter().map(|(_, stage)| stage).collect()
}

/// Reject stage lists the planner should never have produced.
pub fn check(stages: &[PipelineStage]) -> Result<(), PlannerError> {
    let selections = stages.iter().filter(|s| s.is_selection()).count();
    if selections > 1 {
        return Err(PlannerError::invalid_pipeline(format!(
            "expected at most one $match/$geoNear stage, found {}",
            selections
        )));
    }
    Ok(())
}

/// Validate, then reorder.
pub fn optimize(stages: Vec<PipelineStage>) -> Result<Vec<PipelineStage>, PlannerError> {
    check(&stages)?;
    let before: Vec<&'static str> = stages.iter().map(PipelineStage::operator).collect();
    let reordered = reorder(stages);
    let after: Vec<&'static str> = reordered.iter().map(PipelineStage::operator).collect();
    if before != after {
        log::debug!("reordered pipeline stages {:?} -> {:?}", before, after);
    }
    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Projection, SortKey};
    use crate::planner::predicate::PredicateDocument;
    use crate::search::SortOrder;

    fn sort(field: &str) -> PipelineStage {
        PipelineStage::Sort(vec![SortKey::new(field, SortOrder::Asc)])
    }

    #[test]
    fn moves_selection_to_the_front_and_pagination_to_the_back() {
        let stages = vec![
            PipelineStage::Limit(10),
            sort("name"),
            PipelineStage::AddComputedFields(Vec::new()),
            PipelineStage::Project(Projection::default()),
            PipelineStage::Match(PredicateDocument::new()),
            PipelineStage::Skip(20),
        ];
        let ops: Vec<&str> = reorder(stages).iter().map(PipelineStage::operator).collect();
        assert_eq!(ops, vec!["$match", "$project", "$addFields", "$sort", "$limit", "$skip"]);
    }

    #[test]
    fn partition_is_stable_within_a_class() {
        let stages = vec![sort("b"), PipelineStage::Skip(5), sort("a"), PipelineStage::Limit(5)];
        let reordered = reorder(stages);
        assert_eq!(reordered, vec![sort("b"), sort("a"), PipelineStage::Skip(5), PipelineStage::Limit(5)]);
    }

    #[test]
    fn reorder_is_idempotent() {
        let stages = vec![
            PipelineStage::Limit(3),
            PipelineStage::AddComputedFields(Vec::new()),
            sort("score"),
            PipelineStage::Match(PredicateDocument::new()),
            PipelineStage::Project(Projection::default()),
        ];
        let once = reorder(stages);
        assert_eq!(reorder(once.clone()), once);
    }

    #[test]
    fn two_selection_stages_are_rejected_not_repaired() {
        let stages = vec![
            PipelineStage::Match(PredicateDocument::new()),
            PipelineStage::Match(PredicateDocument::new()),
        ];
        let err = optimize(stages).expect_err("competing selections should fail");
        assert!(matches!(err, PlannerError::InvalidPipeline { .. }));
    }
}
