use listings::planner::optimizer;
use listings::{FilterRequest, ListingQueryPlanner, PipelineStage, PlannerConfig, PlannerError, builtin_profile};
use serde_json::json;

fn operators(stages: &[PipelineStage]) -> Vec<&'static str> {
    stages.iter().map(PipelineStage::operator).collect()
}

/// A spread of requests that exercise every optional clause.
fn requests() -> Vec<FilterRequest> {
    vec![
        FilterRequest::new(),
        FilterRequest::new().with_text("rooftop bar"),
        FilterRequest::new().near(22.5726, 88.3639, 10.0),
        FilterRequest::new()
            .with_categories(["boutique", "luxury"])
            .with_range("price", Some(50.0), Some(400.0))
            .with_min_rating(4.0)
            .with_amenities(["pool"])
            .with_area("Salt Lake")
            .featured_only()
            .with_page(3, 10),
        FilterRequest::new()
            .near(22.5726, 88.3639, 2.5)
            .with_range("stars", Some(3.0), None)
            .with_sort("stars", None),
    ]
}

#[test]
fn every_plan_selects_first_and_paginates_last() {
    let config = PlannerConfig::default();
    for name in ["hotels", "restaurants", "attractions", "sports", "events"] {
        let profile = builtin_profile(name).expect("builtin profile");
        for request in requests().into_iter().filter(|r| {
            r.ranges.iter().all(|range| profile.range_field(&range.name).is_some())
                && r.sort.field.as_deref().is_none_or(|f| profile.sort_field(f).is_some())
        }) {
            let pipeline = ListingQueryPlanner::new(&config, profile)
                .plan(&request)
                .expect("valid request should plan");
            let stages = pipeline.stages();

            assert!(stages[0].is_selection(), "{name}: {:?}", operators(stages));
            assert_eq!(stages.iter().filter(|s| s.is_selection()).count(), 1);
            assert!(matches!(stages.last(), Some(PipelineStage::Facet(_))));
            assert!(
                stages.windows(2).all(|w| w[0].precedence() <= w[1].precedence()),
                "{name}: {:?}",
                operators(stages)
            );
        }
    }
}

#[test]
fn reordering_an_optimized_plan_changes_nothing() {
    let config = PlannerConfig::default();
    let profile = builtin_profile("hotels").expect("hotels");
    for request in requests() {
        let stages = ListingQueryPlanner::new(&config, profile)
            .plan(&request)
            .expect("plan")
            .into_stages();
        assert_eq!(optimizer::reorder(stages.clone()), stages);
    }
}

#[test]
fn planning_is_deterministic() {
    let config = PlannerConfig::default();
    let profile = builtin_profile("restaurants").expect("restaurants");
    for request in requests() {
        let planner = ListingQueryPlanner::new(&config, profile);
        let first = planner.plan(&request).expect("plan");
        let second = planner.plan(&request).expect("plan");
        assert_eq!(first, second);
        assert_eq!(first.to_json(), second.to_json());
    }
}

#[test]
fn default_request_starts_with_the_visibility_match() {
    let config = PlannerConfig::default();
    let profile = builtin_profile("attractions").expect("attractions");
    let rendered = ListingQueryPlanner::new(&config, profile)
        .plan(&FilterRequest::new())
        .expect("plan")
        .to_json();
    assert_eq!(rendered[0], json!({ "$match": { "status": "published" } }));
}

#[test]
fn ten_kilometers_renders_as_ten_thousand_meters() {
    let config = PlannerConfig::default();
    let profile = builtin_profile("hotels").expect("hotels");
    let rendered = ListingQueryPlanner::new(&config, profile)
        .plan(&FilterRequest::new().near(22.5726, 88.3639, 10.0))
        .expect("plan")
        .to_json();

    let geo = &rendered[0]["$geoNear"];
    assert_eq!(geo["maxDistance"].as_f64(), Some(10_000.0));
    assert_eq!(geo["near"]["coordinates"], json!([88.3639, 22.5726]));
    assert_eq!(geo["query"]["status"], "published");
    assert!(rendered.as_array().is_some_and(|stages| stages.iter().all(|s| s.get("$match").is_none())));
}

#[test]
fn text_with_proximity_is_refused() {
    let config = PlannerConfig::default();
    let profile = builtin_profile("hotels").expect("hotels");
    let err = ListingQueryPlanner::new(&config, profile)
        .plan(&FilterRequest::new().with_text("spa").near(22.5726, 88.3639, 5.0))
        .expect_err("text and geo cannot share a pipeline");
    assert!(matches!(err, PlannerError::InvalidParameter { ref field, .. } if field == "q"));
}

#[test]
fn facet_window_matches_requested_page() {
    let config = PlannerConfig::default();
    let profile = builtin_profile("events").expect("events");
    let rendered = ListingQueryPlanner::new(&config, profile)
        .plan(&FilterRequest::new().with_page(4, 15))
        .expect("plan")
        .to_json();

    let facet = rendered
        .as_array()
        .and_then(|stages| stages.last())
        .map(|stage| stage["$facet"].clone())
        .expect("facet stage");
    assert_eq!(facet["data"], json!([{ "$skip": 45 }, { "$limit": 15 }]));
    assert_eq!(facet["count"], json!([{ "$count": "total" }]));
}

#[test]
fn oversized_pages_are_capped_by_config() {
    let config = PlannerConfig {
        max_page_size: 50,
        ..PlannerConfig::default()
    };
    let profile = builtin_profile("sports").expect("sports");
    let planner = ListingQueryPlanner::new(&config, profile);
    assert_eq!(planner.effective_page_size(&FilterRequest::new().with_page(1, 500)), 50);
}
