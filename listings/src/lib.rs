//! Listing query planner.
//!
//! Compiles listing search parameters (free text, categories, price and other
//! ranges, rating floor, amenities, area, proximity, sort, pagination) into one
//! MongoDB aggregation pipeline with single-pass faceted pagination, and runs it
//! against a pluggable store.
//!
//! ```ignore
//! let config = PlannerConfig::default();
//! let profile = registry::builtin_profile("hotels").unwrap();
//! let request = FilterRequest::new().with_text("rooftop").with_page(1, 20);
//! let pipeline = ListingQueryPlanner::new(&config, profile).plan(&request)?;
//! let page: PageResult<serde_json::Value> =
//!     to_page_result(store.execute(&profile.collection, &pipeline).await?, 1, 20)?;
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod filters;
pub mod indexes;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod runtime;
pub mod search;
pub mod seed;
pub mod types;

pub use client::{Client, CollectionHandle};
pub use config::PlannerConfig;
pub use errors::*;
pub use pipeline::{GeoPoint, Pipeline, PipelineStage};
pub use planner::{ListingQueryPlanner, PageResult, RankingWeights, to_page_result};
pub use registry::{ProfileRegistry, builtin_profile};
pub use runtime::{DocumentStore, MemoryStore, MongoStore, PipelineExecutor};
pub use search::{FilterRequest, SearchQuery, SortOrder};
pub use types::CollectionProfile;

// Re-export the driver so callers don't need to pin a matching version.
pub use mongodb;
