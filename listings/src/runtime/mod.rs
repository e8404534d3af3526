//! Storage seam.
//!
//! The planner only produces [`Pipeline`] values; running them is delegated to a
//! [`PipelineExecutor`]. Two implementations ship with the crate:
//!
//! - [`MongoStore`] runs the rendered stage documents through the MongoDB driver.
//! - [`MemoryStore`] evaluates the same stages over JSON documents held in memory.
//!
//! Both return documents as relaxed extended JSON so callers see one shape.

pub mod memory;
pub mod mongo;

use serde_json::Value as JsonValue;

use crate::errors::PlannerError;
use crate::indexes::IndexPlan;
use crate::pipeline::Pipeline;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[allow(async_fn_in_trait)]
pub trait PipelineExecutor {
    /// Run `pipeline` against `collection`. A missing collection behaves as empty.
    async fn execute(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<JsonValue>, PlannerError>;
}

/// Administrative operations used by seeding and index provisioning.
#[allow(async_fn_in_trait)]
pub trait DocumentStore: PipelineExecutor {
    async fn count(&self, collection: &str) -> Result<u64, PlannerError>;

    /// Insert documents given as (extended) JSON objects. Returns how many were written.
    async fn insert_many(&self, collection: &str, documents: Vec<JsonValue>) -> Result<u64, PlannerError>;

    /// Create the indexes in `plan`; returns their names.
    async fn ensure_indexes(&self, plan: &IndexPlan) -> Result<Vec<String>, PlannerError>;
}
