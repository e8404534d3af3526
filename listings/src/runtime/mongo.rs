use futures::TryStreamExt;
use mongodb::{
    Client as MongoClient, Database, IndexModel,
    bson::{Bson, Document, doc},
    options::IndexOptions,
};
use serde_json::Value as JsonValue;

use crate::errors::PlannerError;
use crate::indexes::IndexPlan;
use crate::pipeline::Pipeline;
use crate::runtime::{DocumentStore, PipelineExecutor};

/// MongoDB-backed store. Connection pooling and lifecycle stay with the driver.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect to `uri` and use `database`.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, PlannerError> {
        let client = MongoClient::with_uri_str(uri).await?;
        log::debug!("connected to mongodb, using database `{}`", database);
        Ok(Self::new(client.database(database)))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl PipelineExecutor for MongoStore {
    async fn execute(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<JsonValue>, PlannerError> {
        let coll = self.database.collection::<Document>(collection);
        let cursor = coll.aggregate(pipeline.to_documents()).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents
            .into_iter()
            .map(|d| Bson::Document(d).into_relaxed_extjson())
            .collect())
    }
}

impl DocumentStore for MongoStore {
    async fn count(&self, collection: &str) -> Result<u64, PlannerError> {
        let coll = self.database.collection::<Document>(collection);
        Ok(coll.count_documents(doc! {}).await?)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<JsonValue>) -> Result<u64, PlannerError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let documents = documents
            .into_iter()
            .map(json_to_document)
            .collect::<Result<Vec<Document>, PlannerError>>()?;
        let coll = self.database.collection::<Document>(collection);
        let result = coll.insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn ensure_indexes(&self, plan: &IndexPlan) -> Result<Vec<String>, PlannerError> {
        let models: Vec<IndexModel> = plan
            .indexes
            .iter()
            .map(|spec| {
                let mut options = IndexOptions::builder().name(spec.name.clone()).build();
                options.weights = spec.weights_document();
                IndexModel::builder().keys(spec.keys_document()).options(options).build()
            })
            .collect();
        let coll = self.database.collection::<Document>(&plan.collection);
        let result = coll.create_indexes(models).await?;
        Ok(result.index_names)
    }
}

/// Parse an extended JSON object (e.g. `{"$date": ...}` values) into a document.
fn json_to_document(value: JsonValue) -> Result<Document, PlannerError> {
    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(PlannerError::storage(format!(
            "expected a JSON object to insert, got {:?}",
            other.element_type()
        ))),
        Err(err) => Err(PlannerError::storage(format!("invalid extended JSON document: {}", err))),
    }
}
