//! Index provisioning.
//!
//! Every profile needs three indexes for its pipelines to stay index-backed:
//! a `2dsphere` index on the location field (`$geoNear` refuses to run without
//! one), a compound weighted text index over the text fields (`$text` likewise),
//! and an ascending `status + category` index serving the baseline `$match`.

use mongodb::bson::{Bson, Document};

use crate::errors::PlannerError;
use crate::runtime::DocumentStore;
use crate::types::CollectionProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Geo2dSphere,
    Text,
}

impl IndexKind {
    fn bson(self) -> Bson {
        match self {
            IndexKind::Ascending => Bson::Int32(1),
            IndexKind::Descending => Bson::Int32(-1),
            IndexKind::Geo2dSphere => Bson::String("2dsphere".to_string()),
            IndexKind::Text => Bson::String("text".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub kind: IndexKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<IndexKey>,
    /// Per-field weights; only meaningful for text indexes.
    pub weights: Vec<(String, u32)>,
}

impl IndexSpec {
    pub fn is_text(&self) -> bool {
        self.keys.iter().any(|k| k.kind == IndexKind::Text)
    }

    pub fn is_geo(&self) -> bool {
        self.keys.iter().any(|k| k.kind == IndexKind::Geo2dSphere)
    }

    pub fn keys_document(&self) -> Document {
        let mut keys = Document::new();
        for key in &self.keys {
            keys.insert(key.field.clone(), key.kind.bson());
        }
        keys
    }

    pub fn weights_document(&self) -> Option<Document> {
        if self.weights.is_empty() {
            return None;
        }
        let mut weights = Document::new();
        for (field, weight) in &self.weights {
            weights.insert(field.clone(), Bson::Int32(i32::try_from(*weight).unwrap_or(i32::MAX)));
        }
        Some(weights)
    }
}

/// The indexes one collection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    pub collection: String,
    pub indexes: Vec<IndexSpec>,
}

impl IndexPlan {
    pub fn for_profile(profile: &CollectionProfile) -> Self {
        let collection = profile.collection.clone();
        let mut indexes = vec![IndexSpec {
            name: format!("{}_{}_2dsphere", collection, profile.location_field),
            keys: vec![IndexKey {
                field: profile.location_field.clone(),
                kind: IndexKind::Geo2dSphere,
            }],
            weights: Vec::new(),
        }];

        // A collection may hold at most one text index.
        if !profile.text_fields.is_empty() {
            indexes.push(IndexSpec {
                name: format!("{}_text", collection),
                keys: profile
                    .text_fields
                    .iter()
                    .map(|f| IndexKey {
                        field: f.path.clone(),
                        kind: IndexKind::Text,
                    })
                    .collect(),
                weights: profile.text_fields.iter().map(|f| (f.path.clone(), f.weight)).collect(),
            });
        }

        indexes.push(IndexSpec {
            name: format!("{}_{}_{}", collection, profile.status_field, profile.category_field),
            keys: vec![
                IndexKey {
                    field: profile.status_field.clone(),
                    kind: IndexKind::Ascending,
                },
                IndexKey {
                    field: profile.category_field.clone(),
                    kind: IndexKind::Ascending,
                },
            ],
            weights: Vec::new(),
        });

        Self { collection, indexes }
    }

    pub fn text_index(&self) -> Option<&IndexSpec> {
        self.indexes.iter().find(|i| i.is_text())
    }

    pub fn names(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.name.as_str()).collect()
    }
}

/// Create the profile's indexes on `store`. Existing indexes with the same
/// definition are left alone by both stores.
pub async fn ensure_indexes<S>(store: &S, profile: &CollectionProfile) -> Result<Vec<String>, PlannerError>
where
    S: DocumentStore,
{
    let plan = IndexPlan::for_profile(profile);
    let created = store.ensure_indexes(&plan).await?;
    log::info!("ensured {} indexes on `{}`: {}", created.len(), plan.collection, created.join(", "));
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn plan_covers_geo_text_and_baseline_match() {
        let plan = IndexPlan::for_profile(&CollectionProfile::listing("hotels"));
        assert_eq!(
            plan.names(),
            vec!["hotels_location_2dsphere", "hotels_text", "hotels_status_category"]
        );
        assert!(plan.indexes[0].is_geo());
        assert_eq!(plan.indexes[0].keys_document(), doc! { "location": "2dsphere" });
        assert_eq!(plan.indexes[2].keys_document(), doc! { "status": 1, "category": 1 });
    }

    #[test]
    fn text_index_carries_field_weights() {
        let plan = IndexPlan::for_profile(&CollectionProfile::listing("attractions"));
        let text = plan.text_index().expect("text index");
        assert_eq!(
            text.keys_document(),
            doc! { "name": "text", "tags": "text", "area": "text", "description": "text" }
        );
        assert_eq!(
            text.weights_document(),
            Some(doc! { "name": 10, "tags": 5, "area": 3, "description": 1 })
        );
    }

    #[test]
    fn profile_without_text_fields_gets_no_text_index() {
        let mut profile = CollectionProfile::listing("sports").with_collection("sports_facilities");
        profile.text_fields.clear();
        let plan = IndexPlan::for_profile(&profile);
        assert!(plan.text_index().is_none());
        assert_eq!(plan.collection, "sports_facilities");
    }
}
