#![allow(dead_code)]

use listings::{Client, MemoryStore, PlannerConfig};
use serde_json::{Map, Value as JsonValue, json};

pub const KOLKATA: (f64, f64) = (22.5726, 88.3639);

/// Published hotel with neutral ranking inputs, located at the Kolkata origin.
pub fn hotel(id: &str, name: &str) -> JsonValue {
    json!({
        "_id": id,
        "name": name,
        "description": "",
        "status": "published",
        "category": "budget",
        "amenities": ["wifi"],
        "area": "Park Street",
        "rating": { "average": 3.0, "count": 10 },
        "views": 0,
        "isFeatured": false,
        "isPromoted": false,
        "pricePerNight": 100,
        "location": { "type": "Point", "coordinates": [KOLKATA.1, KOLKATA.0] },
        "reviews": [{ "author": "a", "text": "fine" }],
        "gallery": ["a.jpg"]
    })
}

/// Set a dotted path on a fixture document.
pub fn with(mut doc: JsonValue, path: &str, value: JsonValue) -> JsonValue {
    fn set(map: &mut Map<String, JsonValue>, path: &str, value: JsonValue) {
        match path.split_once('.') {
            None => {
                map.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let child = map.entry(head.to_string()).or_insert_with(|| json!({}));
                if let JsonValue::Object(child) = child {
                    set(child, rest, value);
                }
            }
        }
    }
    if let JsonValue::Object(map) = &mut doc {
        set(map, path, value);
    }
    doc
}

pub fn at(doc: JsonValue, latitude: f64, longitude: f64) -> JsonValue {
    with(doc, "location", json!({ "type": "Point", "coordinates": [longitude, latitude] }))
}

/// Client over an in-memory store holding `docs` in the indexed `hotels` collection.
pub async fn hotels_client(docs: Vec<JsonValue>) -> Client<MemoryStore> {
    client_with(PlannerConfig::default(), MemoryStore::new(), docs).await
}

pub async fn client_with(config: PlannerConfig, store: MemoryStore, docs: Vec<JsonValue>) -> Client<MemoryStore> {
    use listings::DocumentStore;

    store.insert_many("hotels", docs).await.expect("insert fixtures");
    let client = Client::new(store, config).expect("client");
    client
        .collection("hotels")
        .expect("hotels profile")
        .ensure_indexes()
        .await
        .expect("indexes");
    client
}

pub fn names(items: &[JsonValue]) -> Vec<&str> {
    items.iter().filter_map(|i| i["name"].as_str()).collect()
}
