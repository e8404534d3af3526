//! In-memory pipeline evaluator.
//!
//! Evaluates typed stages over JSON documents with the engine's semantics where
//! the planner depends on them:
//!
//! - dotted paths descend into sub-documents, and a clause on an array field
//!   matches when any element does;
//! - `$text` needs a text index and must be the first stage; relevance is the
//!   weighted count of matched terms;
//! - `$geoNear` needs a `2dsphere` index, must be the first stage, and returns
//!   documents nearest first with the distance in meters;
//! - `$count` over an empty input emits no document;
//! - sorting orders mixed types as missing/null < numbers < strings < objects <
//!   arrays < booleans.
//!
//! Collections are guarded by a `std::sync::RwLock`; documents are cloned out
//! before evaluation so the lock is never held across an await.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use regex::RegexBuilder;
use serde_json::{Map, Number, Value as JsonValue};

use crate::errors::PlannerError;
use crate::indexes::{IndexPlan, IndexSpec};
use crate::pipeline::{Expression, GeoNearStage, GeoPoint, Pipeline, PipelineStage, Projection, SortKey};
use crate::planner::predicate::{Clause, PredicateDocument, Scalar};
use crate::runtime::{DocumentStore, PipelineExecutor};
use crate::search::SortOrder;

/// Radius the engine uses for spherical distances, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

#[derive(Debug, Default, Clone)]
struct CollectionState {
    documents: Vec<JsonValue>,
    indexes: Vec<IndexSpec>,
}

impl CollectionState {
    fn text_weights(&self) -> Option<&[(String, u32)]> {
        self.indexes.iter().find(|i| i.is_text()).map(|i| i.weights.as_slice())
    }

    fn has_geo_index(&self, key: &str) -> bool {
        self.indexes
            .iter()
            .any(|i| i.is_geo() && i.keys.iter().any(|k| k.field == key))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, CollectionState>>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `execute` call; used to exercise query deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn documents(&self, collection: &str) -> Result<Vec<JsonValue>, PlannerError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(collection)
            .map(|state| state.documents.clone())
            .unwrap_or_default())
    }

    pub fn clear(&self, collection: &str) -> Result<(), PlannerError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        collections.remove(collection);
        Ok(())
    }

    fn snapshot(&self, collection: &str) -> Result<CollectionState, PlannerError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

fn poisoned() -> PlannerError {
    PlannerError::storage("memory store lock poisoned")
}

impl PipelineExecutor for MemoryStore {
    async fn execute(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<JsonValue>, PlannerError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let state = self.snapshot(collection)?;
        let rows = state.documents.iter().cloned().map(Row::new).collect();
        let evaluator = Evaluator { state: &state };
        let rows = evaluator.run(rows, pipeline.stages(), true)?;
        Ok(rows.into_iter().map(|row| JsonValue::Object(row.doc)).collect())
    }
}

impl DocumentStore for MemoryStore {
    async fn count(&self, collection: &str) -> Result<u64, PlannerError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(collection).map_or(0, |s| s.documents.len() as u64))
    }

    async fn insert_many(&self, collection: &str, documents: Vec<JsonValue>) -> Result<u64, PlannerError> {
        if let Some(bad) = documents.iter().find(|d| !d.is_object()) {
            return Err(PlannerError::storage(format!("expected a JSON object to insert, got {}", bad)));
        }
        let inserted = documents.len() as u64;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        collections
            .entry(collection.to_string())
            .or_default()
            .documents
            .extend(documents);
        Ok(inserted)
    }

    async fn ensure_indexes(&self, plan: &IndexPlan) -> Result<Vec<String>, PlannerError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let state = collections.entry(plan.collection.clone()).or_default();
        for spec in &plan.indexes {
            if let Some(existing) = state.indexes.iter().find(|i| i.name == spec.name) {
                if existing != spec {
                    return Err(PlannerError::storage(format!(
                        "index `{}` already exists with different options",
                        spec.name
                    )));
                }
                continue;
            }
            if spec.is_text() && state.text_weights().is_some() {
                return Err(PlannerError::storage(format!(
                    "collection `{}` already has a text index",
                    plan.collection
                )));
            }
            state.indexes.push(spec.clone());
        }
        Ok(plan.indexes.iter().map(|i| i.name.clone()).collect())
    }
}

/// A document plus the engine metadata stages may attach to it.
#[derive(Debug, Clone)]
struct Row {
    doc: Map<String, JsonValue>,
    text_score: Option<f64>,
}

impl Row {
    fn new(doc: JsonValue) -> Self {
        let doc = match doc {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Self { doc, text_score: None }
    }
}

struct Evaluator<'a> {
    state: &'a CollectionState,
}

impl Evaluator<'_> {
    fn run(&self, mut rows: Vec<Row>, stages: &[PipelineStage], top_level: bool) -> Result<Vec<Row>, PlannerError> {
        for (position, stage) in stages.iter().enumerate() {
            rows = match stage {
                PipelineStage::Match(predicate) => {
                    if predicate.has_text() && (position != 0 || !top_level) {
                        return Err(PlannerError::storage("$match with $text must be the first stage"));
                    }
                    self.filter(rows, predicate)?
                }
                PipelineStage::GeoNear(geo) => {
                    if position != 0 || !top_level {
                        return Err(PlannerError::storage("$geoNear is only valid as the first stage"));
                    }
                    self.geo_near(rows, geo)?
                }
                PipelineStage::Project(projection) => project(rows, projection),
                PipelineStage::AddComputedFields(fields) => rows
                    .into_iter()
                    .map(|mut row| {
                        for field in fields {
                            let value = number(evaluate(&row, &field.expr));
                            set_path(&mut row.doc, &field.name, value);
                        }
                        row
                    })
                    .collect(),
                PipelineStage::Sort(keys) => {
                    let mut rows = rows;
                    rows.sort_by(|a, b| compare_rows(a, b, keys));
                    rows
                }
                PipelineStage::Skip(n) => rows.into_iter().skip(usize::try_from(*n).unwrap_or(usize::MAX)).collect(),
                PipelineStage::Limit(n) => rows.into_iter().take(usize::try_from(*n).unwrap_or(usize::MAX)).collect(),
                PipelineStage::Count(field) => {
                    if rows.is_empty() {
                        Vec::new()
                    } else {
                        let mut doc = Map::new();
                        doc.insert(field.clone(), JsonValue::from(rows.len() as u64));
                        vec![Row::new(JsonValue::Object(doc))]
                    }
                }
                PipelineStage::Facet(branches) => {
                    if !top_level {
                        return Err(PlannerError::storage("$facet cannot be nested"));
                    }
                    let mut doc = Map::new();
                    for branch in branches {
                        let output = self.run(rows.clone(), &branch.stages, false)?;
                        let items = output.into_iter().map(|row| JsonValue::Object(row.doc)).collect();
                        doc.insert(branch.name.clone(), JsonValue::Array(items));
                    }
                    vec![Row::new(JsonValue::Object(doc))]
                }
            };
        }
        Ok(rows)
    }

    fn filter(&self, rows: Vec<Row>, predicate: &PredicateDocument) -> Result<Vec<Row>, PlannerError> {
        let matcher = Matcher::new(predicate, self.state)?;
        let mut kept = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Some(score) = matcher.matches(&row.doc) {
                if predicate.has_text() {
                    row.text_score = Some(score);
                }
                kept.push(row);
            }
        }
        Ok(kept)
    }

    fn geo_near(&self, rows: Vec<Row>, geo: &GeoNearStage) -> Result<Vec<Row>, PlannerError> {
        if !self.state.has_geo_index(&geo.key) {
            return Err(PlannerError::storage(format!(
                "$geoNear requires a 2dsphere index on `{}`",
                geo.key
            )));
        }
        if geo.query.has_text() {
            return Err(PlannerError::storage("$geoNear query cannot contain $text"));
        }
        let matcher = Matcher::new(&geo.query, self.state)?;
        let mut near: Vec<(f64, Row)> = rows
            .into_iter()
            .filter(|row| matcher.matches(&row.doc).is_some())
            .filter_map(|row| {
                let point = point_at(&row.doc, &geo.key)?;
                let distance = haversine_meters(geo.near, point);
                (distance <= geo.max_distance_meters).then_some((distance, row))
            })
            .collect();
        near.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(near
            .into_iter()
            .map(|(distance, mut row)| {
                set_path(&mut row.doc, &geo.distance_field, number(distance));
                row
            })
            .collect())
    }
}

struct Matcher<'a> {
    clauses: Vec<Compiled<'a>>,
}

enum Compiled<'a> {
    Clause(&'a Clause),
    Regex { field: &'a str, regex: regex::Regex },
    Text { terms: Vec<String>, weights: &'a [(String, u32)] },
}

impl<'a> Matcher<'a> {
    fn new(predicate: &'a PredicateDocument, state: &'a CollectionState) -> Result<Self, PlannerError> {
        let mut clauses = Vec::with_capacity(predicate.len());
        for clause in predicate.clauses() {
            clauses.push(match clause {
                Clause::Regex { field, pattern } => {
                    let regex = RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|err| PlannerError::storage(format!("invalid $regex `{}`: {}", pattern, err)))?;
                    Compiled::Regex {
                        field: field.as_str(),
                        regex,
                    }
                }
                Clause::Text { search } => {
                    let weights = state
                        .text_weights()
                        .ok_or_else(|| PlannerError::storage("text index required for $text query"))?;
                    Compiled::Text {
                        terms: tokenize(search),
                        weights,
                    }
                }
                other => Compiled::Clause(other),
            });
        }
        Ok(Self { clauses })
    }

    /// `Some(text_score)` when every clause matches; the score is 0 without a text clause.
    fn matches(&self, doc: &Map<String, JsonValue>) -> Option<f64> {
        let mut score = 0.0;
        for clause in &self.clauses {
            let matched = match clause {
                Compiled::Clause(Clause::Equals { field, value }) => {
                    any_value(doc, field, |v| scalar_equals(v, value))
                }
                Compiled::Clause(Clause::Range { field, min, max }) => any_value(doc, field, |v| {
                    v.as_f64()
                        .is_some_and(|n| min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m))
                }),
                Compiled::Clause(Clause::In { field, values }) => {
                    any_value(doc, field, |v| v.as_str().is_some_and(|s| values.iter().any(|x| x == s)))
                }
                Compiled::Regex { field, regex } => {
                    any_value(doc, field, |v| v.as_str().is_some_and(|s| regex.is_match(s)))
                }
                Compiled::Text { terms, weights } => {
                    let relevance = text_relevance(doc, terms, weights);
                    score = relevance;
                    relevance > 0.0
                }
                // Compiled separately above.
                Compiled::Clause(Clause::Regex { .. } | Clause::Text { .. }) => false,
            };
            if !matched {
                return None;
            }
        }
        Some(score)
    }
}

fn scalar_equals(value: &JsonValue, expected: &Scalar) -> bool {
    match expected {
        Scalar::Str(s) => value.as_str() == Some(s.as_str()),
        Scalar::Bool(b) => value.as_bool() == Some(*b),
        Scalar::Number(n) => value.as_f64() == Some(*n),
    }
}

/// Resolve a dotted path, descending through arrays of sub-documents.
fn lookup<'v>(value: &'v JsonValue, path: &[&str], out: &mut Vec<&'v JsonValue>) {
    let Some((head, rest)) = path.split_first() else {
        out.push(value);
        return;
    };
    match value {
        JsonValue::Object(map) => {
            if let Some(next) = map.get(*head) {
                lookup(next, rest, out);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                if item.is_object() {
                    lookup(item, path, out);
                }
            }
        }
        _ => {}
    }
}

fn values_at<'v>(doc: &'v Map<String, JsonValue>, path: &str) -> Vec<&'v JsonValue> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((head, rest)) = segments.split_first()
        && let Some(value) = doc.get(*head)
    {
        lookup(value, rest, &mut out);
    }
    out
}

/// True when the value at `path`, or any element of an array there, satisfies `predicate`.
fn any_value(doc: &Map<String, JsonValue>, path: &str, predicate: impl Fn(&JsonValue) -> bool) -> bool {
    values_at(doc, path).into_iter().any(|value| match value {
        JsonValue::Array(items) => items.iter().any(&predicate),
        other => predicate(other),
    })
}

fn first_value<'v>(doc: &'v Map<String, JsonValue>, path: &str) -> Option<&'v JsonValue> {
    values_at(doc, path).into_iter().next()
}

fn set_path(doc: &mut Map<String, JsonValue>, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

fn remove_path(doc: &mut Map<String, JsonValue>, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(JsonValue::Object(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

fn project(rows: Vec<Row>, projection: &Projection) -> Vec<Row> {
    rows.into_iter()
        .map(|mut row| {
            for field in &projection.exclude {
                remove_path(&mut row.doc, field);
            }
            row
        })
        .collect()
}

fn evaluate(row: &Row, expr: &Expression) -> f64 {
    match expr {
        Expression::TextScore => row.text_score.unwrap_or(0.0),
        Expression::Field { path, default } => first_value(&row.doc, path)
            .and_then(JsonValue::as_f64)
            .unwrap_or(*default),
        Expression::FlagBonus { path, bonus } => match first_value(&row.doc, path) {
            Some(JsonValue::Bool(true)) => *bonus,
            _ => 0.0,
        },
        Expression::Scale { factor, expr } => factor * evaluate(row, expr),
        Expression::Sum(terms) => terms.iter().map(|t| evaluate(row, t)).sum(),
    }
}

fn number(value: f64) -> JsonValue {
    Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    terms.dedup();
    terms
}

fn text_relevance(doc: &Map<String, JsonValue>, terms: &[String], weights: &[(String, u32)]) -> f64 {
    let mut relevance = 0.0;
    for (path, weight) in weights {
        for value in values_at(doc, path) {
            let texts: Vec<&str> = match value {
                JsonValue::String(s) => vec![s.as_str()],
                JsonValue::Array(items) => items.iter().filter_map(JsonValue::as_str).collect(),
                _ => Vec::new(),
            };
            for text in texts {
                let hits = tokenize(text).iter().filter(|t| terms.contains(t)).count();
                relevance += f64::from(*weight) * hits as f64;
            }
        }
    }
    relevance
}

/// GeoJSON point (`{type: "Point", coordinates: [lng, lat]}`) or legacy `[lng, lat]` pair.
fn point_at(doc: &Map<String, JsonValue>, path: &str) -> Option<GeoPoint> {
    let value = first_value(doc, path)?;
    let coordinates = match value {
        JsonValue::Object(map) => map.get("coordinates")?,
        other => other,
    };
    let pair = coordinates.as_array()?;
    let longitude = pair.first()?.as_f64()?;
    let latitude = pair.get(1)?.as_f64()?;
    Some(GeoPoint::new(latitude, longitude))
}

pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

fn type_rank(value: Option<&JsonValue>) -> u8 {
    match value {
        None | Some(JsonValue::Null) => 0,
        Some(JsonValue::Number(_)) => 1,
        Some(JsonValue::String(_)) => 2,
        Some(JsonValue::Object(_)) => 3,
        Some(JsonValue::Array(_)) => 4,
        Some(JsonValue::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        // Extended JSON dates serialize as `{"$date": "<iso>"}`, which orders correctly as text.
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    }
}

fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = compare_values(first_value(&a.doc, &key.field), first_value(&b.doc, &key.field));
        let ordering = match key.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
