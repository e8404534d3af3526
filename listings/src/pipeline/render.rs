//! BSON rendering for pipeline stages and predicates.

use mongodb::bson::{Bson, Document, doc};
use serde_json::Value as JsonValue;

use super::{ComputedField, Expression, FacetBranch, GeoNearStage, PipelineStage, SortKey};
use crate::planner::predicate::{Clause, PredicateDocument, Scalar};
use crate::search::SortOrder;

pub fn stage_document(stage: &PipelineStage) -> Document {
    match stage {
        PipelineStage::Match(predicate) => doc! { "$match": predicate_document(predicate) },
        PipelineStage::Project(projection) => {
            let mut fields = Document::new();
            for field in &projection.exclude {
                fields.insert(field.as_str(), 0_i32);
            }
            doc! { "$project": fields }
        }
        PipelineStage::AddComputedFields(fields) => doc! { "$addFields": computed_fields_document(fields) },
        PipelineStage::GeoNear(geo) => doc! { "$geoNear": geo_near_document(geo) },
        PipelineStage::Sort(keys) => doc! { "$sort": sort_document(keys) },
        PipelineStage::Skip(n) => doc! { "$skip": to_i64(*n) },
        PipelineStage::Limit(n) => doc! { "$limit": to_i64(*n) },
        PipelineStage::Count(field) => doc! { "$count": field.as_str() },
        PipelineStage::Facet(branches) => doc! { "$facet": facet_document(branches) },
    }
}

pub fn stage_json(stage: &PipelineStage) -> JsonValue {
    Bson::Document(stage_document(stage)).into_relaxed_extjson()
}

/// Render a conjunction. Clauses on distinct keys merge into one document; a
/// repeated key forces an explicit `$and` so no clause silently overwrites another.
pub fn predicate_document(predicate: &PredicateDocument) -> Document {
    let rendered: Vec<(String, Bson)> = predicate.clauses().iter().map(clause_entry).collect();

    let mut seen = std::collections::HashSet::with_capacity(rendered.len());
    let has_duplicates = rendered.iter().any(|(key, _)| !seen.insert(key.as_str()));

    if has_duplicates {
        let parts: Vec<Bson> = rendered
            .into_iter()
            .map(|(key, value)| {
                let mut single = Document::new();
                single.insert(key, value);
                Bson::Document(single)
            })
            .collect();
        doc! { "$and": parts }
    } else {
        let mut merged = Document::new();
        for (key, value) in rendered {
            merged.insert(key, value);
        }
        merged
    }
}

fn clause_entry(clause: &Clause) -> (String, Bson) {
    match clause {
        Clause::Equals { field, value } => (field.clone(), scalar_bson(value)),
        Clause::Range { field, min, max } => {
            let mut bounds = Document::new();
            if let Some(min) = min {
                bounds.insert("$gte", *min);
            }
            if let Some(max) = max {
                bounds.insert("$lte", *max);
            }
            (field.clone(), Bson::Document(bounds))
        }
        Clause::In { field, values } => {
            let values: Vec<Bson> = values.iter().map(|v| Bson::String(v.clone())).collect();
            (field.clone(), Bson::Document(doc! { "$in": values }))
        }
        Clause::Regex { field, pattern } => (
            field.clone(),
            Bson::Document(doc! { "$regex": pattern.as_str(), "$options": "i" }),
        ),
        Clause::Text { search } => ("$text".to_string(), Bson::Document(doc! { "$search": search.as_str() })),
    }
}

fn scalar_bson(value: &Scalar) -> Bson {
    match value {
        Scalar::Str(s) => Bson::String(s.clone()),
        Scalar::Bool(b) => Bson::Boolean(*b),
        Scalar::Number(n) => Bson::Double(*n),
    }
}

fn computed_fields_document(fields: &[ComputedField]) -> Document {
    let mut out = Document::new();
    for field in fields {
        out.insert(field.name.as_str(), expression_bson(&field.expr));
    }
    out
}

pub fn expression_bson(expr: &Expression) -> Bson {
    match expr {
        Expression::TextScore => Bson::Document(doc! { "$meta": "textScore" }),
        Expression::Field { path, default } => Bson::Document(doc! { "$ifNull": [format!("${path}"), *default] }),
        Expression::FlagBonus { path, bonus } => Bson::Document(doc! {
            "$cond": [{ "$eq": [format!("${path}"), true] }, *bonus, 0.0]
        }),
        Expression::Scale { factor, expr } => Bson::Document(doc! { "$multiply": [*factor, expression_bson(expr)] }),
        Expression::Sum(terms) => {
            let terms: Vec<Bson> = terms.iter().map(expression_bson).collect();
            Bson::Document(doc! { "$add": terms })
        }
    }
}

fn geo_near_document(geo: &GeoNearStage) -> Document {
    doc! {
        "near": {
            "type": "Point",
            "coordinates": [geo.near.longitude, geo.near.latitude],
        },
        "key": geo.key.as_str(),
        "distanceField": geo.distance_field.as_str(),
        "maxDistance": geo.max_distance_meters,
        "query": predicate_document(&geo.query),
        "spherical": geo.spherical,
    }
}

fn sort_document(keys: &[SortKey]) -> Document {
    let mut out = Document::new();
    for key in keys {
        let direction: i32 = match key.order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        out.insert(key.field.as_str(), direction);
    }
    out
}

fn facet_document(branches: &[FacetBranch]) -> Document {
    let mut out = Document::new();
    for branch in branches {
        let stages: Vec<Bson> = branch
            .stages
            .iter()
            .map(|stage| Bson::Document(stage_document(stage)))
            .collect();
        out.insert(branch.name.as_str(), stages);
    }
    out
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{GeoPoint, Projection};
    use serde_json::json;

    fn published() -> Clause {
        Clause::Equals {
            field: "status".to_string(),
            value: Scalar::Str("published".to_string()),
        }
    }

    #[test]
    fn range_renders_only_present_bounds() {
        let predicate = PredicateDocument::from_clauses(vec![Clause::Range {
            field: "price".to_string(),
            min: Some(50.0),
            max: None,
        }]);
        let rendered = predicate_document(&predicate);
        let bounds = rendered.get_document("price").expect("price clause");
        assert_eq!(bounds.get_f64("$gte").ok(), Some(50.0));
        assert!(!bounds.contains_key("$lte"));
    }

    #[test]
    fn repeated_field_is_rendered_as_explicit_and() {
        let predicate = PredicateDocument::from_clauses(vec![
            Clause::Range {
                field: "price".to_string(),
                min: Some(10.0),
                max: None,
            },
            Clause::Range {
                field: "price".to_string(),
                min: None,
                max: Some(90.0),
            },
        ]);
        let rendered = predicate_document(&predicate);
        let parts = rendered.get_array("$and").expect("$and wrapper");
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn text_and_regex_clauses_render_engine_operators() {
        let predicate = PredicateDocument::from_clauses(vec![
            published(),
            Clause::Text {
                search: "lake view".to_string(),
            },
            Clause::Regex {
                field: "area".to_string(),
                pattern: "park\\ street".to_string(),
            },
        ]);
        let json = Bson::Document(predicate_document(&predicate)).into_relaxed_extjson();
        assert_eq!(
            json,
            json!({
                "status": "published",
                "$text": { "$search": "lake view" },
                "area": { "$regex": "park\\ street", "$options": "i" }
            })
        );
    }

    #[test]
    fn geo_near_puts_longitude_first() {
        let stage = PipelineStage::GeoNear(GeoNearStage {
            near: GeoPoint::new(22.5726, 88.3639),
            key: "location".to_string(),
            distance_field: "distance".to_string(),
            max_distance_meters: 10_000.0,
            query: PredicateDocument::from_clauses(vec![published()]),
            spherical: true,
        });
        let rendered = stage_document(&stage);
        let geo = rendered.get_document("$geoNear").expect("geo stage");
        let coordinates = geo
            .get_document("near")
            .and_then(|near| near.get_array("coordinates"))
            .expect("coordinates");
        assert_eq!(coordinates[0].as_f64(), Some(88.3639));
        assert_eq!(coordinates[1].as_f64(), Some(22.5726));
        assert_eq!(geo.get_f64("maxDistance").ok(), Some(10_000.0));
        assert_eq!(geo.get_str("distanceField").ok(), Some("distance"));
    }

    #[test]
    fn projection_and_sort_render_directions() {
        let project = stage_json(&PipelineStage::Project(Projection {
            exclude: vec!["reviews".to_string()],
        }));
        assert_eq!(project, json!({ "$project": { "reviews": 0 } }));

        let sort = stage_json(&PipelineStage::Sort(vec![
            SortKey::new("score", SortOrder::Desc),
            SortKey::new("_id", SortOrder::Asc),
        ]));
        assert_eq!(sort, json!({ "$sort": { "score": -1, "_id": 1 } }));
    }

    #[test]
    fn flag_bonus_compares_against_true() {
        let rendered = expression_bson(&Expression::flag_bonus("isFeatured", 2.0));
        let doc = rendered.as_document().expect("document");
        let cond = doc.get_array("$cond").expect("$cond");
        assert_eq!(cond.len(), 3);
        assert_eq!(cond[1].as_f64(), Some(2.0));
    }
}
