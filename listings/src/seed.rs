//! Fixture data for local development and demos.
//!
//! Nothing here runs implicitly: documents are only written by `listings seed`
//! or an explicit [`seed_if_empty`] call, and never into a non-empty collection.

use chrono::{Duration, SecondsFormat, Utc};
use nanoid::nanoid;
use serde_json::{Map, Value as JsonValue, json};

use crate::errors::PlannerError;
use crate::pipeline::GeoPoint;
use crate::runtime::DocumentStore;
use crate::types::CollectionProfile;

/// Alphabet for fixture ids (no ambiguous glyphs).
const LISTING_ID_ALPHABET: [char; 46] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const LISTING_ID_LENGTH: usize = 20;

pub const DEFAULT_FIXTURE_COUNT: usize = 12;

/// Kolkata city centre; fixtures are scattered within roughly 15 km of it.
pub const FIXTURE_ORIGIN: GeoPoint = GeoPoint::new(22.5726, 88.3639);

const AREAS: [&str; 6] = ["Park Street", "Salt Lake", "New Town", "Ballygunge", "Howrah", "Esplanade"];
const AMENITIES: [&str; 6] = ["wifi", "parking", "pool", "restaurant", "gym", "wheelchair-access"];

pub fn generate_listing_id() -> String {
    nanoid!(LISTING_ID_LENGTH, &LISTING_ID_ALPHABET)
}

fn categories(profile: &CollectionProfile) -> &'static [&'static str] {
    match profile.name.as_str() {
        "hotels" => &["luxury", "boutique", "budget"],
        "restaurants" => &["bengali", "chinese", "continental", "mughlai"],
        "attractions" => &["museum", "heritage", "park"],
        "sports" => &["football", "cricket", "badminton", "swimming"],
        "events" => &["concert", "festival", "workshop"],
        _ => &["standard", "premium"],
    }
}

fn set_path(doc: &mut Map<String, JsonValue>, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if let JsonValue::Object(child) = child {
                set_path(child, rest, value);
            }
        }
    }
}

fn has_path(doc: &Map<String, JsonValue>, path: &str) -> bool {
    match path.split_once('.') {
        None => doc.contains_key(path),
        Some((head, rest)) => matches!(doc.get(head), Some(JsonValue::Object(child)) if has_path(child, rest)),
    }
}

fn extended_date(at: chrono::DateTime<Utc>) -> JsonValue {
    json!({ "$date": at.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

/// Build `count` fixture documents laid out for `profile`.
///
/// Every fifth document is a draft so visibility filtering has something to hide.
pub fn fixtures(profile: &CollectionProfile, count: usize) -> Vec<JsonValue> {
    let now = Utc::now();
    let categories = categories(profile);
    let singular = profile.name.trim_end_matches('s');

    (0..count)
        .map(|i| {
            let n = i as f64;
            let mut doc = Map::new();
            doc.insert("_id".to_string(), JsonValue::String(generate_listing_id()));
            set_path(&mut doc, "name", json!(format!("{} {}", title_case(singular), i + 1)));
            set_path(
                &mut doc,
                "description",
                json!(format!("A {} in {}.", categories[i % categories.len()], AREAS[i % AREAS.len()])),
            );
            set_path(&mut doc, "tags", json!([categories[i % categories.len()], "kolkata"]));

            let status = if i % 5 == 4 { "draft" } else { profile.visible_status.as_str() };
            set_path(&mut doc, &profile.status_field, json!(status));
            set_path(&mut doc, &profile.category_field, json!(categories[i % categories.len()]));
            set_path(
                &mut doc,
                &profile.amenities_field,
                json!([AMENITIES[i % AMENITIES.len()], AMENITIES[(i + 2) % AMENITIES.len()]]),
            );
            set_path(&mut doc, &profile.area_field, json!(AREAS[i % AREAS.len()]));

            // Spiral outwards so distances are distinct.
            let angle = n * 0.9;
            let radius_deg = 0.01 + n * 0.011;
            set_path(
                &mut doc,
                &profile.location_field,
                json!({
                    "type": "Point",
                    "coordinates": [
                        FIXTURE_ORIGIN.longitude + radius_deg * angle.cos(),
                        FIXTURE_ORIGIN.latitude + radius_deg * angle.sin(),
                    ],
                }),
            );

            set_path(&mut doc, &profile.rating_field, json!(((25 + (i * 7) % 25) as f64) / 10.0));
            set_path(&mut doc, "rating.count", json!(10 + i * 13));
            set_path(&mut doc, &profile.views_field, json!(150 + (i * 3_137) % 40_000));
            set_path(&mut doc, &profile.featured_field, json!(i % 4 == 0));
            set_path(&mut doc, &profile.promoted_field, json!(i % 6 == 1));
            set_path(
                &mut doc,
                &profile.created_field,
                extended_date(now - Duration::days(i as i64 * 3)),
            );

            for (k, range) in profile.ranges.iter().enumerate() {
                if !has_path(&doc, &range.path) {
                    let value = if range.name == "price" {
                        json!(500 + ((i + k) * 450) % 6_000)
                    } else {
                        json!(1 + (i + k) % 5)
                    };
                    set_path(&mut doc, &range.path, value);
                }
            }
            for sort in &profile.sorts {
                if sort.path != crate::pipeline::SCORE_FIELD && !has_path(&doc, &sort.path) {
                    set_path(&mut doc, &sort.path, extended_date(now + Duration::days(i as i64 * 2 + 1)));
                }
            }

            JsonValue::Object(doc)
        })
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Insert fixtures into the profile's collection if, and only if, it is empty.
/// Returns the number of documents written.
pub async fn seed_if_empty<S>(store: &S, profile: &CollectionProfile, count: usize) -> Result<u64, PlannerError>
where
    S: DocumentStore,
{
    let existing = store.count(&profile.collection).await?;
    if existing > 0 {
        log::info!(
            "skipping seed of `{}`: collection already holds {} documents",
            profile.collection,
            existing
        );
        return Ok(0);
    }
    let inserted = store.insert_many(&profile.collection, fixtures(profile, count)).await?;
    log::info!("seeded {} documents into `{}`", inserted, profile.collection);
    Ok(inserted)
}
