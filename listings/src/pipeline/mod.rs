//! # Aggregation Pipeline Model
//!
//! Every stage is plain data with no driver handles inside, so the optimizer can
//! inspect and reorder a stage list freely and tests can compare pipelines with `==`.
//!
//! | Stage               | Rendered as  | Precedence class |
//! |---------------------|--------------|------------------|
//! | `Match`             | `$match`     | 1 (selection)    |
//! | `GeoNear`           | `$geoNear`   | 1 (selection)    |
//! | `Project`           | `$project`   | 2 (shaping)      |
//! | `AddComputedFields` | `$addFields` | 3 (computation)  |
//! | `Sort`              | `$sort`      | 4 (ordering)     |
//! | `Skip` / `Limit`    | `$skip` ...  | 5 (truncation)   |
//! | `Count` / `Facet`   | `$count` ... | 5 (truncation)   |
//!
//! Rendering to BSON lives in [`render`].

pub mod render;

use mongodb::bson::Document;
use serde_json::Value as JsonValue;

use crate::planner::predicate::PredicateDocument;
use crate::search::SortOrder;

/// Name of the branch holding the requested page inside the pagination facet.
pub const FACET_DATA: &str = "data";
/// Name of the branch holding the total match count inside the pagination facet.
pub const FACET_COUNT: &str = "count";
/// Field written by the count branch.
pub const COUNT_FIELD: &str = "total";
/// Field the geo stage writes the computed distance (meters) into.
pub const DISTANCE_FIELD: &str = "distance";
/// Field the ranking stage writes the relevance/popularity scalar into.
pub const SCORE_FIELD: &str = "score";
/// Popularity blend kept next to `score` when `score` holds text relevance.
pub const POPULARITY_FIELD: &str = "popularity";

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// Exclusion projection: drops heavy fields that list views never render.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub exclude: Vec<String>,
}

/// Arithmetic expressions understood by `$addFields`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Engine-native text-match relevance (`{$meta: "textScore"}`).
    TextScore,
    /// Numeric field value, `default` when missing or null.
    Field { path: String, default: f64 },
    /// `bonus` when the field is exactly `true`, otherwise 0.
    FlagBonus { path: String, bonus: f64 },
    Scale { factor: f64, expr: Box<Expression> },
    Sum(Vec<Expression>),
}

impl Expression {
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field {
            path: path.into(),
            default: 0.0,
        }
    }

    pub fn scaled(factor: f64, expr: Expression) -> Self {
        Self::Scale {
            factor,
            expr: Box::new(expr),
        }
    }

    pub fn flag_bonus(path: impl Into<String>, bonus: f64) -> Self {
        Self::FlagBonus {
            path: path.into(),
            bonus,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedField {
    pub name: String,
    pub expr: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoNearStage {
    pub near: GeoPoint,
    /// Field carrying the 2dsphere-indexed GeoJSON point.
    pub key: String,
    pub distance_field: String,
    pub max_distance_meters: f64,
    /// Full filter predicate; proximity and boolean filtering happen in the same stage.
    pub query: PredicateDocument,
    pub spherical: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacetBranch {
    pub name: String,
    pub stages: Vec<PipelineStage>,
}

impl FacetBranch {
    pub fn new(name: impl Into<String>, stages: Vec<PipelineStage>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Match(PredicateDocument),
    Project(Projection),
    AddComputedFields(Vec<ComputedField>),
    GeoNear(GeoNearStage),
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    /// Only emitted inside a facet branch.
    Count(String),
    Facet(Vec<FacetBranch>),
}

impl PipelineStage {
    /// Operator name as it appears in the rendered pipeline.
    pub const fn operator(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Project(_) => "$project",
            Self::AddComputedFields(_) => "$addFields",
            Self::GeoNear(_) => "$geoNear",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Count(_) => "$count",
            Self::Facet(_) => "$facet",
        }
    }

    /// Precedence class used by the optimizer; lower runs earlier.
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Match(_) | Self::GeoNear(_) => 1,
            Self::Project(_) => 2,
            Self::AddComputedFields(_) => 3,
            Self::Sort(_) => 4,
            Self::Skip(_) | Self::Limit(_) | Self::Count(_) | Self::Facet(_) => 5,
        }
    }

    /// Selection stages are the only ones that can be answered from an index.
    pub const fn is_selection(&self) -> bool {
        matches!(self, Self::Match(_) | Self::GeoNear(_))
    }
}

/// Ordered stage sequence handed to the storage driver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<PipelineStage> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage documents in driver format.
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(render::stage_document).collect()
    }

    /// Relaxed extended JSON rendering, for logs and `listings plan`.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.stages.iter().map(render::stage_json).collect())
    }
}

impl From<Vec<PipelineStage>> for Pipeline {
    fn from(stages: Vec<PipelineStage>) -> Self {
        Self::new(stages)
    }
}
