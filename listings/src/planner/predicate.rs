//! Filter predicate model and builder.
//!
//! A [`PredicateDocument`] is a conjunction of tagged leaf clauses. It is engine
//! agnostic: rendering to a `$match` document lives in `pipeline::render`, and the
//! in-memory store evaluates the same clauses directly.

use crate::errors::PlannerError;
use crate::search::FilterRequest;
use crate::types::CollectionProfile;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Bool(bool),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Equality,
    Range,
    SetMembership,
    RegexSubstring,
    TextSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Equals { field: String, value: Scalar },
    /// Inclusive bounds; an absent bound is unconstrained.
    Range { field: String, min: Option<f64>, max: Option<f64> },
    /// Matches when the stored value, or any element of a stored array, is listed.
    In { field: String, values: Vec<String> },
    /// Case-insensitive substring. `pattern` is already regex-escaped.
    Regex { field: String, pattern: String },
    /// Full-text search over the collection's text index.
    Text { search: String },
}

impl Clause {
    pub const fn kind(&self) -> ClauseKind {
        match self {
            Clause::Equals { .. } => ClauseKind::Equality,
            Clause::Range { .. } => ClauseKind::Range,
            Clause::In { .. } => ClauseKind::SetMembership,
            Clause::Regex { .. } => ClauseKind::RegexSubstring,
            Clause::Text { .. } => ClauseKind::TextSearch,
        }
    }

    /// Case-insensitive substring clause; the needle is escaped so user input is literal.
    pub fn contains(field: impl Into<String>, needle: &str) -> Self {
        Clause::Regex {
            field: field.into(),
            pattern: regex::escape(needle),
        }
    }
}

/// Conjunction of leaf clauses. Holds at most one text-search leaf.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredicateDocument {
    clauses: Vec<Clause>,
}

impl PredicateDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build without the single-text-leaf check. Intended for tests and rendering.
    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn push(&mut self, clause: Clause) -> Result<(), PlannerError> {
        if clause.kind() == ClauseKind::TextSearch && self.has_text() {
            return Err(PlannerError::invalid_pipeline(
                "a predicate can hold only one text-search clause",
            ));
        }
        self.clauses.push(clause);
        Ok(())
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn has_text(&self) -> bool {
        self.clauses.iter().any(|c| c.kind() == ClauseKind::TextSearch)
    }

    pub fn text_search(&self) -> Option<&str> {
        self.clauses.iter().find_map(|c| match c {
            Clause::Text { search } => Some(search.as_str()),
            _ => None,
        })
    }
}

/// Turns a [`FilterRequest`] into a [`PredicateDocument`] using a profile's field names.
#[derive(Debug, Clone, Copy)]
pub struct PredicateBuilder<'a> {
    profile: &'a CollectionProfile,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(profile: &'a CollectionProfile) -> Self {
        Self { profile }
    }

    /// Build the predicate. Pure: identical input yields an identical document.
    pub fn build(&self, request: &FilterRequest) -> Result<PredicateDocument, PlannerError> {
        let profile = self.profile;
        let mut predicate = PredicateDocument::new();

        // Visibility baseline; filters cannot remove or override it.
        predicate.push(Clause::Equals {
            field: profile.status_field.clone(),
            value: Scalar::Str(profile.visible_status.clone()),
        })?;

        if !request.categories.is_empty() {
            predicate.push(Clause::In {
                field: profile.category_field.clone(),
                values: request.categories.clone(),
            })?;
        }

        for range in &request.ranges {
            let field = profile.range_field(&range.name).ok_or_else(|| {
                PlannerError::invalid_parameter(
                    "range",
                    format!("Unsupported range field for {}: {}", profile.name, range.name),
                )
            })?;
            if let (Some(min), Some(max)) = (range.min, range.max)
                && min > max
            {
                return Err(PlannerError::invalid_parameter(
                    range.name.as_str(),
                    format!("minimum {} is greater than maximum {}", min, max),
                ));
            }
            if range.is_unbounded() {
                continue;
            }
            predicate.push(Clause::Range {
                field: field.path.clone(),
                min: range.min,
                max: range.max,
            })?;
        }

        if let Some(rating) = request.min_rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(PlannerError::invalid_parameter(
                    "min_rating",
                    format!("rating floor must be between 0 and 5, got {}", rating),
                ));
            }
            predicate.push(Clause::Range {
                field: profile.rating_field.clone(),
                min: Some(rating),
                max: None,
            })?;
        }

        if !request.amenities.is_empty() {
            predicate.push(Clause::In {
                field: profile.amenities_field.clone(),
                values: request.amenities.clone(),
            })?;
        }

        if let Some(area) = request.area.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            predicate.push(Clause::contains(profile.area_field.clone(), area))?;
        }

        if request.featured_only {
            predicate.push(Clause::Equals {
                field: profile.featured_field.clone(),
                value: Scalar::Bool(true),
            })?;
        }

        if let Some(text) = request.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if profile.text_fields.is_empty() {
                return Err(PlannerError::invalid_parameter(
                    "q",
                    format!("{} does not support free-text search", profile.name),
                ));
            }
            predicate.push(Clause::Text {
                search: text.to_string(),
            })?;
        }

        Ok(predicate)
    }
}
