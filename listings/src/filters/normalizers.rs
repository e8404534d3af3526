//! Normalizers for loosely-typed query-string values.
//!
//! Every parser takes the public parameter name so a failure surfaces as
//! `InvalidParameter` naming exactly what the client sent wrong.

use crate::errors::PlannerError;
use crate::search::{RangeFilter, SortOrder};

/// Parses a numeric bound value, treating `*` and blanks as "no bound".
pub fn parse_numeric_bound(field: &str, value: Option<&str>) -> Result<Option<f64>, PlannerError> {
    match value {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed == "*" {
                Ok(None)
            } else {
                parse_f64(field, trimmed).map(Some)
            }
        }
        None => Ok(None),
    }
}

pub fn parse_f64(field: &str, raw: &str) -> Result<f64, PlannerError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PlannerError::invalid_parameter(
            field,
            format!("Invalid numeric value: {}", trimmed),
        )),
    }
}

/// Parses an optional positive integer such as `page` or `page_size`.
pub fn parse_u64(field: &str, value: Option<&str>) -> Result<Option<u64>, PlannerError> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<u64>().map(Some).map_err(|_| {
        PlannerError::invalid_parameter(field, format!("Expected a non-negative integer, got {}", raw))
    })
}

pub fn parse_bool(field: &str, raw: &str) -> Result<bool, PlannerError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(PlannerError::invalid_parameter(
            field,
            format!("Invalid boolean value: {}", other),
        )),
    }
}

pub fn parse_sort_order(field: &str, raw: &str) -> Result<SortOrder, PlannerError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "asc" | "ascending" | "1" => Ok(SortOrder::Asc),
        "desc" | "descending" | "-1" => Ok(SortOrder::Desc),
        other => Err(PlannerError::invalid_parameter(
            field,
            format!("Unsupported sort order: {}", other),
        )),
    }
}

/// Splits a `a,b|c` list into trimmed, non-empty, de-duplicated values.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for segment in raw.split([',', '|']) {
        let value = segment.trim();
        if !value.is_empty() && !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    values
}

/// Parses a generic `name:min,max` range parameter. Either bound may be `*` or empty.
pub fn parse_range_param(raw: &str) -> Result<RangeFilter, PlannerError> {
    let (name, bounds) = raw.split_once(':').ok_or_else(|| {
        PlannerError::invalid_parameter("range", format!("Invalid range syntax: {}", raw))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(PlannerError::invalid_parameter(
            "range",
            format!("Range filter requires a field name: {}", raw),
        ));
    }

    let mut parts = bounds.splitn(2, ',');
    let min = parse_numeric_bound("range", parts.next())?;
    let max = parse_numeric_bound("range", parts.next())?;
    Ok(RangeFilter::new(name, min, max))
}

/// Trims a free-text query and collapses internal whitespace; blank input means "no query".
pub fn normalize_text(raw: Option<&str>) -> Option<String> {
    let collapsed = raw?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() { None } else { Some(collapsed) }
}
