//! Single-pass faceted pagination.
//!
//! The upstream stages feed one `$facet` with two branches: `data` (skip + limit)
//! and `count` (`$count`). Both branches see the same filtered, sorted stream, so
//! the reported total always matches what pages are drawn from.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::errors::PlannerError;
use crate::pipeline::{COUNT_FIELD, FACET_COUNT, FACET_DATA, FacetBranch, Pipeline, PipelineStage};

#[derive(Debug, Clone, Copy, Default)]
pub struct FacetedPager;

impl FacetedPager {
    pub fn paginate(&self, stages: Vec<PipelineStage>, page: u64, page_size: u64) -> Result<Pipeline, PlannerError> {
        validate_page(page, page_size)?;
        let skip = (page - 1).saturating_mul(page_size);

        let mut stages = stages;
        stages.push(PipelineStage::Facet(vec![
            FacetBranch::new(FACET_DATA, vec![PipelineStage::Skip(skip), PipelineStage::Limit(page_size)]),
            FacetBranch::new(FACET_COUNT, vec![PipelineStage::Count(COUNT_FIELD.to_string())]),
        ]));
        Ok(Pipeline::new(stages))
    }
}

fn validate_page(page: u64, page_size: u64) -> Result<(), PlannerError> {
    if page < 1 {
        return Err(PlannerError::invalid_parameter("page", "page must be at least 1"));
    }
    if page_size == 0 {
        return Err(PlannerError::invalid_parameter("page_size", "page_size must be greater than 0"));
    }
    Ok(())
}

/// One page of results plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, page: u64, page_size: u64) -> Self {
        Self {
            has_next: page.saturating_mul(page_size) < total_count,
            has_prev: page > 1,
            items,
            total_count,
            page,
            page_size,
        }
    }

    pub fn empty(page: u64, page_size: u64) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }
}

/// Convert the documents returned for a paginated pipeline into a [`PageResult`].
///
/// The engine emits one facet document. An empty upstream yields `data: []` and
/// `count: []` (no count document at all); both read as an empty page, not an error.
pub fn to_page_result<T>(facet_output: Vec<JsonValue>, page: u64, page_size: u64) -> Result<PageResult<T>, PlannerError>
where
    T: DeserializeOwned,
{
    validate_page(page, page_size)?;

    let Some(facet) = facet_output.into_iter().next() else {
        return Ok(PageResult::empty(page, page_size));
    };

    let mut facet = match facet {
        JsonValue::Object(map) => map,
        other => {
            return Err(PlannerError::storage(format!("facet output is not a document: {}", other)));
        }
    };

    let data = match facet.remove(FACET_DATA) {
        Some(JsonValue::Array(items)) => items,
        Some(other) => {
            return Err(PlannerError::storage(format!("facet `data` branch is not an array: {}", other)));
        }
        None => return Err(PlannerError::storage("facet output is missing the `data` branch")),
    };

    let total_count = match facet.remove(FACET_COUNT) {
        Some(JsonValue::Array(counts)) => match counts.first() {
            Some(count) => read_total(count)?,
            None => 0,
        },
        Some(JsonValue::Null) | None => 0,
        Some(other) => {
            return Err(PlannerError::storage(format!("facet `count` branch is not an array: {}", other)));
        }
    };

    let items = data
        .into_iter()
        .map(|doc| {
            serde_json::from_value::<T>(doc)
                .map_err(|err| PlannerError::storage(format!("failed to deserialize listing document: {}", err)))
        })
        .collect::<Result<Vec<T>, PlannerError>>()?;

    Ok(PageResult::new(items, total_count, page, page_size))
}

fn read_total(count: &JsonValue) -> Result<u64, PlannerError> {
    let total = count.get(COUNT_FIELD).ok_or_else(|| {
        PlannerError::storage(format!("count document is missing `{}`: {}", COUNT_FIELD, count))
    })?;
    if let Some(n) = total.as_u64() {
        return Ok(n);
    }
    match total.as_f64() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
        _ => Err(PlannerError::storage(format!("invalid total count: {}", total))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paginate_appends_dual_branch_facet() {
        let pipeline = FacetedPager.paginate(Vec::new(), 3, 10).expect("pipeline");
        assert_eq!(
            pipeline.to_json(),
            json!([{
                "$facet": {
                    "data": [{ "$skip": 20 }, { "$limit": 10 }],
                    "count": [{ "$count": "total" }]
                }
            }])
        );
    }

    #[test]
    fn paginate_rejects_zero_page_and_size() {
        assert!(matches!(
            FacetedPager.paginate(Vec::new(), 0, 10),
            Err(PlannerError::InvalidParameter { .. })
        ));
        assert!(matches!(
            FacetedPager.paginate(Vec::new(), 1, 0),
            Err(PlannerError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn page_flags_follow_total_count() {
        let result: PageResult<JsonValue> = to_page_result(
            vec![json!({ "data": [{ "n": 6 }, { "n": 7 }], "count": [{ "total": 12 }] })],
            2,
            5,
        )
        .expect("page result");
        assert_eq!(result.total_count, 12);
        assert!(result.has_next);
        assert!(result.has_prev);
        assert_eq!(result.total_pages(), 3);

        let last: PageResult<JsonValue> =
            to_page_result(vec![json!({ "data": [{ "n": 11 }], "count": [{ "total": 11 }] })], 3, 5)
                .expect("page result");
        assert!(!last.has_next);
    }

    #[test]
    fn empty_upstream_is_an_empty_page() {
        let result: PageResult<JsonValue> =
            to_page_result(vec![json!({ "data": [], "count": [] })], 1, 10).expect("page result");
        assert_eq!(result, PageResult::empty(1, 10));

        let result: PageResult<JsonValue> = to_page_result(Vec::new(), 1, 10).expect("page result");
        assert_eq!(result.total_count, 0);
        assert!(!result.has_prev);
    }

    #[test]
    fn malformed_facet_output_is_a_storage_error() {
        let err = to_page_result::<JsonValue>(vec![json!({ "count": [{ "total": 1 }] })], 1, 10)
            .expect_err("missing data should fail");
        assert!(matches!(err, PlannerError::Storage { .. }));

        let err = to_page_result::<JsonValue>(vec![json!({ "data": [], "count": [{ "total": "many" }] })], 1, 10)
            .expect_err("non-numeric total should fail");
        assert!(matches!(err, PlannerError::Storage { .. }));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let page = PageResult::new(vec![1, 2], 2, 1, 10);
        let json = serde_json::to_value(&page).expect("serialize");
        assert_eq!(
            json,
            json!({ "items": [1, 2], "totalCount": 2, "page": 1, "pageSize": 10, "hasNext": false, "hasPrev": false })
        );
    }
}
