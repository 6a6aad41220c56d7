//! The pagination contract: raw `skip`/`take` query parameters validated
//! against configured bounds, and uniform `{ items, totalCount }` shaping.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Raw, unvalidated query parameters. Signed so out-of-range values reach the
/// validator and produce an explicit message instead of a deserializer 400.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

/// Configured pagination bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub default_take: usize,
    pub max_take: usize,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            default_take: 20,
            max_take: 100,
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: usize,
    pub take: usize,
}

impl PageParams {
    /// Validate against the configured bounds. Out-of-range values are
    /// rejected, never clamped, so clients get explicit feedback.
    pub fn validate(self, limits: &PaginationLimits) -> Result<PageRequest, ApiError> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(ApiError::validation(format!("skip must be >= 0, got {skip}")));
        }
        let take = self.take.unwrap_or(limits.default_take as i64);
        if take <= 0 {
            return Err(ApiError::validation(format!("take must be > 0, got {take}")));
        }
        if take as usize > limits.max_take {
            return Err(ApiError::validation(format!(
                "take must be <= {}, got {take}",
                limits.max_take
            )));
        }
        Ok(PageRequest {
            skip: skip as usize,
            take: take as usize,
        })
    }
}

/// One page of a collection, with the total of the unpaginated result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

impl<T> PageResult<T> {
    /// Assemble from a page the backend already cut, plus the exact total it
    /// computed from the same query.
    pub fn from_parts(items: Vec<T>, total_count: u64) -> Self {
        Self { items, total_count }
    }
}

impl<T: Clone> PageResult<T> {
    /// Shape an ordered, fully materialized result set. `totalCount` is taken
    /// before skip/take are applied.
    pub fn shape(full: &[T], request: PageRequest) -> Self {
        Self {
            items: full
                .iter()
                .skip(request.skip)
                .take(request.take)
                .cloned()
                .collect(),
            total_count: full.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PaginationLimits {
        PaginationLimits {
            default_take: 10,
            max_take: 50,
        }
    }

    #[test]
    fn test_defaults_applied_when_absent() {
        let request = PageParams::default().validate(&limits()).unwrap();
        assert_eq!(request, PageRequest { skip: 0, take: 10 });
    }

    #[test]
    fn test_take_zero_rejected_not_clamped() {
        let params = PageParams {
            skip: None,
            take: Some(0),
        };
        assert!(params.validate(&limits()).is_err());
    }

    #[test]
    fn test_negative_skip_rejected() {
        let params = PageParams {
            skip: Some(-1),
            take: Some(2),
        };
        assert!(params.validate(&limits()).is_err());
    }

    #[test]
    fn test_take_above_max_rejected_not_clamped() {
        let params = PageParams {
            skip: Some(0),
            take: Some(51),
        };
        let err = params.validate(&limits()).unwrap_err();
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_shape_middle_page() {
        let full = vec![1, 2, 3, 4, 5];
        let page = PageResult::shape(&full, PageRequest { skip: 0, take: 2 });
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total_count, 5);
    }

    #[test]
    fn test_shape_past_the_end_is_empty_with_full_total() {
        let full = vec![1, 2, 3, 4, 5];
        let page = PageResult::shape(&full, PageRequest { skip: 10, take: 2 });
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 5);
    }

    #[test]
    fn test_serialized_field_names() {
        let page = PageResult::from_parts(vec![1, 2], 7);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalCount"], 7);
        assert_eq!(json["items"], serde_json::json!([1, 2]));
    }
}
