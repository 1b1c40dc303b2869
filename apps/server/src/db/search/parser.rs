//! Request parameter normalization
//!
//! Turns untrusted query-string pairs into typed [`FilterSpec`], [`SortSpec`] and
//! [`PaginationSpec`] values. Parsing never fails: unusable values fall back to defaults, and
//! only malformed dates are reported, as collected [`ValidationIssue`]s.

use super::escape::sanitize_search;
use super::params::{parse_iso_datetime, FilterSpec, PaginationSpec, SortDirection, SortSpec};
use crate::config::QueryConfig;
use crate::error::{ValidationCode, ValidationIssue};
use crate::models::{EventStatus, Resource, StatusFilter};
use std::collections::HashMap;

pub const DEFAULT_PAGE_LIMIT: i64 = 12;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub filters: FilterSpec,
    pub sort: SortSpec,
    pub pagination: PaginationSpec,
    pub errors: Vec<ValidationIssue>,
}

impl ParsedRequest {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestParser {
    default_limit: i64,
    max_limit: i64,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl RequestParser {
    pub fn new(default_limit: i64, max_limit: i64) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.default_limit, config.max_page_limit)
    }

    /// Parse raw `key=value` pairs. The first occurrence of a key wins; empty values count as
    /// absent; unrecognized keys are ignored.
    pub fn parse(&self, resource: Resource, raw: &[(String, String)]) -> ParsedRequest {
        let mut params: HashMap<&str, &str> = HashMap::new();
        for (key, value) in raw {
            let value = value.trim();
            if !value.is_empty() {
                params.entry(key.as_str()).or_insert(value);
            }
        }
        let get = |key: &str| params.get(key).copied();

        let mut errors = Vec::new();
        let filters = FilterSpec {
            search: get("search")
                .map(sanitize_search)
                .filter(|s| !s.is_empty()),
            tag: get("tag").map(str::to_string),
            created_by: get("created_by").map(str::to_string),
            event_id: get("event_id").map(str::to_string),
            status: get("status").and_then(StatusFilter::parse),
            event_status: get("event_status").and_then(EventStatus::parse),
            date_from: parse_date_param("date_from", get("date_from"), &mut errors),
            date_to: parse_date_param("date_to", get("date_to"), &mut errors),
        };

        let sort = SortSpec::new(
            get("sort_by").unwrap_or(resource.default_sort_field()),
            SortDirection::from_param(get("sort_order")),
        );

        let page = positive_or(get("page"), 1);
        let limit = positive_or(get("limit"), self.default_limit).min(self.max_limit);

        ParsedRequest {
            filters,
            sort,
            pagination: PaginationSpec::new(page, limit),
            errors,
        }
    }
}

fn positive_or(value: Option<&str>, fallback: i64) -> i64 {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(fallback)
}

/// Keep a well-formed date; record a problem and drop a malformed one.
fn parse_date_param(
    field: &str,
    value: Option<&str>,
    errors: &mut Vec<ValidationIssue>,
) -> Option<String> {
    let value = value?;
    if parse_iso_datetime(value).is_some() {
        return Some(value.to_string());
    }
    errors.push(ValidationIssue::new(
        ValidationCode::InvalidDate,
        field,
        format!("{field} must be a valid ISO 8601 date"),
        Some(value.to_string()),
    ));
    None
}
