use super::QueryEngine;
use crate::db::search::params::{parse_iso_datetime, FilterSpec, PaginationSpec, SortSpec};
use crate::db::store::Connector;
use crate::error::{ValidationCode, ValidationIssue};
use crate::models::Resource;

impl<C: Connector> QueryEngine<C> {
    /// Append every problem with the request to `issues`.
    pub(super) fn validate(
        &self,
        resource: Resource,
        filters: &FilterSpec,
        sort: &SortSpec,
        pagination: &PaginationSpec,
        mut issues: Vec<ValidationIssue>,
    ) -> Vec<ValidationIssue> {
        if pagination.page < 1 {
            issues.push(ValidationIssue::new(
                ValidationCode::InvalidPage,
                "page",
                "page must be at least 1",
                Some(pagination.page.to_string()),
            ));
        }

        let max_limit = self.settings.max_limit;
        if pagination.limit < 1 || pagination.limit > max_limit {
            issues.push(ValidationIssue::new(
                ValidationCode::InvalidLimit,
                "limit",
                format!("limit must be between 1 and {max_limit}"),
                Some(pagination.limit.to_string()),
            ));
        }

        if !resource.is_sortable(&sort.field) {
            issues.push(ValidationIssue::new(
                ValidationCode::InvalidSortField,
                "sort_by",
                format!(
                    "sort_by must be one of: {}",
                    resource.sortable_fields().join(", ")
                ),
                Some(sort.field.clone()),
            ));
        }

        for (field, value) in [("date_from", &filters.date_from), ("date_to", &filters.date_to)] {
            let Some(value) = value else { continue };
            let already_reported = issues.iter().any(|i| i.field == field);
            if parse_iso_datetime(value).is_none() && !already_reported {
                issues.push(ValidationIssue::new(
                    ValidationCode::InvalidDate,
                    field,
                    format!("{field} must be a valid ISO 8601 date"),
                    Some(value.clone()),
                ));
            }
        }

        issues
    }
}
