use super::QueryEngine;
use crate::db::query::{CompareOp, Condition, FilterValue, ListQuery};
use crate::db::search::escape::search_tokens;
use crate::db::search::params::{parse_iso_datetime, FilterSpec, PaginationSpec, SortSpec};
use crate::db::store::Connector;
use crate::models::{ColumnKind, EventStatus, Resource, StatusFilter};
use chrono::NaiveDate;

impl<C: Connector> QueryEngine<C> {
    /// Translate validated parameters into a store query.
    ///
    /// Each search token must match at least one search field; tokens and structured filters
    /// are all AND'ed. Filters without a column on `resource` are skipped.
    pub(super) fn build_list_query(
        &self,
        resource: Resource,
        filters: &FilterSpec,
        sort: &SortSpec,
        pagination: &PaginationSpec,
        today: NaiveDate,
    ) -> ListQuery {
        let mut query = ListQuery::new(resource)
            .order_by(
                resource.resolve_sort_field(&sort.field),
                sort.direction.is_ascending(),
            )
            .window(pagination.offset(), pagination.limit);

        if let Some(search) = &filters.search {
            for token in search_tokens(search) {
                query = query.with_condition(Condition::AnyContains {
                    columns: resource.search_fields().to_vec(),
                    needle: token.to_string(),
                });
            }
        }

        let columns = resource.filter_columns();
        let text_filters = [
            (columns.tag, &filters.tag),
            (columns.created_by, &filters.created_by),
            (columns.linked_id, &filters.event_id),
        ];
        for (column, value) in text_filters {
            if let (Some(column), Some(value)) = (column, value) {
                query = query.with_condition(eq(column, FilterValue::Text(value.clone())));
            }
        }

        if let (Some(column), Some(status)) = (columns.revoked, filters.status) {
            let revoked = match status {
                StatusFilter::All => None,
                StatusFilter::Active => Some(false),
                StatusFilter::Revoked => Some(true),
            };
            if let Some(revoked) = revoked {
                query = query.with_condition(eq(column, FilterValue::Bool(revoked)));
            }
        }

        if let (Some(column), Some(status)) = (columns.event_date, filters.event_status) {
            let op = match status {
                EventStatus::Upcoming => CompareOp::Gt,
                EventStatus::Ongoing => CompareOp::Eq,
                EventStatus::Ended => CompareOp::Lt,
            };
            query = query.with_condition(Condition::Compare {
                column,
                op,
                value: FilterValue::Date(today),
            });
        }

        let range_kind = resource
            .column(columns.date_range)
            .map(|c| c.kind)
            .unwrap_or(ColumnKind::Timestamp);
        let bounds = [
            (&filters.date_from, CompareOp::Gte),
            (&filters.date_to, CompareOp::Lte),
        ];
        for (value, op) in bounds {
            let Some(instant) = value.as_deref().and_then(parse_iso_datetime) else {
                continue;
            };
            let value = match range_kind {
                ColumnKind::Date => FilterValue::Date(instant.date_naive()),
                _ => FilterValue::Timestamp(instant),
            };
            query = query.with_condition(Condition::Compare {
                column: columns.date_range,
                op,
                value,
            });
        }

        query
    }
}

fn eq(column: &'static str, value: FilterValue) -> Condition {
    Condition::Compare {
        column,
        op: CompareOp::Eq,
        value,
    }
}
