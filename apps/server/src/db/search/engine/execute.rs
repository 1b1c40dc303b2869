use super::QueryEngine;
use crate::db::query::ListQuery;
use crate::db::search::envelope::{PaginationInfo, ResultEnvelope, ResultMeta};
use crate::db::search::params::{FilterSpec, PaginationSpec, SortSpec};
use crate::db::store::{Connector, StoreClient, StorePage};
use crate::error::{Error, StoreError};
use crate::models::{ListingRow, Resource};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Serialize)]
struct CacheKeyParts<'a> {
    filters: &'a FilterSpec,
    sort: &'a SortSpec,
    page: i64,
    limit: i64,
    /// Only present when results depend on the current day.
    #[serde(skip_serializing_if = "Option::is_none")]
    today: Option<NaiveDate>,
}

impl<C: Connector> QueryEngine<C> {
    /// Cache key covering the full query identity, prefixed with the resource name.
    pub(super) fn cache_key(
        &self,
        resource: Resource,
        filters: &FilterSpec,
        sort: &SortSpec,
        pagination: &PaginationSpec,
        today: NaiveDate,
    ) -> Result<String> {
        let parts = CacheKeyParts {
            filters,
            sort,
            page: pagination.page,
            limit: pagination.limit,
            today: filters.event_status.map(|_| today),
        };
        let encoded = serde_json::to_string(&parts)
            .map_err(|e| Error::Internal(format!("failed to encode cache key: {e}")))?;
        Ok(format!("{}:{}", resource.as_str(), encoded))
    }

    /// Serve from cache, otherwise run the query on a pooled handle with retries.
    pub(super) async fn fetch_cached(&self, key: &str, query: ListQuery) -> Result<StorePage> {
        let page = self
            .cache
            .get(key, || self.fetch(query), self.settings.cache_ttl)
            .await?;
        Ok(page)
    }

    async fn fetch(&self, query: ListQuery) -> std::result::Result<StorePage, StoreError> {
        self.pool
            .execute_with_retry::<StorePage, _>(move |client| {
                let query = query.clone();
                Box::pin(async move { client.fetch_page(&query).await })
            })
            .await
    }

    pub(super) fn decode_rows<R: ListingRow>(
        &self,
        rows: Vec<JsonValue>,
        today: NaiveDate,
    ) -> Result<Vec<R>> {
        rows.into_iter()
            .map(|row| {
                let mut item: R =
                    serde_json::from_value(row).map_err(|source| Error::RowDecode {
                        resource: R::RESOURCE.as_str(),
                        source,
                    })?;
                item.compute_derived(today);
                Ok(item)
            })
            .collect()
    }

    pub(super) fn envelope<R: ListingRow>(
        &self,
        data: Vec<R>,
        total: i64,
        filters: &FilterSpec,
        sort: &SortSpec,
        pagination: &PaginationSpec,
        started: tokio::time::Instant,
    ) -> ResultEnvelope<R> {
        ResultEnvelope {
            data,
            pagination: PaginationInfo::new(pagination.page, pagination.limit, total),
            meta: ResultMeta {
                filters: filters.clone(),
                sort: sort.clone(),
                query_time: started.elapsed().as_millis() as u64,
            },
        }
    }
}
