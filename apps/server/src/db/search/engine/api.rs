use super::{EngineSettings, QueryEngine};
use crate::config::Config;
use crate::db::cache::QueryCache;
use crate::db::pool::ConnectionPool;
use crate::db::search::envelope::ResultEnvelope;
use crate::db::search::params::{FilterSpec, PaginationSpec, SortSpec};
use crate::db::search::parser::RequestParser;
use crate::db::store::{Connector, StorePage};
use crate::error::Error;
use crate::models::ListingRow;
use crate::Result;
use std::sync::Arc;

impl<C: Connector> QueryEngine<C> {
    /// Create a new query engine.
    pub fn new(
        pool: Arc<ConnectionPool<C>>,
        cache: Arc<QueryCache<StorePage>>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            pool,
            cache,
            parser: RequestParser::default(),
            settings,
        }
    }

    /// Build the pool, cache and parser from configuration.
    pub fn from_config(connector: C, config: &Config) -> Self {
        let pool = Arc::new(ConnectionPool::new(
            connector,
            config.database.pool_config(),
        ));
        let cache = Arc::new(QueryCache::from_config(&config.cache));
        let settings = EngineSettings {
            cache_ttl: config.cache.ttl(),
            max_limit: config.query.max_query_limit,
        };
        Self::new(pool, cache, settings).with_parser(RequestParser::from_config(&config.query))
    }

    pub fn with_parser(mut self, parser: RequestParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<QueryCache<StorePage>> {
        &self.cache
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// List rows of `R`'s resource.
    ///
    /// Every validation problem is reported together in one [`Error::Validation`]; nothing
    /// reaches the store unless all checks pass. Store failures surface as
    /// [`Error::Database`] carrying the pool's final error.
    pub async fn query<R: ListingRow>(
        &self,
        filters: &FilterSpec,
        sort: &SortSpec,
        pagination: &PaginationSpec,
    ) -> Result<ResultEnvelope<R>> {
        self.run(filters, sort, pagination, Vec::new()).await
    }

    /// Parse raw request parameters, then [`QueryEngine::query`].
    ///
    /// Malformed dates found by the parser are reported alongside the engine's own checks.
    pub async fn list<R: ListingRow>(
        &self,
        raw_params: &[(String, String)],
    ) -> Result<ResultEnvelope<R>> {
        let parsed = self.parser.parse(R::RESOURCE, raw_params);
        self.run(
            &parsed.filters,
            &parsed.sort,
            &parsed.pagination,
            parsed.errors,
        )
        .await
    }

    async fn run<R: ListingRow>(
        &self,
        filters: &FilterSpec,
        sort: &SortSpec,
        pagination: &PaginationSpec,
        issues: Vec<crate::error::ValidationIssue>,
    ) -> Result<ResultEnvelope<R>> {
        let started = tokio::time::Instant::now();
        let resource = R::RESOURCE;

        let issues = self.validate(resource, filters, sort, pagination, issues);
        if !issues.is_empty() {
            return Err(Error::validation(issues, resource.sortable_fields()));
        }

        let today = self.cache.clock().today();
        let query = self.build_list_query(resource, filters, sort, pagination, today);
        let key = self.cache_key(resource, filters, sort, pagination, today)?;
        let page = self.fetch_cached(&key, query).await?;
        let data = self.decode_rows::<R>(page.rows, today)?;

        let envelope = self.envelope(data, page.total, filters, sort, pagination, started);
        tracing::debug!(
            resource = %resource,
            total = envelope.pagination.total,
            returned = envelope.data.len(),
            query_time_ms = envelope.meta.query_time,
            "Listing query complete"
        );
        Ok(envelope)
    }
}
