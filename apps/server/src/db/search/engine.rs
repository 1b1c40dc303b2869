//! Listing query engine
//!
//! The QueryEngine is responsible for:
//! - Validating filter, sort and pagination values against per-resource rules
//! - Turning them into a store-neutral `ListQuery` (search tokens, structured filters, order)
//! - Executing through the query cache and the connection pool
//! - Decoding typed rows, filling derived fields and wrapping them in a `ResultEnvelope`

use crate::db::cache::QueryCache;
use crate::db::pool::ConnectionPool;
use crate::db::search::parser::RequestParser;
use crate::db::store::{Connector, StorePage};
use std::sync::Arc;
use std::time::Duration;

mod api;
mod execute;
mod filter;
mod validate;

pub const DEFAULT_MAX_QUERY_LIMIT: i64 = 1000;

/// Engine-level knobs fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub cache_ttl: Duration,
    /// Upper bound for `limit` accepted by `query`.
    pub max_limit: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(30_000),
            max_limit: DEFAULT_MAX_QUERY_LIMIT,
        }
    }
}

/// Query engine shared by the participant, event and log listings
pub struct QueryEngine<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
    cache: Arc<QueryCache<StorePage>>,
    parser: RequestParser,
    settings: EngineSettings,
}
