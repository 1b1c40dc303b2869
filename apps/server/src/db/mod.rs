//! Data-access layer: pooled store handles, result cache and the listing engine

pub mod cache;
pub mod pool;
pub mod query;
pub mod search;
pub mod store;

pub use cache::{CacheEntry, QueryCache};
pub use pool::{ConnectionPool, PoolConfig, PoolHandle, PoolStatus, RetryPolicy};
pub use query::ListQuery;
pub use search::{QueryEngine, ResultEnvelope};
pub use store::{Connector, MemoryStore, PgConnector, StoreClient, StorePage};
