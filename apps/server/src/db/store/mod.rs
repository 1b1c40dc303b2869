//! Backing-store client seam
//!
//! A [`StoreClient`] is the opaque handle the pool hands out; it knows how to run one
//! [`ListQuery`] (filter, sort, range and exact count). A [`Connector`] manufactures clients,
//! both for the pool's fixed set and for ephemeral handles synthesized under contention.

pub mod memory;
pub mod postgres;

use crate::db::query::ListQuery;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use memory::{MemoryClient, MemoryStore};
pub use postgres::{PgClient, PgConnector};

/// One page of rows plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePage {
    /// Rows as JSON objects keyed by column name.
    pub rows: Vec<JsonValue>,
    pub total: i64,
}

#[async_trait]
pub trait StoreClient: Send + 'static {
    /// Run the query: apply its conditions, order, offset and limit, and count all matches.
    async fn fetch_page(&mut self, query: &ListQuery) -> Result<StorePage, StoreError>;
}

pub trait Connector: Send + Sync + 'static {
    type Client: StoreClient;

    /// Create a client. Must not block; clients connect lazily on first use.
    fn connect(&self) -> Self::Client;
}
