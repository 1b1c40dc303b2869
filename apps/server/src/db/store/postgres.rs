//! Postgres-backed store client

use super::{Connector, StoreClient, StorePage};
use crate::config::DatabaseConfig;
use crate::db::query::{sql, BindValue, ListQuery};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::str::FromStr;

/// Creates [`PgClient`]s sharing one set of connect options.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::from_str(&config.url)?
            .application_name("certadmin")
            .options([(
                "statement_timeout",
                format!("{}s", config.statement_timeout_seconds),
            )]);
        Ok(Self::new(options))
    }
}

impl Connector for PgConnector {
    type Client = PgClient;

    fn connect(&self) -> PgClient {
        PgClient {
            options: self.options.clone(),
            conn: None,
        }
    }
}

/// One backing-store handle. Connects on first use and reconnects after a transient failure.
pub struct PgClient {
    options: PgConnectOptions,
    conn: Option<PgConnection>,
}

impl PgClient {
    async fn connection(&mut self) -> Result<&mut PgConnection, StoreError> {
        if self.conn.is_none() {
            tracing::debug!("Opening backing store connection");
            let conn = PgConnection::connect_with(&self.options).await?;
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::transient("connection unavailable"))
    }

    async fn run(&mut self, query: &ListQuery) -> Result<StorePage, StoreError> {
        let compiled = sql::compile(query);
        let conn = self.connection().await?;

        let mut count_query = sqlx::query_scalar::<_, i64>(&compiled.count_sql);
        for value in &compiled.bind_params[..compiled.count_params] {
            count_query = match value {
                BindValue::Text(v) => count_query.bind(v.clone()),
                BindValue::Bool(v) => count_query.bind(*v),
                BindValue::Timestamp(v) => count_query.bind(*v),
                BindValue::Date(v) => count_query.bind(*v),
                BindValue::BigInt(v) => count_query.bind(*v),
            };
        }
        let total = count_query.fetch_one(&mut *conn).await?;

        let mut select_query = sqlx::query_scalar::<_, JsonValue>(&compiled.select_sql);
        for value in &compiled.bind_params {
            select_query = match value {
                BindValue::Text(v) => select_query.bind(v.clone()),
                BindValue::Bool(v) => select_query.bind(*v),
                BindValue::Timestamp(v) => select_query.bind(*v),
                BindValue::Date(v) => select_query.bind(*v),
                BindValue::BigInt(v) => select_query.bind(*v),
            };
        }
        let rows = select_query.fetch_all(&mut *conn).await?;

        Ok(StorePage { rows, total })
    }
}

#[async_trait]
impl StoreClient for PgClient {
    async fn fetch_page(&mut self, query: &ListQuery) -> Result<StorePage, StoreError> {
        let result = self.run(query).await;
        if let Err(err) = &result {
            if !err.is_client_error() && self.conn.take().is_some() {
                tracing::debug!(error = %err, "Dropping backing store connection after failure");
            }
        }
        result
    }
}
