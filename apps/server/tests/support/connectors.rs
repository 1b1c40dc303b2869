use async_trait::async_trait;
use certadmin::db::query::ListQuery;
use certadmin::db::store::{Connector, StoreClient, StorePage};
use certadmin::error::StoreError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connector whose clients replay a scripted sequence of outcomes, then succeed with an empty
/// page. Counts connects and calls across all clients.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<VecDeque<Result<StorePage, StoreError>>>>,
    connects: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Result<StorePage, StoreError>>) -> Self {
        let connector = Self::new();
        connector.script.lock().extend(outcomes);
        connector
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct ScriptedClient {
    connector: ScriptedConnector,
}

#[async_trait]
impl StoreClient for ScriptedClient {
    async fn fetch_page(&mut self, _query: &ListQuery) -> Result<StorePage, StoreError> {
        self.connector.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.connector.latency {
            tokio::time::sleep(latency).await;
        }
        self.connector
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(empty_page()))
    }
}

impl Connector for ScriptedConnector {
    type Client = ScriptedClient;

    fn connect(&self) -> ScriptedClient {
        self.connects.fetch_add(1, Ordering::SeqCst);
        ScriptedClient {
            connector: self.clone(),
        }
    }
}

pub fn empty_page() -> StorePage {
    StorePage {
        rows: Vec::new(),
        total: 0,
    }
}
