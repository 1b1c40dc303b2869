//! Bounded pool of backing-store handles
//!
//! The pool owns `max_connections` handles created up front. `acquire` hands out an idle one
//! immediately, otherwise parks the caller in a FIFO wait list. A waiter that is not served
//! within `connection_timeout` receives a freshly connected, unpooled handle instead, so
//! contention never surfaces as an error. `execute_with_retry` wraps one operation in
//! acquire/release and retries transient failures with exponential back-off.

use crate::db::store::Connector;
use crate::error::StoreError;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::sync::oneshot;

/// Retry schedule for `execute_with_retry`. Fixed at pool construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows the zero-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(self.base_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub connection_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_millis(5_000),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pooled(usize),
    Ephemeral,
}

/// A checked-out backing-store client.
///
/// Exactly one operation owns a handle at a time; it goes back through
/// [`ConnectionPool::release`].
#[derive(Debug)]
pub struct PoolHandle<H> {
    client: H,
    slot: Slot,
}

impl<H> PoolHandle<H> {
    /// Whether the handle belongs to the pool's fixed set.
    pub fn is_pooled(&self) -> bool {
        matches!(self.slot, Slot::Pooled(_))
    }

    /// Index within the pool's fixed set, `None` for ephemeral handles.
    pub fn slot(&self) -> Option<usize> {
        match self.slot {
            Slot::Pooled(idx) => Some(idx),
            Slot::Ephemeral => None,
        }
    }
}

impl<H> Deref for PoolHandle<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.client
    }
}

impl<H> DerefMut for PoolHandle<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.client
    }
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub total: usize,
    pub available: usize,
    pub waiting: usize,
}

struct Waiter<H> {
    id: u64,
    tx: oneshot::Sender<PoolHandle<H>>,
}

struct PoolState<H> {
    available: Vec<PoolHandle<H>>,
    waiters: VecDeque<Waiter<H>>,
    next_waiter_id: u64,
    closed: bool,
}

pub struct ConnectionPool<C: Connector> {
    connector: C,
    config: PoolConfig,
    // Never held across an await point.
    state: Mutex<PoolState<C::Client>>,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C, config: PoolConfig) -> Self {
        let available = (0..config.max_connections)
            .map(|idx| PoolHandle {
                client: connector.connect(),
                slot: Slot::Pooled(idx),
            })
            .collect();

        tracing::debug!(
            max_connections = config.max_connections,
            connection_timeout_ms = config.connection_timeout.as_millis() as u64,
            "Connection pool created"
        );

        Self {
            connector,
            config,
            state: Mutex::new(PoolState {
                available,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
                closed: false,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            total: self.config.max_connections,
            available: state.available.len(),
            waiting: state.waiters.len(),
        }
    }

    /// Check out a handle, waiting up to `connection_timeout` for one to be released.
    ///
    /// Never fails: on timeout the caller gets an ephemeral handle that is dropped on release.
    pub async fn acquire(&self) -> PoolHandle<C::Client> {
        let (waiter_id, rx) = {
            let mut state = self.state.lock();
            if let Some(handle) = state.available.pop() {
                tracing::trace!(slot = ?handle.slot(), "Checked out idle handle");
                return handle;
            }
            if state.closed {
                drop(state);
                return self.ephemeral();
            }

            let (tx, rx) = oneshot::channel();
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.waiters.push_back(Waiter { id, tx });
            tracing::debug!(
                waiter = id,
                waiting = state.waiters.len(),
                "No idle handle, waiting for release"
            );
            (id, rx)
        };

        let mut wait = Waiting {
            pool: self,
            id: waiter_id,
            rx,
        };
        match tokio::time::timeout(self.config.connection_timeout, &mut wait.rx).await {
            Ok(Ok(handle)) => handle,
            // Pool closed while we were queued.
            Ok(Err(_)) => self.ephemeral(),
            Err(_) => {
                // A release that ran before the removal may already have sent us a handle.
                if let Some(handle) = wait.reclaim() {
                    return handle;
                }
                tracing::warn!(
                    waiter = waiter_id,
                    timeout_ms = self.config.connection_timeout.as_millis() as u64,
                    "Timed out waiting for a pooled handle, using an ephemeral one"
                );
                self.ephemeral()
            }
        }
    }

    /// Return a handle. The longest-waiting caller receives it directly; otherwise pooled
    /// handles go back to the idle set and ephemeral ones are dropped.
    pub fn release(&self, handle: PoolHandle<C::Client>) {
        let mut handle = handle;
        let mut state = self.state.lock();

        while let Some(waiter) = state.waiters.pop_front() {
            let id = waiter.id;
            match waiter.tx.send(handle) {
                Ok(()) => {
                    tracing::trace!(waiter = id, "Handed handle to waiter");
                    return;
                }
                // Waiter gave up between timing out and leaving the queue.
                Err(returned) => handle = returned,
            }
        }

        if handle.is_pooled() && !state.closed {
            state.available.push(handle);
        } else {
            tracing::trace!("Discarding unpooled handle");
        }
    }

    /// Run `op` with a checked-out handle, retrying transient failures.
    ///
    /// The handle is released after every attempt, successful or not. Client errors are returned
    /// immediately; transient errors are retried until `max_attempts` is reached, sleeping
    /// `base_delay * backoff_multiplier^n` between attempts.
    pub async fn execute_with_retry<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> FnMut(&'c mut C::Client) -> BoxFuture<'c, Result<T, StoreError>> + Send,
    {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut failures = 0u32;

        loop {
            let mut checkout = CheckedOut {
                pool: self,
                handle: Some(self.acquire().await),
            };
            let result = op(checkout.client_mut()).await;
            drop(checkout);

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_client_error() {
                tracing::debug!(error = %err, "Backing store rejected the operation");
                return Err(err);
            }

            failures += 1;
            if failures >= max_attempts {
                tracing::error!(
                    attempts = failures,
                    error = %err,
                    "Backing store operation failed after retries"
                );
                return Err(err);
            }

            let delay = policy.delay_for(failures - 1);
            tracing::warn!(
                attempt = failures,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient backing store error, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Drop idle handles and release every waiter. Later acquires get ephemeral handles.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.available.clear();
        state.waiters.clear();
        tracing::debug!("Connection pool closed");
    }

    fn ephemeral(&self) -> PoolHandle<C::Client> {
        PoolHandle {
            client: self.connector.connect(),
            slot: Slot::Ephemeral,
        }
    }
}

/// A queued `acquire`. Leaves the wait list on drop and returns any handle that was already
/// handed over, so a cancelled waiter never strands a pooled handle in its channel.
struct Waiting<'p, C: Connector> {
    pool: &'p ConnectionPool<C>,
    id: u64,
    rx: oneshot::Receiver<PoolHandle<C::Client>>,
}

impl<C: Connector> Waiting<'_, C> {
    fn reclaim(&mut self) -> Option<PoolHandle<C::Client>> {
        self.pool
            .state
            .lock()
            .waiters
            .retain(|w| w.id != self.id);
        self.rx.try_recv().ok()
    }
}

impl<C: Connector> Drop for Waiting<'_, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.reclaim() {
            tracing::debug!(waiter = self.id, "Waiter cancelled, returning its handle");
            self.pool.release(handle);
        }
    }
}

/// Releases its handle on drop, including when the owning future is cancelled.
struct CheckedOut<'p, C: Connector> {
    pool: &'p ConnectionPool<C>,
    handle: Option<PoolHandle<C::Client>>,
}

impl<C: Connector> CheckedOut<'_, C> {
    fn client_mut(&mut self) -> &mut C::Client {
        &mut self
            .handle
            .as_mut()
            .expect("checked-out handle present until drop")
            .client
    }
}

impl<C: Connector> Drop for CheckedOut<'_, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}
