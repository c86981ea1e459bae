//! Timeout-bounded access to a remote store, with connectivity health.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{Query, RemoteStore, Result, Row, StoreError, Table};

/// Default bound on a single remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Result of the most recent connectivity probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Health {
    pub connected: bool,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Wraps a [`RemoteStore`] so every call is bounded by a timeout.
///
/// An elapsed timeout is reported as [`StoreError::Connectivity`].
pub struct Gateway<R> {
    remote: R,
    timeout: Duration,
    health: RwLock<Health>,
}

impl<R: RemoteStore> Gateway<R> {
    pub fn new(remote: R) -> Self {
        Self::with_timeout(remote, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(remote: R, timeout: Duration) -> Self {
        Self {
            remote,
            timeout,
            health: RwLock::new(Health::default()),
        }
    }

    /// The wrapped store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lightweight read-only connectivity check: select one withdrawal id.
    ///
    /// `Ok(true)` when the store answers, `Ok(false)` on a connectivity
    /// failure. A store that answers but refuses the query (expired
    /// credentials, row-level security) is reported as `Err` so callers can
    /// tell it apart from an outage. Never writes to the store.
    pub async fn probe(&self) -> Result<bool> {
        let query = Query::new(Table::Withdrawals).select(&["id"]).limit(1);
        let outcome = self.bounded(self.remote.query(&query)).await;
        let mut health = self.health.write().await;
        health.last_probe_at = Some(Utc::now());
        match outcome {
            Ok(_) => {
                if !health.connected {
                    debug!("remote store reachable");
                }
                health.connected = true;
                health.last_error = None;
                Ok(true)
            }
            Err(e) => {
                if health.connected {
                    warn!(error = %e, "remote store unavailable, switching to cache");
                }
                health.connected = false;
                health.last_error = Some(e.to_string());
                if e.is_connectivity() {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Probe and report whether the store answered. Refusals count as
    /// unreachable.
    pub async fn is_reachable(&self) -> bool {
        matches!(self.probe().await, Ok(true))
    }

    /// Snapshot of the last probe result.
    pub async fn health(&self) -> Health {
        self.health.read().await.clone()
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        self.bounded(self.remote.query(query)).await
    }

    pub async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        self.bounded(self.remote.insert(table, row)).await
    }

    pub async fn update(&self, table: Table, key: &str, patch: Row) -> Result<Row> {
        self.bounded(self.remote.update(table, key, patch)).await
    }

    pub async fn delete(&self, table: Table, key: &str) -> Result<()> {
        self.bounded(self.remote.delete(table, key)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Connectivity(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_probe_online() {
        let gateway = Gateway::new(MemoryStore::new());
        assert!(gateway.probe().await.expect("health check"));
        let health = gateway.health().await;
        assert!(health.connected);
        assert!(health.last_probe_at.is_some());
    }

    #[tokio::test]
    async fn test_probe_offline_records_error() {
        let store = MemoryStore::new();
        store.set_online(false);
        let gateway = Gateway::new(store);
        assert!(!gateway.probe().await.expect("health check"));
        let health = gateway.health().await;
        assert!(!health.connected);
        assert!(health.last_error.is_some());
    }

    #[tokio::test]
    async fn test_probe_has_no_side_effects() {
        let store = MemoryStore::new();
        let gateway = Gateway::new(store.clone());
        gateway.is_reachable().await;
        gateway.is_reachable().await;
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.rows(Table::Withdrawals).await.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_connectivity_error() {
        let store = MemoryStore::new();
        store.set_latency(Duration::from_secs(30)).await;
        let gateway = Gateway::with_timeout(store, Duration::from_secs(1));
        let err = gateway
            .query(&Query::new(Table::Pots))
            .await
            .expect_err("should time out");
        assert!(err.is_connectivity());
        assert!(!gateway.probe().await.expect("timeout is not a refusal"));
    }

    #[tokio::test]
    async fn test_refused_health_check_is_not_an_outage() {
        let store = MemoryStore::new();
        store.fail_next(StoreError::Policy("401 JWT expired".into())).await;
        let gateway = Gateway::new(store);
        let err = gateway.probe().await.expect_err("refusal");
        assert!(!err.is_connectivity());
        let health = gateway.health().await;
        assert!(!health.connected);
        assert_eq!(health.last_error.as_deref(), Some(err.to_string().as_str()));
    }
}
