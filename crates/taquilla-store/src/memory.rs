//! In-process store.
//!
//! Behaves like a hosted store for tests and local demos: assigns ids,
//! evaluates queries, and can be switched offline or told to reject the
//! next calls with a chosen error.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Query, RemoteStore, Result, Row, StoreError, Table};

#[derive(Default)]
struct Inner {
    tables: HashMap<Table, Vec<Row>>,
    injected: VecDeque<StoreError>,
    denied: HashMap<Table, String>,
    latency: Option<Duration>,
}

/// Cloneable handle to an in-memory store; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    online: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            online: Arc::new(AtomicBool::new(true)),
            next_id: Arc::new(AtomicU64::new(1)),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Simulate losing (or regaining) the network.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Fail the next call (of any kind) with `error`.
    pub async fn fail_next(&self, error: StoreError) {
        self.inner.lock().await.injected.push_back(error);
    }

    /// Refuse every write to `table`, like a row-level security policy.
    pub async fn deny_writes(&self, table: Table, reason: &str) {
        self.inner.lock().await.denied.insert(table, reason.to_string());
    }

    pub async fn allow_writes(&self, table: Table) {
        self.inner.lock().await.denied.remove(&table);
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.inner.lock().await.latency = Some(latency);
    }

    /// Current contents of a table, in insertion order.
    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.inner
            .lock()
            .await
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed a table directly, bypassing failure injection.
    pub async fn seed(&self, table: Table, rows: Vec<Row>) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table).or_default().extend(rows);
    }

    /// Number of successful mutating calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn admit(&self) -> Result<tokio::sync::MutexGuard<'_, Inner>> {
        let latency = self.inner.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.is_online() {
            return Err(StoreError::Connectivity("network unreachable".into()));
        }
        let mut inner = self.inner.lock().await;
        if let Some(error) = inner.injected.pop_front() {
            return Err(error);
        }
        Ok(inner)
    }

    async fn admit_write(&self, table: Table) -> Result<tokio::sync::MutexGuard<'_, Inner>> {
        let inner = self.admit().await?;
        if let Some(reason) = inner.denied.get(&table) {
            return Err(StoreError::Policy(reason.clone()));
        }
        Ok(inner)
    }
}

fn key_matches(row: &Row, table: Table, key: &str) -> bool {
    match row.get(table.key_column()) {
        Some(Value::String(s)) => s == key,
        Some(Value::Number(n)) => n.to_string() == key,
        _ => false,
    }
}

impl RemoteStore for MemoryStore {
    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let inner = self.admit().await?;
        let rows = inner
            .tables
            .get(&query.table)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(query.apply(rows))
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row> {
        let mut inner = self.admit_write(table).await?;
        let key_column = table.key_column();
        if !row.contains_key(key_column) {
            if key_column != "id" {
                return Err(StoreError::Policy(format!("missing key column '{key_column}'")));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            row.insert("id".into(), Value::String(id.to_string()));
        }
        let rows = inner.tables.entry(table).or_default();
        let key = match row.get(key_column) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        if rows.iter().any(|r| key_matches(r, table, &key)) {
            return Err(StoreError::Policy(format!(
                "duplicate key '{key}' in {}",
                table.name()
            )));
        }
        rows.push(row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn update(&self, table: Table, key: &str, patch: Row) -> Result<Row> {
        let mut inner = self.admit_write(table).await?;
        let rows = inner.tables.entry(table).or_default();
        let row = rows
            .iter_mut()
            .find(|r| key_matches(r, table, key))
            .ok_or_else(|| StoreError::Policy(format!("no row '{key}' in {}", table.name())))?;
        for (column, value) in patch {
            row.insert(column, value);
        }
        let updated = row.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        let mut inner = self.admit_write(table).await?;
        let rows = inner.tables.entry(table).or_default();
        rows.retain(|r| !key_matches(r, table, key));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
