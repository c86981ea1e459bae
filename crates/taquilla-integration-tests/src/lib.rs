//! Integration test crate for the Taquilla back office.
//!
//! The library only holds the shared harness: a [`MemoryStore`] standing in
//! for the hosted database, wired to a cache mirror the same way the daemon
//! wires it. The end-to-end flows live under `tests/`.
//!
//! ```sh
//! cargo test -p taquilla-integration-tests
//! ```

use std::path::Path;
use std::sync::Arc;

use taquilla_ledger::sync::DEFAULT_MAX_ATTEMPTS;
use taquilla_ledger::{ApiKeyRegistry, Backend, PotBook, SalesFeed, WithdrawalLedger};
use taquilla_store::{rows, Gateway, MemoryStore, Row, Table};
use taquilla_types::Pot;

/// Every component over one store and one cache.
pub struct Harness {
    pub store: MemoryStore,
    pub backend: Arc<Backend<MemoryStore>>,
    pub ledger: WithdrawalLedger<MemoryStore>,
    pub pots: PotBook<MemoryStore>,
    pub keys: ApiKeyRegistry<MemoryStore>,
    pub sales: SalesFeed<MemoryStore>,
}

impl Harness {
    /// Fresh store seeded with `pots`, in-memory cache.
    pub async fn new(pots: &[Pot]) -> Self {
        let store = MemoryStore::new();
        seed_pots(&store, pots).await;
        let cache = taquilla_db::open_memory().expect("in-memory cache should open");
        Self::assemble(store, cache, DEFAULT_MAX_ATTEMPTS).await
    }

    /// Reattach to `store` with a file-backed cache, as after a restart.
    pub async fn reopen(store: MemoryStore, cache_path: &Path) -> Self {
        let cache = taquilla_db::open(cache_path).expect("cache file should open");
        Self::assemble(store, cache, DEFAULT_MAX_ATTEMPTS).await
    }

    pub async fn assemble(
        store: MemoryStore,
        cache: rusqlite::Connection,
        max_attempts: u32,
    ) -> Self {
        let backend = Arc::new(Backend::new(
            Gateway::new(store.clone()),
            Arc::new(tokio::sync::Mutex::new(cache)),
        ));
        let ledger = WithdrawalLedger::open(backend.clone(), max_attempts)
            .await
            .expect("ledger should open");
        Self {
            pots: PotBook::new(backend.clone()),
            keys: ApiKeyRegistry::new(backend.clone()),
            sales: SalesFeed::new(backend.clone()),
            ledger,
            backend,
            store,
        }
    }

    /// Pot balance as the remote store has it.
    pub async fn remote_balance(&self, pot: &str) -> Option<u64> {
        self.store
            .rows(Table::Pots)
            .await
            .iter()
            .find(|r| r.get("name").and_then(|v| v.as_str()) == Some(pot))
            .and_then(|r| r.get("balance").and_then(|v| v.as_u64()))
    }

    pub async fn remote_withdrawals(&self) -> Vec<Row> {
        self.store.rows(Table::Withdrawals).await
    }
}

pub async fn seed_pots(store: &MemoryStore, pots: &[Pot]) {
    store
        .seed(Table::Pots, pots.iter().map(rows::pot_row).collect())
        .await;
}

/// A row from a JSON object literal.
pub fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Row::new(),
    }
}

pub fn caja(balance: u64) -> Pot {
    Pot::new("Caja", balance, "#22c55e")
}

pub fn premios(balance: u64) -> Pot {
    Pot::new("Premios", balance, "#f97316")
}
