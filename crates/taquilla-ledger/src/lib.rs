//! # taquilla-ledger
//!
//! Withdrawal ledger, pot book, API key registry and the sales feed.
//!
//! Every operation consults the remote store first and degrades to the local
//! cache mirror when the store is unreachable. Writes made while degraded are
//! appended to the durable offline queue and replayed by [`sync::drain`].
//!
//! ## Modules
//!
//! - [`backend`] — Shared remote + cache handles and per-pot locks
//! - [`store`] — Connected and cache-only store variants
//! - [`withdrawals`] — The withdrawal ledger
//! - [`filter`] — Withdrawal list filters
//! - [`stats`] — Derived withdrawal statistics
//! - [`pots`] — Pot listing and administration
//! - [`sales`] — Read-only bet and draw feed for reporting
//! - [`sync`] — Offline queue payloads and replay
//! - [`api_keys`] — API key issuance and verification

pub mod api_keys;
pub mod backend;
pub mod filter;
pub mod pots;
pub mod sales;
pub mod stats;
pub mod store;
pub mod sync;
pub mod withdrawals;

use serde::Serialize;
use taquilla_db::DbError;
use taquilla_store::StoreError;
use taquilla_types::Cents;

pub use api_keys::ApiKeyRegistry;
pub use backend::Backend;
pub use filter::WithdrawalFilter;
pub use pots::PotBook;
pub use sales::{SalesData, SalesFeed};
pub use stats::{compute_stats, WithdrawalStats};
pub use sync::SyncReport;
pub use withdrawals::{Loaded, WithdrawalLedger, WithdrawalReceipt};

/// Cache mirror connection shared by every component.
pub type Cache = std::sync::Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// Ledger error types.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Zero amounts are never valid.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Requested amount.
        required: Cents,
        /// Balance at validation time.
        available: Cents,
    },

    /// Remote store unreachable. Handled internally by falling back to the cache.
    #[error("remote store unreachable: {0}")]
    Connectivity(String),

    /// Remote store refused the operation.
    #[error("remote store rejected the operation: {0}")]
    RemotePolicy(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cache error: {0}")]
    Cache(#[from] DbError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Connectivity(reason) => Self::Connectivity(reason),
            StoreError::Policy(reason) | StoreError::Decode(reason) => Self::RemotePolicy(reason),
        }
    }
}

impl LedgerError {
    /// Bad input from the caller; never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount | Self::InsufficientBalance { .. } | Self::InvalidInput(_)
        )
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Where a mutation ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Durably recorded in the remote store.
    Synced,
    /// Recorded in the cache and queued for replay.
    LocalOnly,
}

impl SyncStatus {
    /// User-facing description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Synced => "recorded",
            Self::LocalOnly => "recorded locally, not yet synced",
        }
    }
}

/// Where a read was served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Remote,
    /// The local cache mirror, because the store was unreachable or refused the read.
    Cache,
}

/// Current wall-clock time in epoch milliseconds, for cache bookkeeping.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
