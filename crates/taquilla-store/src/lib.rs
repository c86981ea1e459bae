//! # taquilla-store
//!
//! Remote store gateway: a thin abstraction over create/read/update/delete
//! and filtered queries against the hosted back-office tables.
//!
//! ## Modules
//!
//! - [`query`] — Filters, ordering and in-memory evaluation
//! - [`gateway`] — Timeout-bounded access and connectivity health
//! - [`rows`] — Conversions between store rows and domain types
//! - [`memory`] — In-process store used by tests and the `memory` backend
//! - [`postgrest`] — HTTP store speaking the PostgREST dialect
//!
//! Every failure is either a [`StoreError::Connectivity`] (the caller may
//! fall back to its cache) or a policy/decode failure (the caller must not).

use std::future::Future;

pub mod gateway;
pub mod memory;
pub mod postgrest;
pub mod query;
pub mod rows;

pub use gateway::{Gateway, Health};
pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use query::{Filter, FilterOp, Order, Query};

/// A store row: a JSON object keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Remote tables consumed by the back office.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Pots,
    Withdrawals,
    Bets,
    DrawResults,
    Users,
    ApiKeys,
}

impl Table {
    /// Table name on the remote store.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pots => "pots",
            Self::Withdrawals => "withdrawals",
            Self::Bets => "bets",
            Self::DrawResults => "draw_results",
            Self::Users => "users",
            Self::ApiKeys => "api_keys",
        }
    }

    /// Column used to address a single record.
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::Pots => "name",
            _ => "id",
        }
    }
}

/// Remote store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable, timed out, or temporarily unavailable.
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// The store understood the request and refused it (access control,
    /// constraint, malformed request).
    #[error("store rejected request: {0}")]
    Policy(String),

    /// The store answered with something we cannot interpret.
    #[error("undecodable store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether the caller may fall back to its local cache.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Operations a hosted store must provide.
///
/// Implementations are shared across tasks, so every future is `Send`.
pub trait RemoteStore: Send + Sync {
    /// Rows of `query.table` matching every filter, in the requested order.
    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Insert a row and return it as stored (with any assigned key).
    fn insert(&self, table: Table, row: Row) -> impl Future<Output = Result<Row>> + Send;

    /// Apply `patch` to the record addressed by `key` and return it.
    fn update(
        &self,
        table: Table,
        key: &str,
        patch: Row,
    ) -> impl Future<Output = Result<Row>> + Send;

    /// Delete the record addressed by `key`.
    fn delete(&self, table: Table, key: &str) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes_distinguishable() {
        assert!(StoreError::Connectivity("down".into()).is_connectivity());
        assert!(!StoreError::Policy("rls".into()).is_connectivity());
        assert!(!StoreError::Decode("junk".into()).is_connectivity());
    }

    #[test]
    fn test_key_columns() {
        assert_eq!(Table::Pots.key_column(), "name");
        assert_eq!(Table::Withdrawals.key_column(), "id");
        assert_eq!(Table::DrawResults.name(), "draw_results");
    }
}
