//! # taquilla-types
//!
//! Shared domain types used across the Taquilla workspace.
//!
//! ## Conventions
//!
//! - Currency amounts are integer cents ([`Cents`]).
//! - Instants are `DateTime<Utc>`; local-time bucketing happens in reporting.

pub mod api_key;
pub mod ledger;
pub mod sales;

pub use api_key::ApiKey;
pub use ledger::{Pot, RecordId, RecordOrigin, Withdrawal};
pub use sales::{Bet, DrawResult};

/// Currency amount in cents (1 Bs. = 100 cents).
pub type Cents = u64;

/// Errors raised while constructing domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("unknown record origin: {0}")]
    UnknownOrigin(String),

    #[error("malformed record id: {0}")]
    MalformedId(String),
}

#[cfg(test)]
mod tests {
    #[test]
    #[ignore] // Run manually to generate bindings
    fn export_ts_bindings() {
        use ts_rs::TS;
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bindings");
        std::fs::create_dir_all(&dir).expect("bindings dir");
        crate::ledger::Pot::export_all_to(&dir).expect("export Pot");
        crate::ledger::Withdrawal::export_all_to(&dir).expect("export Withdrawal");
        crate::sales::Bet::export_all_to(&dir).expect("export Bet");
        crate::sales::DrawResult::export_all_to(&dir).expect("export DrawResult");
        crate::api_key::ApiKey::export_all_to(&dir).expect("export ApiKey");
    }
}
