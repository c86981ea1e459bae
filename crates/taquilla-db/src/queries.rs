//! Cache query functions organized by domain.

pub mod api_keys;
pub mod offline_queue;
pub mod pots;
pub mod snapshots;
pub mod withdrawals;
