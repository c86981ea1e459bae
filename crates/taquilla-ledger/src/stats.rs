//! Derived withdrawal statistics.

use serde::Serialize;
use taquilla_types::{Cents, Withdrawal};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WithdrawalStats {
    pub total_amount: Cents,
    pub count: u64,
    /// Zero for an empty list.
    pub average_amount: f64,
    /// First element of the list, which is the most recent.
    pub last_withdrawal: Option<Withdrawal>,
}

pub fn compute_stats(withdrawals: &[Withdrawal]) -> WithdrawalStats {
    let total_amount: Cents = withdrawals.iter().map(|w| w.amount).sum();
    let count = withdrawals.len() as u64;
    WithdrawalStats {
        total_amount,
        count,
        average_amount: if count == 0 {
            0.0
        } else {
            total_amount as f64 / count as f64
        },
        last_withdrawal: withdrawals.first().cloned(),
    }
}
