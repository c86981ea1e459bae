//! Sales-side inputs to reporting. Owned by the sales subsystem, read-only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Cents;

/// A wagered ticket on one animal of one lottery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Bet {
    pub id: String,
    pub lottery_id: String,
    pub lottery_name: String,
    /// Animal number as printed on the ticket ("0", "00", "1".."36").
    pub animal_number: String,
    pub animal_name: String,
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
    /// Seller (taquilla) that registered the sale.
    pub user_id: String,
    #[serde(default)]
    pub is_winner: bool,
}

/// The outcome and payout total of one drawing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct DrawResult {
    pub draw_time: DateTime<Utc>,
    pub total_payout: Cents,
    #[serde(default)]
    pub lottery_id: Option<String>,
    #[serde(default)]
    pub winning_animal: Option<String>,
}
