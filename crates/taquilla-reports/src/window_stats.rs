//! Per-window sales, payout and profit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use taquilla_types::{Bet, Cents, DrawResult};

use crate::windows::Windows;

#[derive(Clone, Debug, Default, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct TimeWindowStats {
    pub total_sales: Cents,
    pub total_bets: u64,
    /// `total_sales / total_bets`, or zero without bets.
    pub average_bet: f64,
    pub total_payout: Cents,
    /// `total_sales - total_payout`; negative when payouts exceed sales.
    pub net_profit: i64,
    pub winners: u64,
}

/// Stats over bets and draws at or after `since` (everything when `None`).
pub fn stats_for_window(
    bets: &[Bet],
    draws: &[DrawResult],
    since: Option<DateTime<Utc>>,
) -> TimeWindowStats {
    let in_window = |t: &DateTime<Utc>| match since {
        Some(start) => *t >= start,
        None => true,
    };

    let mut stats = TimeWindowStats::default();
    for bet in bets.iter().filter(|b| in_window(&b.timestamp)) {
        stats.total_sales += bet.amount;
        stats.total_bets += 1;
        if bet.is_winner {
            stats.winners += 1;
        }
    }
    stats.total_payout = draws
        .iter()
        .filter(|d| in_window(&d.draw_time))
        .map(|d| d.total_payout)
        .sum();
    stats.net_profit = stats.total_sales as i64 - stats.total_payout as i64;
    if stats.total_bets > 0 {
        stats.average_bet = stats.total_sales as f64 / stats.total_bets as f64;
    }
    stats
}

#[derive(Clone, Debug, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct PeriodSummary {
    pub today: TimeWindowStats,
    pub week: TimeWindowStats,
    pub month: TimeWindowStats,
    pub all_time: TimeWindowStats,
}

pub fn period_summary(bets: &[Bet], draws: &[DrawResult], windows: &Windows) -> PeriodSummary {
    PeriodSummary {
        today: stats_for_window(bets, draws, Some(windows.today)),
        week: stats_for_window(bets, draws, Some(windows.week)),
        month: stats_for_window(bets, draws, Some(windows.month)),
        all_time: stats_for_window(bets, draws, None),
    }
}

/// Net profit as a percentage of sales; zero without sales.
pub fn profit_margin(stats: &TimeWindowStats) -> f64 {
    if stats.total_sales == 0 {
        return 0.0;
    }
    stats.net_profit as f64 / stats.total_sales as f64 * 100.0
}
