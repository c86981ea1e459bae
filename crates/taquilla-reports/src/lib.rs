//! # taquilla-reports
//!
//! Sales reporting over in-memory bets and draw results.
//!
//! Everything here is pure and synchronous: identical inputs give identical
//! outputs, and empty inputs give zeroed results. Local-time bucketing is
//! generic over [`chrono::TimeZone`]; callers pass the terminal's zone.
//!
//! ## Modules
//!
//! - [`windows`] — Today / this week / this month boundaries
//! - [`window_stats`] — Per-window sales, payout and profit
//! - [`ranking`] — Top lotteries and animals
//! - [`hourly`] — Hour-of-day distribution and peak hour
//! - [`trend`] — Up / down / flat classification
//! - [`seller`] — Per-seller sales summary
//! - [`dashboard`] — Everything above, bundled

pub mod dashboard;
pub mod hourly;
pub mod ranking;
pub mod seller;
pub mod trend;
pub mod window_stats;
pub mod windows;

pub use dashboard::{build_dashboard, Dashboard};
pub use hourly::{hourly_distribution, peak_hour, HourBucket};
pub use ranking::{top_animals, top_entities, top_lotteries, AnimalRank, Ranking, RankedEntity};
pub use seller::{seller_stats, SellerStats};
pub use trend::{classify, daily_baseline, Trend};
pub use window_stats::{period_summary, profit_margin, stats_for_window, PeriodSummary, TimeWindowStats};
pub use windows::Windows;

/// Fixtures shared by the module tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use taquilla_types::{Bet, Cents, DrawResult};

    pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("valid instant")
    }

    /// 2024-05-15 (a Wednesday) at `h:m` UTC.
    pub fn wed(h: u32, m: u32) -> DateTime<Utc> {
        utc(2024, 5, 15, h, m)
    }

    pub fn bet(lottery: &str, animal: (&str, &str), amount: Cents, at: DateTime<Utc>) -> Bet {
        Bet {
            id: format!("{lottery}-{}-{}", animal.0, at.timestamp()),
            lottery_id: lottery.to_lowercase(),
            lottery_name: lottery.to_string(),
            animal_number: animal.0.to_string(),
            animal_name: animal.1.to_string(),
            amount,
            timestamp: at,
            user_id: "taquilla-1".into(),
            is_winner: false,
        }
    }

    pub fn draw(payout: Cents, at: DateTime<Utc>) -> DrawResult {
        DrawResult {
            draw_time: at,
            total_payout: payout,
            lottery_id: None,
            winning_animal: None,
        }
    }
}
