//! Trend classification.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Strict comparison, no tolerance.
pub fn classify(current: f64, baseline: f64) -> Trend {
    if current > baseline {
        Trend::Up
    } else if current < baseline {
        Trend::Down
    } else {
        Trend::Flat
    }
}

/// Average per day over a week's total.
pub fn daily_baseline(week_total: f64) -> f64 {
    week_total / 7.0
}
