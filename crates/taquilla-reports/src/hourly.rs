//! Hour-of-day distribution.

use std::collections::BTreeMap;

use chrono::{TimeZone, Timelike};
use serde::Serialize;
use taquilla_types::{Bet, Cents};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct HourBucket {
    /// Local hour, 0-23.
    pub hour: u32,
    pub bets: u64,
    pub sales: Cents,
}

impl HourBucket {
    /// `"09:00"`-style label.
    pub fn label(&self) -> String {
        format!("{:02}:00", self.hour)
    }
}

/// Bucket bets by local hour in `tz`. Only non-empty hours, ascending.
pub fn hourly_distribution<Tz: TimeZone>(bets: &[Bet], tz: &Tz) -> Vec<HourBucket> {
    let mut buckets: BTreeMap<u32, HourBucket> = BTreeMap::new();
    for bet in bets {
        let hour = bet.timestamp.with_timezone(tz).hour();
        let bucket = buckets.entry(hour).or_insert(HourBucket {
            hour,
            bets: 0,
            sales: 0,
        });
        bucket.bets += 1;
        bucket.sales += bet.amount;
    }
    buckets.into_values().collect()
}

/// Bucket with the most bets; the earliest hour wins a tie.
pub fn peak_hour(distribution: &[HourBucket]) -> Option<&HourBucket> {
    distribution
        .iter()
        .fold(None, |peak: Option<&HourBucket>, bucket| match peak {
            Some(p) if bucket.bets <= p.bets => Some(p),
            _ => Some(bucket),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bet, wed};
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_buckets_ascending_non_empty() {
        let bets = vec![
            bet("Granjita", ("1", "Carnero"), 10, wed(14, 5)),
            bet("Granjita", ("1", "Carnero"), 20, wed(9, 0)),
            bet("Granjita", ("1", "Carnero"), 30, wed(14, 55)),
        ];
        let hours = hourly_distribution(&bets, &Utc);
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0], HourBucket { hour: 9, bets: 1, sales: 20 });
        assert_eq!(hours[1], HourBucket { hour: 14, bets: 2, sales: 40 });
        assert_eq!(hours[0].label(), "09:00");
    }

    #[test]
    fn test_local_hours() {
        let bets = vec![bet("Granjita", ("1", "Carnero"), 10, wed(14, 0))];
        let caracas = FixedOffset::west_opt(4 * 3600).expect("offset");
        assert_eq!(hourly_distribution(&bets, &caracas)[0].hour, 10);
    }

    #[test]
    fn test_peak_tie_goes_to_first_hour() {
        let hours = vec![
            HourBucket { hour: 9, bets: 3, sales: 30 },
            HourBucket { hour: 11, bets: 1, sales: 90 },
            HourBucket { hour: 14, bets: 3, sales: 10 },
        ];
        assert_eq!(peak_hour(&hours).map(|b| b.hour), Some(9));
        assert!(peak_hour(&[]).is_none());
    }
}
