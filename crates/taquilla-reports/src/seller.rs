//! Per-seller sales summary.

use serde::Serialize;
use taquilla_types::{Bet, Cents};

use crate::windows::Windows;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct SellerStats {
    pub user_id: String,
    pub sales_today: Cents,
    pub sales_week: Cents,
    pub sales_month: Cents,
    pub total_sales: Cents,
    pub bet_count: u64,
}

/// Sales registered by `user_id`. Window starts are inclusive.
pub fn seller_stats(bets: &[Bet], user_id: &str, windows: &Windows) -> SellerStats {
    let mut stats = SellerStats {
        user_id: user_id.to_string(),
        ..SellerStats::default()
    };
    for bet in bets.iter().filter(|b| b.user_id == user_id) {
        stats.total_sales += bet.amount;
        stats.bet_count += 1;
        if bet.timestamp >= windows.month {
            stats.sales_month += bet.amount;
        }
        if bet.timestamp >= windows.week {
            stats.sales_week += bet.amount;
        }
        if bet.timestamp >= windows.today {
            stats.sales_today += bet.amount;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bet, utc, wed};

    #[test]
    fn test_only_own_sales() {
        let mut other = bet("Granjita", ("1", "Carnero"), 999, wed(9, 0));
        other.user_id = "taquilla-2".into();
        let bets = vec![
            bet("Granjita", ("1", "Carnero"), 10, wed(9, 0)),
            bet("Granjita", ("1", "Carnero"), 20, utc(2024, 5, 13, 0, 0)),
            bet("Granjita", ("1", "Carnero"), 40, utc(2024, 4, 1, 0, 0)),
            other,
        ];
        let stats = seller_stats(&bets, "taquilla-1", &Windows::at(&wed(18, 0)));
        assert_eq!(stats.sales_today, 10);
        assert_eq!(stats.sales_week, 30);
        assert_eq!(stats.sales_month, 30);
        assert_eq!(stats.total_sales, 70);
        assert_eq!(stats.bet_count, 3);
    }

    #[test]
    fn test_unknown_seller() {
        let stats = seller_stats(&[], "nadie", &Windows::at(&wed(18, 0)));
        assert_eq!(stats.bet_count, 0);
        assert_eq!(stats.user_id, "nadie");
    }
}
