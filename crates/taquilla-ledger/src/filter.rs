//! Withdrawal list filters.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use taquilla_store::rows::timestamp;
use taquilla_store::{Filter, Query, Table};
use taquilla_types::{Cents, Withdrawal};

/// Optional pot, time and amount bounds. All bounds are inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WithdrawalFilter {
    #[serde(default)]
    pub pot: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub min_amount: Option<Cents>,
    #[serde(default)]
    pub max_amount: Option<Cents>,
}

impl WithdrawalFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_pot(pot: impl Into<String>) -> Self {
        Self {
            pot: Some(pot.into()),
            ..Self::default()
        }
    }

    pub fn in_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    /// No criteria set. Only unfiltered loads refresh the cache.
    pub fn is_unfiltered(&self) -> bool {
        self.pot.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.min_amount.is_none()
            && self.max_amount.is_none()
    }

    pub fn matches(&self, w: &Withdrawal) -> bool {
        if let Some(pot) = &self.pot {
            if &w.from_pot != pot {
                return false;
            }
        }
        if let Some(start) = &self.start {
            if w.timestamp < *start {
                return false;
            }
        }
        if let Some(end) = &self.end {
            if w.timestamp > *end {
                return false;
            }
        }
        if self.min_amount.is_some_and(|min| w.amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| w.amount > max) {
            return false;
        }
        true
    }

    /// Apply to an in-memory list, keeping its order.
    pub fn apply(&self, withdrawals: &[Withdrawal]) -> Vec<Withdrawal> {
        withdrawals.iter().filter(|w| self.matches(w)).cloned().collect()
    }

    /// Remote query returning matches newest first.
    pub fn to_query(&self) -> Query {
        let mut query = Query::new(Table::Withdrawals).order_by("created_at", true);
        if let Some(pot) = &self.pot {
            query = query.filter(Filter::eq("from_pot", pot.as_str()));
        }
        if let Some(start) = &self.start {
            query = query.filter(Filter::gte("created_at", timestamp(start)));
        }
        if let Some(end) = &self.end {
            query = query.filter(Filter::lte("created_at", timestamp(end)));
        }
        if let Some(min) = self.min_amount {
            query = query.filter(Filter::gte("amount", min));
        }
        if let Some(max) = self.max_amount {
            query = query.filter(Filter::lte("amount", max));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use taquilla_store::FilterOp;
    use taquilla_types::RecordId;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("ts")
    }

    fn w(pot: &str, secs: i64) -> Withdrawal {
        Withdrawal {
            id: RecordId::remote(secs.to_string()),
            from_pot: pot.into(),
            amount: 100,
            timestamp: at(secs),
        }
    }

    #[test]
    fn test_bounds_inclusive() {
        let f = WithdrawalFilter::in_range(at(10), at(20));
        assert!(f.matches(&w("Caja", 10)));
        assert!(f.matches(&w("Caja", 20)));
        assert!(!f.matches(&w("Caja", 9)));
        assert!(!f.matches(&w("Caja", 21)));
    }

    #[test]
    fn test_pot_filter() {
        let f = WithdrawalFilter::by_pot("Caja");
        let list = vec![w("Caja", 3), w("Premios", 2), w("Caja", 1)];
        let hits = f.apply(&list);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].timestamp, at(3));
        assert!(!f.is_unfiltered());
        assert!(WithdrawalFilter::all().is_unfiltered());
    }

    #[test]
    fn test_amount_bounds() {
        let f = WithdrawalFilter {
            min_amount: Some(100),
            max_amount: Some(100),
            ..WithdrawalFilter::default()
        };
        assert!(f.matches(&w("Caja", 1)));
        let mut big = w("Caja", 1);
        big.amount = 101;
        assert!(!f.matches(&big));
        assert!(!f.is_unfiltered());
    }

    #[test]
    fn test_query_shape() {
        let mut f = WithdrawalFilter::in_range(at(0), at(60));
        f.pot = Some("Caja".into());
        let q = f.to_query();
        assert_eq!(q.table, Table::Withdrawals);
        assert_eq!(q.filters.len(), 3);
        assert_eq!(q.filters[1].op, FilterOp::Gte);
        assert_eq!(q.filters[1].value, "1970-01-01T00:00:00.000Z");
        assert!(q.order.as_ref().is_some_and(|o| o.descending));
    }
}
