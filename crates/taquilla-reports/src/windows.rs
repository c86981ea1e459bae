//! Reporting window boundaries.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;

/// Start instants of the rolling reporting windows. All-time has no start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Windows {
    /// Local midnight today.
    pub today: DateTime<Utc>,
    /// Local midnight on this week's Monday.
    pub week: DateTime<Utc>,
    /// Local midnight on the first of this month.
    pub month: DateTime<Utc>,
}

impl Windows {
    /// Windows containing `now`, in `now`'s time zone.
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let date = now.date_naive();
        let monday = date
            .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            .unwrap_or(date);
        let first = date.with_day(1).unwrap_or(date);

        Self {
            today: local_midnight(&tz, date),
            week: local_midnight(&tz, monday),
            month: local_midnight(&tz, first),
        }
    }
}

/// First instant of `date` in `tz`. A midnight skipped by a DST jump
/// resolves to the same wall time read as UTC.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(t) => t.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}
