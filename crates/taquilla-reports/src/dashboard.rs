//! The reporting dashboard.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use taquilla_types::{Bet, DrawResult};

use crate::hourly::{hourly_distribution, peak_hour, HourBucket};
use crate::ranking::{top_animals, top_lotteries, AnimalRank, RankedEntity};
use crate::trend::{classify, daily_baseline, Trend};
use crate::window_stats::{period_summary, profit_margin, PeriodSummary};
use crate::windows::Windows;

/// Today's figure against the week's daily average.
#[derive(Clone, Debug, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct TrendReport {
    pub current: f64,
    pub baseline: f64,
    pub trend: Trend,
}

impl TrendReport {
    fn new(current: f64, week_total: f64) -> Self {
        let baseline = daily_baseline(week_total);
        Self {
            current,
            baseline,
            trend: classify(current, baseline),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct HourShare {
    #[serde(flatten)]
    pub bucket: HourBucket,
    /// Bets in this hour as a percentage of the peak hour's bets.
    pub share_of_peak: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub windows: WindowStarts,
    pub summary: PeriodSummary,
    pub profit_margin_today: f64,
    pub sales_trend: TrendReport,
    pub bets_trend: TrendReport,
    pub top_lotteries: Vec<RankedEntity>,
    pub top_animals: Vec<AnimalRank>,
    pub hourly: Vec<HourShare>,
    pub peak_hour: Option<HourBucket>,
}

/// Window starts, as shown next to the figures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct WindowStarts {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

/// Build the dashboard as of `now`, bucketing hours in `now`'s time zone.
pub fn build_dashboard<Tz: TimeZone>(
    bets: &[Bet],
    draws: &[DrawResult],
    now: &DateTime<Tz>,
) -> Dashboard {
    let windows = Windows::at(now);
    let summary = period_summary(bets, draws, &windows);

    let todays_bets: Vec<Bet> = bets
        .iter()
        .filter(|b| b.timestamp >= windows.today)
        .cloned()
        .collect();
    let distribution = hourly_distribution(&todays_bets, &now.timezone());
    let peak = peak_hour(&distribution).cloned();
    let peak_bets = peak.as_ref().map_or(0, |p| p.bets);

    let hourly = distribution
        .into_iter()
        .map(|bucket| HourShare {
            share_of_peak: if peak_bets == 0 {
                0.0
            } else {
                bucket.bets as f64 / peak_bets as f64 * 100.0
            },
            bucket,
        })
        .collect();

    Dashboard {
        generated_at: now.with_timezone(&Utc),
        windows: WindowStarts {
            today: windows.today,
            week: windows.week,
            month: windows.month,
        },
        profit_margin_today: profit_margin(&summary.today),
        sales_trend: TrendReport::new(
            summary.today.total_sales as f64,
            summary.week.total_sales as f64,
        ),
        bets_trend: TrendReport::new(
            summary.today.total_bets as f64,
            summary.week.total_bets as f64,
        ),
        top_lotteries: top_lotteries(bets),
        top_animals: top_animals(bets),
        hourly,
        peak_hour: peak,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bet, draw, utc, wed};

    #[test]
    fn test_empty_dashboard() {
        let d = build_dashboard(&[], &[], &wed(12, 0));
        assert_eq!(d.summary.all_time.total_bets, 0);
        assert_eq!(d.sales_trend.trend, Trend::Flat);
        assert!(d.hourly.is_empty());
        assert!(d.peak_hour.is_none());
        assert_eq!(d.profit_margin_today, 0.0);
    }

    #[test]
    fn test_dashboard_figures() {
        let bets = vec![
            bet("Lotto Activo", ("1", "Carnero"), 100, wed(9, 10)),
            bet("Lotto Activo", ("1", "Carnero"), 100, wed(9, 40)),
            bet("Granjita", ("5", "León"), 200, wed(11, 0)),
            bet("Granjita", ("5", "León"), 300, utc(2024, 5, 13, 10, 0)),
        ];
        let draws = vec![draw(100, wed(12, 0))];
        let d = build_dashboard(&bets, &draws, &wed(18, 0));

        assert_eq!(d.summary.today.total_sales, 400);
        assert_eq!(d.summary.week.total_sales, 700);
        assert_eq!(d.sales_trend.baseline, 100.0);
        assert_eq!(d.sales_trend.trend, Trend::Up);
        assert_eq!(d.bets_trend.trend, Trend::Up);
        assert!((d.profit_margin_today - 75.0).abs() < 1e-9);

        // Monday's bet is excluded from today's hours.
        assert_eq!(d.hourly.len(), 2);
        assert_eq!(d.peak_hour.as_ref().map(|p| p.hour), Some(9));
        assert_eq!(d.hourly[0].share_of_peak, 100.0);
        assert_eq!(d.hourly[1].share_of_peak, 50.0);

        assert_eq!(d.top_lotteries[0].name, "Granjita");
        assert_eq!(d.top_animals[0].count, 2);
    }

    #[test]
    fn test_hour_share_serializes_flat() {
        let d = build_dashboard(&[bet("Granjita", ("1", "Carnero"), 5, wed(8, 0))], &[], &wed(9, 0));
        let json = serde_json::to_value(&d.hourly[0]).expect("json");
        assert_eq!(json["hour"], 8);
        assert_eq!(json["share_of_peak"], 100.0);
    }
}
