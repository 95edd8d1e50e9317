//! Macro Context Builder (§4.3).
//!
//! Normalizes a series to weekly-as-of-Friday, computes {4,13,26}-week
//! deltas and their 5-year rolling z-scores, and assembles a `SeriesContext`.

use chrono::{Datelike, Weekday};
use regime_core::types::{Date, Frequency, Series, SeriesContext};
use rolling_stats::{clamp_z, deltas, five_year_stats, z_score};

const Z_CLAMP: f64 = 4.0;

/// Advance `d` to the Friday of its week (Mon=0 ... Sun=6 internally via
/// `chrono::Weekday::num_days_from_monday`).
fn week_ending_friday(d: Date) -> Date {
    let dow = d.weekday().num_days_from_monday(); // Mon=0 .. Sun=6
    let friday_offset = 4i64 - dow as i64; // Friday = index 4
    d + chrono::Duration::days(friday_offset)
}

/// Resample `series` onto a weekly-as-of-Friday grid.
///
/// - Weekly-frequency series are kept as-is (already one point per week).
/// - Daily-frequency series are aggregated by taking the last value on or
///   before each Friday boundary.
/// - Monthly series are left unchanged; the weekly grid degrades gracefully
///   (each week simply repeats the last published monthly value via
///   `value_at_or_before` at the call site, not here).
pub fn normalize_weekly(series: &Series) -> Series {
    match series.frequency {
        Frequency::Weekly => series.clone(),
        Frequency::Daily => {
            let mut weeks: Vec<Date> = series
                .points()
                .iter()
                .map(|p| week_ending_friday(p.date))
                .collect();
            weeks.sort();
            weeks.dedup();

            let points = weeks
                .into_iter()
                .filter_map(|friday| {
                    series
                        .value_at_or_before(friday)
                        .map(|value| regime_core::types::SeriesPoint { date: friday, value })
                })
                .collect();

            Series::new(series.id.clone(), Frequency::Weekly, points)
        }
        Frequency::Monthly => series.clone(),
    }
}

/// Build a `SeriesContext` for `series` as of `reference_date`.
///
/// All inputs are assumed to already have passed the as-of filter; this
/// function only does the weekly resampling, deltas, and z-scoring.
pub fn build_context(series: &Series, reference_date: Date) -> SeriesContext {
    let weekly = normalize_weekly(series);
    let as_of_friday = week_ending_friday(reference_date);
    let history: Vec<f64> = weekly
        .up_to(as_of_friday)
        .iter()
        .map(|p| p.value)
        .collect();

    let current_value = history.last().copied();

    let delta_4w = nth_delta(&history, 4);
    let delta_13w = nth_delta(&history, 13);
    let delta_26w = nth_delta(&history, 26);

    let delta_series_4w = deltas(&history, 4);
    let delta_series_13w = deltas(&history, 13);
    let delta_series_26w = deltas(&history, 26);

    let z_4w = delta_4w.and_then(|d| z_score(d, &delta_series_4w)).map(|z| clamp_z(z, Z_CLAMP));
    let z_13w = delta_13w.and_then(|d| z_score(d, &delta_series_13w)).map(|z| clamp_z(z, Z_CLAMP));
    let z_26w = delta_26w.and_then(|d| z_score(d, &delta_series_26w)).map(|z| clamp_z(z, Z_CLAMP));

    let five_year = five_year_stats(&history);

    SeriesContext {
        series_id: series.id.clone(),
        as_of: reference_date,
        current_value,
        delta_4w,
        delta_13w,
        delta_26w,
        z_4w,
        z_13w,
        z_26w,
        mean_5y: five_year.map(|s| s.mean),
        std_5y: five_year.map(|s| s.std),
        min_5y: five_year.map(|s| s.min),
        max_5y: five_year.map(|s| s.max),
    }
}

fn nth_delta(history: &[f64], n: usize) -> Option<f64> {
    if history.len() <= n {
        return None;
    }
    Some(history[history.len() - 1] - history[history.len() - 1 - n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_core::types::SeriesPoint;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_ending_friday_rolls_forward_within_week() {
        // Wednesday 2024-01-03 -> Friday 2024-01-05
        assert_eq!(week_ending_friday(d(2024, 1, 3)), d(2024, 1, 5));
        // Friday itself is unchanged
        assert_eq!(week_ending_friday(d(2024, 1, 5)), d(2024, 1, 5));
    }

    #[test]
    fn daily_series_aggregates_to_last_value_of_week() {
        let points = vec![
            SeriesPoint { date: d(2024, 1, 1), value: 1.0 }, // Mon
            SeriesPoint { date: d(2024, 1, 2), value: 2.0 }, // Tue
            SeriesPoint { date: d(2024, 1, 3), value: 3.0 }, // Wed (last before Fri)
        ];
        let series = Series::new("SPX", Frequency::Daily, points);
        let weekly = normalize_weekly(&series);
        assert_eq!(weekly.points().len(), 1);
        assert_eq!(weekly.points()[0].value, 3.0);
        assert_eq!(weekly.points()[0].date, d(2024, 1, 5));
    }

    #[test]
    fn context_has_no_deltas_with_too_little_history() {
        let points: Vec<_> = (0..3)
            .map(|i| SeriesPoint { date: d(2024, 1, 5) + chrono::Duration::weeks(i), value: 100.0 + i as f64 })
            .collect();
        let series = Series::new("WALCL", Frequency::Weekly, points);
        let ctx = build_context(&series, d(2024, 1, 19));
        assert!(ctx.delta_4w.is_none());
        assert!(ctx.current_value.is_some());
    }

    #[test]
    fn context_z_scores_are_clamped() {
        let mut points = Vec::new();
        // 60 weeks of flat data, then one huge jump.
        for i in 0..60 {
            points.push(SeriesPoint {
                date: d(2023, 1, 6) + chrono::Duration::weeks(i),
                value: 100.0,
            });
        }
        let last_date = d(2023, 1, 6) + chrono::Duration::weeks(60);
        points.push(SeriesPoint { date: last_date, value: 100000.0 });

        let series = Series::new("WALCL", Frequency::Weekly, points);
        let ctx = build_context(&series, last_date);
        if let Some(z) = ctx.z_4w {
            assert!(z <= 4.0 && z >= -4.0);
        }
    }
}
