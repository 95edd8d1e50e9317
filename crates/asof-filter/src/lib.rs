//! As-Of Filter (§4.1).
//!
//! Drops observations not yet published at a given reference date so that
//! downstream computation can never dereference a point from the future.

use regime_core::types::{publication_lag_days, Date, Series};
use regime_core::{DecisionError, DecisionResult};

/// Return only the points of `series` published on or before `reference_date`.
///
/// A point with date `d` is considered published at `d + lag` where `lag` is
/// the static per-series table (`publication_lag_days`). Fails with
/// `SeriesUnavailable` if zero points survive.
pub fn as_of(series: &Series, reference_date: Date) -> DecisionResult<Series> {
    let lag = publication_lag_days(&series.id);
    let cutoff = reference_date - chrono::Duration::days(lag);
    let points: Vec<_> = series
        .up_to(cutoff)
        .iter()
        .copied()
        .collect();

    if points.is_empty() {
        return Err(DecisionError::SeriesUnavailable(format!(
            "{} has no points published on or before {} (lag={}d, cutoff={})",
            series.id, reference_date, lag, cutoff
        )));
    }

    Ok(Series::new(series.id.clone(), series.frequency, points))
}

/// Convenience: the freshest value available as-of `reference_date`, or
/// `None` if nothing has been published yet (treated as missing by callers,
/// never as an error by itself — only `as_of` raises `SeriesUnavailable`).
pub fn latest_value_as_of(series: &Series, reference_date: Date) -> Option<f64> {
    as_of(series, reference_date)
        .ok()
        .and_then(|s| s.last().map(|p| p.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_core::types::{Frequency, SeriesPoint};

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn make(id: &str, dates: &[(i32, u32, u32)], values: &[f64]) -> Series {
        let points = dates
            .iter()
            .zip(values)
            .map(|(&(y, m, day), &v)| SeriesPoint { date: d(y, m, day), value: v })
            .collect();
        Series::new(id, Frequency::Daily, points)
    }

    #[test]
    fn daily_series_has_zero_lag() {
        let s = make("SPX", &[(2024, 1, 1), (2024, 1, 2)], &[100.0, 101.0]);
        let filtered = as_of(&s, d(2024, 1, 2)).unwrap();
        assert_eq!(filtered.points().len(), 2);
    }

    #[test]
    fn monthly_series_respects_30d_lag() {
        let s = make("CPI", &[(2024, 1, 1)], &[3.1]);
        // Published Jan 1, lag 30d -> not visible until ~Jan 31.
        assert!(as_of(&s, d(2024, 1, 15)).is_err());
        let filtered = as_of(&s, d(2024, 1, 31)).unwrap();
        assert_eq!(filtered.points().len(), 1);
    }

    #[test]
    fn weekly_series_respects_7d_lag() {
        let s = make("WALCL", &[(2024, 1, 1), (2024, 1, 8)], &[7000.0, 7010.0]);
        let filtered = as_of(&s, d(2024, 1, 10)).unwrap();
        // Jan 8 point needs cutoff >= Jan 8, i.e. reference >= Jan 15.
        assert_eq!(filtered.points().len(), 1);
        assert_eq!(filtered.last().unwrap().value, 7000.0);
    }

    #[test]
    fn no_surviving_points_is_series_unavailable() {
        let s = make("CPI", &[(2024, 6, 1)], &[3.0]);
        let err = as_of(&s, d(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, DecisionError::SeriesUnavailable(_)));
    }

    #[test]
    fn as_of_never_reveals_future_points() {
        let s = make(
            "SPX",
            &[(2024, 1, 1), (2024, 1, 2), (2024, 1, 3)],
            &[100.0, 101.0, 999.0],
        );
        let filtered = as_of(&s, d(2024, 1, 2)).unwrap();
        assert!(filtered.points().iter().all(|p| p.date <= d(2024, 1, 2)));
        assert_eq!(filtered.last().unwrap().value, 101.0);
    }
}
