//! Rolling Statistics (§4.2).
//!
//! Pure functions only. Every windowed statistic here returns `None` (never
//! `NaN`) when the minimum sample count for that axis isn't met, and the
//! Pearson correlation guards against a near-zero-variance denominator.

pub const MIN_CORRELATION_SAMPLES: usize = 5;
pub const MIN_ZSCORE_DELTAS: usize = 20;
pub const MIN_5Y_WEEKLY_POINTS: usize = 52;

/// Arithmetic mean. Empty input yields 0.0 (callers guard sample-count
/// separately).
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (n-1 denominator). Returns 0.0 for fewer than
/// two points.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Population standard deviation (n denominator); used where the reference
/// distribution is treated as the full population rather than a sample.
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Successive differences: `data[i] - data[i - step]` for each valid `i`.
pub fn deltas(data: &[f64], step: usize) -> Vec<f64> {
    if step == 0 || data.len() <= step {
        return Vec::new();
    }
    (step..data.len()).map(|i| data[i] - data[i - step]).collect()
}

/// Z-score of `value` against `history`, requiring at least
/// `MIN_ZSCORE_DELTAS` points in `history`. Returns `None` rather than a
/// degenerate 0.0 so callers can distinguish "no signal" from "no data".
pub fn z_score(value: f64, history: &[f64]) -> Option<f64> {
    if history.len() < MIN_ZSCORE_DELTAS {
        return None;
    }
    let sd = std_dev(history);
    if sd < 1e-12 {
        return Some(0.0);
    }
    Some((value - mean(history)) / sd)
}

/// Clamp a z-score to `[-limit, +limit]` (§4.3 clamps weekly z to [-4, 4]).
pub fn clamp_z(z: f64, limit: f64) -> f64 {
    z.clamp(-limit, limit)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FiveYearStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Rolling 5-year (260-week) mean/std/min/max, requiring at least
/// `MIN_5Y_WEEKLY_POINTS` weekly observations.
pub fn five_year_stats(weekly_values: &[f64]) -> Option<FiveYearStats> {
    if weekly_values.len() < MIN_5Y_WEEKLY_POINTS {
        return None;
    }
    let window = &weekly_values[weekly_values.len().saturating_sub(260)..];
    Some(FiveYearStats {
        mean: mean(window),
        std: std_dev(window),
        min: window.iter().cloned().fold(f64::INFINITY, f64::min),
        max: window.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Pearson correlation coefficient between two equal-length series.
///
/// Guards: fewer than `MIN_CORRELATION_SAMPLES` paired points, or a
/// denominator below `1e-12` (zero-variance in either leg), both yield
/// `None` rather than `NaN`.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < MIN_CORRELATION_SAMPLES {
        return None;
    }
    let a = &a[..n];
    let b = &b[..n];

    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        return Some(0.0);
    }
    let corr = cov / denom;
    Some(corr.clamp(-1.0, 1.0))
}

/// Log returns `ln(p[i] / p[i-1])` for a price series.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter_map(|w| {
            if w[0] > 0.0 && w[1] > 0.0 {
                Some((w[1] / w[0]).ln())
            } else {
                None
            }
        })
        .collect()
}

/// Simple moving average over the trailing `window` points of `data`,
/// evaluated at the last element. `None` if `data` is shorter than `window`.
pub fn rolling_mean_last(data: &[f64], window: usize) -> Option<f64> {
    if data.len() < window || window == 0 {
        return None;
    }
    Some(mean(&data[data.len() - window..]))
}
