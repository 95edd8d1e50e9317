//! Walk-Forward Simulator (§4.14).
//!
//! Steps through a precomputed sequence of per-date decisions (run with and
//! without the Brain enabled by the caller), records allocations, scenario,
//! override intensity, and realized forward returns, then aggregates
//! hit-rate, flip-rate, stability, drawdown, and a Sharpe proxy. Sample
//! evaluation is embarrassingly parallel over rayon, matching the
//! concurrency model for independent simulation dates.

use std::collections::BTreeMap;

use rayon::prelude::*;
use regime_core::asset::Horizon;
use regime_core::types::{Allocation, Date, Scenario};
use serde::{Deserialize, Serialize};

/// One stepped date's outcome, computed by the caller's pipeline both with
/// and without the Brain enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSample {
    pub date: Date,
    pub brain_on_allocation: Allocation,
    pub brain_off_allocation: Allocation,
    pub scenario: Scenario,
    pub realized_forward_returns: BTreeMap<Horizon, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Percentage-point delta between the brain-on directional hit rate and
    /// the always-long baseline, per horizon (feeds Promotion Gate §4.15).
    pub per_horizon_delta_hit_rate_pp: BTreeMap<String, f64>,
    pub flip_rate_per_year: f64,
    pub avg_override_intensity: f64,
    pub max_override_intensity: f64,
    pub stability_score: f64,
    pub max_drawdown: f64,
    pub sharpe_proxy: f64,
    pub nan_detected: bool,
    pub samples_evaluated: usize,
}

fn override_intensity(on: &Allocation, off: &Allocation) -> f64 {
    (on.spx - off.spx).abs() + (on.btc - off.btc).abs() + (on.dxy - off.dxy).abs()
}

fn predicted_direction(on: &Allocation, off: &Allocation) -> i32 {
    let tilt = (on.spx + on.btc) - (off.spx + off.btc);
    if tilt > 1e-9 {
        1
    } else if tilt < -1e-9 {
        -1
    } else {
        0
    }
}

struct PerSample {
    intensity: f64,
    scenario: Scenario,
    /// horizon -> (brain directional call result if a call was made, baseline hit)
    hits_by_horizon: BTreeMap<Horizon, (Option<bool>, bool)>,
    step_return: Option<f64>,
}

fn evaluate_sample(sample: &SimulationSample) -> Option<PerSample> {
    let intensity = override_intensity(&sample.brain_on_allocation, &sample.brain_off_allocation);
    if !intensity.is_finite() {
        return None;
    }

    let direction = predicted_direction(&sample.brain_on_allocation, &sample.brain_off_allocation);
    let mut hits_by_horizon = BTreeMap::new();
    for (horizon, realized) in &sample.realized_forward_returns {
        if !realized.is_finite() {
            return None;
        }
        let baseline_hit = *realized > 0.0;
        let brain_hit = if direction != 0 {
            Some((direction > 0) == (*realized > 0.0))
        } else {
            None
        };
        hits_by_horizon.insert(*horizon, (brain_hit, baseline_hit));
    }

    let step_return = sample
        .realized_forward_returns
        .get(&Horizon::D30)
        .copied()
        .map(|r| r * (sample.brain_on_allocation.spx + sample.brain_on_allocation.btc));

    Some(PerSample {
        intensity,
        scenario: sample.scenario,
        hits_by_horizon,
        step_return,
    })
}

fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    for &v in equity_curve {
        peak = peak.max(v);
        if peak > 0.0 {
            let dd = (peak - v) / peak;
            max_dd = max_dd.max(dd);
        }
    }
    max_dd
}

fn sharpe_proxy(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = rolling_stats_mean(returns);
    let std = rolling_stats_std(returns, mean);
    if std < 1e-12 {
        0.0
    } else {
        (mean / std) * (252.0_f64).sqrt()
    }
}

fn rolling_stats_mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

fn rolling_stats_std(v: &[f64], mean: f64) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (v.len() - 1) as f64;
    var.sqrt()
}

/// Run the walk-forward simulation over precomputed samples.
pub fn simulate(samples: &[SimulationSample], span_years: f64) -> SimulationReport {
    let evaluated: Vec<Option<PerSample>> = samples.par_iter().map(evaluate_sample).collect();
    let nan_detected = evaluated.iter().any(|e| e.is_none());
    let valid: Vec<&PerSample> = evaluated.iter().filter_map(|e| e.as_ref()).collect();

    if valid.is_empty() {
        return SimulationReport {
            per_horizon_delta_hit_rate_pp: BTreeMap::new(),
            flip_rate_per_year: 0.0,
            avg_override_intensity: 0.0,
            max_override_intensity: 0.0,
            stability_score: 0.0,
            max_drawdown: 0.0,
            sharpe_proxy: 0.0,
            nan_detected,
            samples_evaluated: 0,
        };
    }

    let mut per_horizon_totals: BTreeMap<Horizon, (usize, usize, usize, usize)> = BTreeMap::new();
    // (brain_calls, brain_hits, baseline_calls, baseline_hits)
    for sample in &valid {
        for (horizon, (brain_hit, baseline_hit)) in &sample.hits_by_horizon {
            let entry = per_horizon_totals.entry(*horizon).or_insert((0, 0, 0, 0));
            entry.2 += 1;
            if *baseline_hit {
                entry.3 += 1;
            }
            // A neutral tilt makes no directional call and contributes
            // neither a call nor a hit to the brain-on rate.
            if let Some(hit) = brain_hit {
                entry.0 += 1;
                if *hit {
                    entry.1 += 1;
                }
            }
        }
    }

    let per_horizon_delta_hit_rate_pp: BTreeMap<String, f64> = per_horizon_totals
        .iter()
        .map(|(horizon, (brain_calls, brain_hits, baseline_calls, baseline_hits))| {
            let brain_rate = if *brain_calls > 0 {
                *brain_hits as f64 / *brain_calls as f64
            } else {
                0.0
            };
            let baseline_rate = if *baseline_calls > 0 {
                *baseline_hits as f64 / *baseline_calls as f64
            } else {
                0.0
            };
            (horizon.label().to_string(), (brain_rate - baseline_rate) * 100.0)
        })
        .collect();

    let intensities: Vec<f64> = valid.iter().map(|s| s.intensity).collect();
    let avg_override_intensity = rolling_stats_mean(&intensities);
    let max_override_intensity = intensities.iter().cloned().fold(0.0, f64::max);
    let intensity_variance = {
        let mean = avg_override_intensity;
        intensities.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / intensities.len().max(1) as f64
    };
    let stability_score = (1.0 - intensity_variance.sqrt() * 10.0).max(0.0);

    let mut flips = 0u32;
    for pair in valid.windows(2) {
        if pair[0].scenario != pair[1].scenario {
            flips += 1;
        }
    }
    let flip_rate_per_year = if span_years > 1e-9 { flips as f64 / span_years } else { 0.0 };

    let step_returns: Vec<f64> = valid.iter().filter_map(|s| s.step_return).collect();
    let mut equity = vec![1.0_f64];
    for r in &step_returns {
        let last = *equity.last().unwrap();
        equity.push(last * (1.0 + r));
    }
    let drawdown = max_drawdown(&equity);
    let sharpe = sharpe_proxy(&step_returns);

    SimulationReport {
        per_horizon_delta_hit_rate_pp,
        flip_rate_per_year,
        avg_override_intensity,
        max_override_intensity,
        stability_score,
        max_drawdown: drawdown,
        sharpe_proxy: sharpe,
        nan_detected,
        samples_evaluated: valid.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(date: Date, on_tilt: f64, realized: f64, scenario: Scenario) -> SimulationSample {
        let mut returns = BTreeMap::new();
        returns.insert(Horizon::D30, realized);
        SimulationSample {
            date,
            brain_on_allocation: Allocation { spx: 0.4 + on_tilt, btc: 0.2, dxy: 0.1, cash: 0.3 - on_tilt },
            brain_off_allocation: Allocation { spx: 0.4, btc: 0.2, dxy: 0.1, cash: 0.3 },
            scenario,
            realized_forward_returns: returns,
        }
    }

    #[test]
    fn report_has_no_nan_for_finite_inputs() {
        let samples = vec![
            sample(Date::from_ymd_opt(2024, 1, 1).unwrap(), 0.1, 0.02, Scenario::Base),
            sample(Date::from_ymd_opt(2024, 1, 8).unwrap(), -0.1, -0.01, Scenario::Risk),
        ];
        let report = simulate(&samples, 1.0);
        assert!(!report.nan_detected);
        assert_eq!(report.samples_evaluated, 2);
    }

    #[test]
    fn nan_inputs_are_flagged_and_excluded() {
        let mut bad = sample(Date::from_ymd_opt(2024, 1, 1).unwrap(), 0.1, f64::NAN, Scenario::Base);
        bad.realized_forward_returns.insert(Horizon::D30, f64::NAN);
        let good = sample(Date::from_ymd_opt(2024, 1, 8).unwrap(), 0.1, 0.02, Scenario::Base);
        let report = simulate(&[bad, good], 1.0);
        assert!(report.nan_detected);
        assert_eq!(report.samples_evaluated, 1);
    }

    #[test]
    fn flip_rate_counts_scenario_transitions() {
        let samples = vec![
            sample(Date::from_ymd_opt(2024, 1, 1).unwrap(), 0.1, 0.02, Scenario::Base),
            sample(Date::from_ymd_opt(2024, 1, 8).unwrap(), 0.1, 0.02, Scenario::Risk),
            sample(Date::from_ymd_opt(2024, 1, 15).unwrap(), 0.1, 0.02, Scenario::Risk),
        ];
        let report = simulate(&samples, 1.0);
        assert!((report.flip_rate_per_year - 1.0).abs() < 1e-9);
    }

    #[test]
    fn correctly_timed_bullish_tilt_produces_positive_delta_hit_rate() {
        let samples: Vec<SimulationSample> = (0..20)
            .map(|i| {
                let d = Date::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i * 7);
                sample(d, 0.2, 0.03, Scenario::Base)
            })
            .collect();
        let report = simulate(&samples, 1.0);
        let delta = report.per_horizon_delta_hit_rate_pp["30D"];
        assert!(delta >= 0.0);
    }

    #[test]
    fn drawdown_is_non_negative() {
        let samples = vec![
            sample(Date::from_ymd_opt(2024, 1, 1).unwrap(), 0.1, -0.05, Scenario::Risk),
            sample(Date::from_ymd_opt(2024, 1, 8).unwrap(), 0.1, -0.03, Scenario::Risk),
        ];
        let report = simulate(&samples, 1.0);
        assert!(report.max_drawdown >= 0.0);
    }
}
