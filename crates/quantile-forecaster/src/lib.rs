//! Quantile Mixture-of-Experts Forecaster (§4.9).
//!
//! Trains one linear quantile-regression model per (regime, horizon,
//! quantile) via pinball-loss SGD, seeded with xorshift32 for
//! reproducibility. At inference, per-regime quantile predictions are
//! mixed by the regime posterior, clamped, and made monotone.

use std::collections::BTreeMap;

use chrono::Utc;
use regime_core::asset::{Horizon, Quantile};
use regime_core::rng::XorShift32;
use regime_core::types::{HorizonForecast, QuantileWeights, TrainedModel};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_SAMPLES_PER_EXPERT: usize = 60;
pub const DEFAULT_SMOOTHING: f64 = 0.25;
const EPOCHS: usize = 200;
const LR0: f64 = 0.01;
const NEUTRAL_LABEL: &str = "Neutral";

#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub features: Vec<f64>,
    pub regime: String,
    /// Forward return realized `horizon.days()` after this sample's date.
    pub forward_returns: BTreeMap<Horizon, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub seed: u64,
    pub min_samples_per_expert: usize,
    pub smoothing: f64,
    pub horizons: Vec<Horizon>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            min_samples_per_expert: DEFAULT_MIN_SAMPLES_PER_EXPERT,
            smoothing: DEFAULT_SMOOTHING,
            horizons: Horizon::ALL.to_vec(),
        }
    }
}

fn pinball_gradient(y: f64, y_hat: f64, tau: f64) -> f64 {
    if y > y_hat {
        -tau
    } else {
        1.0 - tau
    }
}

/// Deterministic per-(regime,horizon,quantile) RNG stream: same inputs
/// always produce the same stream regardless of training iteration order.
fn stream_seed(base_seed: u64, regime: &str, horizon: Horizon, quantile: Quantile) -> u32 {
    let mut acc: u64 = base_seed;
    for b in regime.as_bytes() {
        acc = acc.wrapping_mul(31).wrapping_add(*b as u64);
    }
    acc = acc.wrapping_mul(31).wrapping_add(horizon.days() as u64);
    acc = acc.wrapping_mul(31).wrapping_add((quantile.tau() * 1000.0) as u64);
    (acc ^ (acc >> 32)) as u32
}

/// Train a single (regime, horizon, quantile) linear model via pinball-loss
/// SGD over `epochs` passes, with a per-epoch shuffle and L2 penalty
/// proportional to `smoothing`.
fn train_one(
    samples: &[(&[f64], f64)],
    tau: f64,
    feature_count: usize,
    seed: u32,
    smoothing: f64,
) -> QuantileWeights {
    let mut rng = XorShift32::new(seed);
    let mut weights: Vec<f64> = (0..feature_count)
        .map(|_| 0.001 * rng.next_standard_normal())
        .collect();
    let mut bias = 0.0_f64;

    let l2 = smoothing * 0.001;
    let n = samples.len();
    if n == 0 {
        return QuantileWeights { weights, bias };
    }

    let mut indices: Vec<usize> = (0..n).collect();
    for epoch in 0..EPOCHS {
        rng.shuffle(&mut indices);
        let lr = LR0 / (1.0 + 0.01 * epoch as f64);
        for &idx in &indices {
            let (x, y) = samples[idx];
            let y_hat: f64 = weights.iter().zip(x.iter()).map(|(w, xi)| w * xi).sum::<f64>() + bias;
            let grad = pinball_gradient(y, y_hat, tau);
            for (w, xi) in weights.iter_mut().zip(x.iter()) {
                *w -= lr * (grad * xi + l2 * *w);
            }
            bias -= lr * grad;
        }
    }

    QuantileWeights { weights, bias }
}

/// Train the full mixture-of-experts model.
pub fn train(samples: &[TrainingSample], config: &TrainingConfig, version_id: String) -> TrainedModel {
    let started = Utc::now();
    let feature_count = samples.first().map(|s| s.features.len()).unwrap_or(0);

    let mut by_regime: BTreeMap<String, Vec<&TrainingSample>> = BTreeMap::new();
    for s in samples {
        by_regime.entry(s.regime.clone()).or_default().push(s);
    }

    let mut experts: BTreeMap<String, BTreeMap<String, BTreeMap<String, QuantileWeights>>> = BTreeMap::new();
    let mut dropped_regimes = Vec::new();
    let mut samples_per_regime = BTreeMap::new();

    for (regime, regime_samples) in &by_regime {
        samples_per_regime.insert(regime.clone(), regime_samples.len());
        if regime_samples.len() < config.min_samples_per_expert {
            dropped_regimes.push(regime.clone());
            continue;
        }

        let mut per_horizon: BTreeMap<String, BTreeMap<String, QuantileWeights>> = BTreeMap::new();
        for horizon in &config.horizons {
            let xy: Vec<(&[f64], f64)> = regime_samples
                .iter()
                .filter_map(|s| s.forward_returns.get(horizon).map(|r| (s.features.as_slice(), *r)))
                .collect();

            let mut per_quantile = BTreeMap::new();
            for quantile in Quantile::ALL {
                let seed = stream_seed(config.seed, regime, *horizon, quantile);
                let w = train_one(&xy, quantile.tau(), feature_count, seed, config.smoothing);
                per_quantile.insert(quantile.label().to_string(), w);
            }
            per_horizon.insert(horizon.label().to_string(), per_quantile);
        }
        experts.insert(regime.clone(), per_horizon);
    }

    let elapsed_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;

    TrainedModel {
        version_id,
        trained_at: started,
        seed: config.seed,
        smoothing: config.smoothing,
        feature_count,
        horizons: config.horizons.clone(),
        experts,
        dropped_regimes,
        samples_per_regime,
        training_wall_time_ms: elapsed_ms,
    }
}

fn predict_raw(weights: &QuantileWeights, features: &[f64]) -> f64 {
    weights
        .weights
        .iter()
        .zip(features.iter())
        .map(|(w, x)| w * x)
        .sum::<f64>()
        + weights.bias
}

/// Look up an expert's weights for (regime, horizon, quantile), falling back
/// to the NEUTRAL expert if this regime was dropped at training time.
fn lookup_weights<'a>(
    model: &'a TrainedModel,
    regime: &str,
    horizon_label: &str,
    quantile_label: &str,
) -> Option<&'a QuantileWeights> {
    model
        .experts
        .get(regime)
        .or_else(|| model.experts.get(NEUTRAL_LABEL))
        .and_then(|h| h.get(horizon_label))
        .and_then(|q| q.get(quantile_label))
}

fn return_bound(horizon: Horizon) -> f64 {
    horizon.risk_band() * 3.0
}

/// Run inference for one feature vector against a regime posterior
/// distribution (regime label -> probability), producing a per-horizon
/// forecast.
pub fn infer(
    model: &TrainedModel,
    features: &[f64],
    regime_posterior: &BTreeMap<String, f64>,
) -> BTreeMap<Horizon, HorizonForecast> {
    // (a)/(c): renormalize the posterior if it drifts from 1 by more than 1%.
    let total: f64 = regime_posterior.values().sum();
    let normalized: BTreeMap<String, f64> = if total > 1e-9 && (total - 1.0).abs() > 0.01 {
        regime_posterior.iter().map(|(k, v)| (k.clone(), v / total)).collect()
    } else {
        regime_posterior.clone()
    };

    let mut out = BTreeMap::new();
    for horizon in &model.horizons {
        let horizon_label = horizon.label();
        let mut mixed: BTreeMap<Quantile, f64> = BTreeMap::new();

        for quantile in Quantile::ALL {
            let mut acc = 0.0;
            let mut weight_used = 0.0;
            for (regime, p) in &normalized {
                if let Some(w) = lookup_weights(model, regime, horizon_label, quantile.label()) {
                    acc += p * predict_raw(w, features);
                    weight_used += p;
                }
            }
            let value = if weight_used > 1e-9 { acc / weight_used } else { 0.0 };
            mixed.insert(quantile, value);
        }

        let bound = return_bound(*horizon);
        let mut q05 = mixed[&Quantile::Q05].clamp(-bound, bound);
        let mut q50 = mixed[&Quantile::Q50].clamp(-bound, bound);
        let mut q95 = mixed[&Quantile::Q95].clamp(-bound, bound);

        // (e) enforce monotonicity by sorting.
        let mut sorted = [q05, q50, q95];
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        q05 = sorted[0];
        q50 = sorted[1];
        q95 = sorted[2];

        let mean = (q05 + q50 + q95) / 3.0;
        let tail_risk = ((q50 - q05) / horizon.risk_band()).clamp(0.0, 1.0);

        out.insert(
            *horizon,
            HorizonForecast {
                mean,
                q05,
                q50,
                q95,
                tail_risk,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(features: Vec<f64>, regime: &str, ret90: f64) -> TrainingSample {
        let mut fr = BTreeMap::new();
        fr.insert(Horizon::D90, ret90);
        TrainingSample {
            features,
            regime: regime.to_string(),
            forward_returns: fr,
        }
    }

    fn toy_samples(regime: &str, n: usize, base: f64) -> Vec<TrainingSample> {
        (0..n)
            .map(|i| {
                let x = (i % 5) as f64 * 0.1;
                sample(vec![x, 1.0], regime, base + 0.01 * x)
            })
            .collect()
    }

    #[test]
    fn regimes_below_min_samples_are_dropped() {
        let mut samples = toy_samples("Neutral", 80, 0.0);
        samples.extend(toy_samples("Stress", 10, -0.05));

        let config = TrainingConfig {
            horizons: vec![Horizon::D90],
            ..Default::default()
        };
        let model = train(&samples, &config, "v1".to_string());
        assert!(model.dropped_regimes.contains(&"Stress".to_string()));
        assert!(!model.experts.contains_key("Stress"));
        assert!(model.experts.contains_key("Neutral"));
    }

    #[test]
    fn training_is_deterministic_for_same_seed() {
        let samples = toy_samples("Neutral", 80, 0.02);
        let config = TrainingConfig {
            horizons: vec![Horizon::D90],
            ..Default::default()
        };
        let m1 = train(&samples, &config, "v1".to_string());
        let m2 = train(&samples, &config, "v1".to_string());

        let w1 = &m1.experts["Neutral"]["90D"]["q50"];
        let w2 = &m2.experts["Neutral"]["90D"]["q50"];
        assert_eq!(w1.weights, w2.weights);
        assert_eq!(w1.bias, w2.bias);
    }

    #[test]
    fn inference_produces_monotone_quantiles() {
        let samples = toy_samples("Neutral", 80, 0.02);
        let config = TrainingConfig {
            horizons: vec![Horizon::D90],
            ..Default::default()
        };
        let model = train(&samples, &config, "v1".to_string());

        let mut posterior = BTreeMap::new();
        posterior.insert("Neutral".to_string(), 1.0);

        let forecasts = infer(&model, &[0.2, 1.0], &posterior);
        let f = &forecasts[&Horizon::D90];
        assert!(f.q05 <= f.q50);
        assert!(f.q50 <= f.q95);
    }

    #[test]
    fn dropped_regime_falls_back_to_neutral_at_inference() {
        let mut samples = toy_samples("Neutral", 80, 0.0);
        samples.extend(toy_samples("Stress", 5, -0.1));
        let config = TrainingConfig {
            horizons: vec![Horizon::D90],
            ..Default::default()
        };
        let model = train(&samples, &config, "v1".to_string());

        let mut posterior = BTreeMap::new();
        posterior.insert("Stress".to_string(), 1.0);
        let forecasts = infer(&model, &[0.2, 1.0], &posterior);
        assert!(forecasts.contains_key(&Horizon::D90));
    }

    #[test]
    fn tail_risk_is_clipped_to_unit_interval() {
        let samples = toy_samples("Neutral", 80, 0.3);
        let config = TrainingConfig {
            horizons: vec![Horizon::D30],
            ..Default::default()
        };
        let model = train(&samples, &config, "v1".to_string());
        let mut posterior = BTreeMap::new();
        posterior.insert("Neutral".to_string(), 1.0);
        let forecasts = infer(&model, &[0.2, 1.0], &posterior);
        let f = &forecasts[&Horizon::D30];
        assert!(f.tail_risk >= 0.0 && f.tail_risk <= 1.0);
    }

    #[test]
    fn posterior_drifting_from_one_is_renormalized() {
        let samples = toy_samples("Neutral", 80, 0.02);
        let config = TrainingConfig {
            horizons: vec![Horizon::D90],
            ..Default::default()
        };
        let model = train(&samples, &config, "v1".to_string());

        let mut skewed = BTreeMap::new();
        skewed.insert("Neutral".to_string(), 1.5); // drifts > 1%
        let mut exact = BTreeMap::new();
        exact.insert("Neutral".to_string(), 1.0);

        let a = infer(&model, &[0.2, 1.0], &skewed);
        let b = infer(&model, &[0.2, 1.0], &exact);
        assert!((a[&Horizon::D90].mean - b[&Horizon::D90].mean).abs() < 1e-9);
    }
}
