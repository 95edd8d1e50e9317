//! Macro Score Engine (§4.5).
//!
//! Aggregates per-series macro pressure into a single signed score using the
//! active per-horizon weight set. Series whose context is unavailable are
//! skipped and their weight is renormalized across survivors; if the skipped
//! weight exceeds half the total, confidence is forced to LOW.

use std::collections::HashMap;

use regime_core::types::{ComponentContribution, ConfidenceLabel, MacroScore, SeriesContext};
use serde::{Deserialize, Serialize};

/// One series' contribution within a per-horizon weight set (weights sum
/// to 1.0 +/- 0.01, each in [minWeight, maxWeight]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesWeight {
    pub series_id: String,
    pub weight: f64,
    pub lag_days: i64,
    /// Expected sign of this series' economic pressure (+1.0 or -1.0).
    pub sign: f64,
}

/// The active weight set for one (asset, horizon) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroWeightSet {
    pub asset: String,
    pub horizon_label: String,
    pub components: Vec<SeriesWeight>,
}

impl MacroWeightSet {
    pub fn total_weight(&self) -> f64 {
        self.components.iter().map(|c| c.weight).sum()
    }
}

fn context_z(ctx: &SeriesContext) -> Option<f64> {
    ctx.z_4w.or(ctx.z_13w).or(ctx.z_26w)
}

/// Compute the macro score for one (asset, horizon).
///
/// `contexts` maps series id -> the `SeriesContext` built as-of
/// `T - lag_days` for that series (the caller is responsible for building
/// each context at the right lagged reference date; this function is pure
/// aggregation and does not itself apply lags).
pub fn compute(weights: &MacroWeightSet, contexts: &HashMap<String, SeriesContext>) -> MacroScore {
    let total_weight = weights.total_weight().max(1e-9);

    let mut used_weight = 0.0;
    let mut missing = Vec::new();
    let mut components = Vec::new();
    let mut raw_sum = 0.0;

    for c in &weights.components {
        let Some(ctx) = contexts.get(&c.series_id) else {
            missing.push(c.series_id.clone());
            continue;
        };
        let Some(z) = context_z(ctx) else {
            missing.push(c.series_id.clone());
            continue;
        };

        used_weight += c.weight;
        let pressure = c.sign * z;
        raw_sum += pressure * c.weight;

        components.push(ComponentContribution {
            series_id: c.series_id.clone(),
            weight: c.weight,
            lag_days: c.lag_days,
            signed_pressure: pressure,
        });
    }

    let skipped_weight = total_weight - used_weight;
    let skipped_fraction = skipped_weight / total_weight;

    // Renormalize the raw sum over the weight actually used.
    let score = if used_weight > 1e-9 {
        (raw_sum / used_weight).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    let confidence = if skipped_fraction > 0.5 {
        ConfidenceLabel::Low.to_numeric()
    } else {
        let data_quality = (used_weight / total_weight).clamp(0.0, 1.0);
        let magnitude = (score.abs() / 0.5).min(1.0);
        (0.5 * data_quality + 0.5 * magnitude).clamp(0.0, 1.0)
    };

    MacroScore {
        score,
        confidence,
        components,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_core::types::Date;

    fn ctx(id: &str, z: f64) -> SeriesContext {
        SeriesContext {
            series_id: id.to_string(),
            as_of: Date::from_ymd_opt(2024, 1, 1).unwrap(),
            current_value: Some(1.0),
            delta_4w: Some(0.1),
            delta_13w: Some(0.1),
            delta_26w: Some(0.1),
            z_4w: Some(z),
            z_13w: None,
            z_26w: None,
            mean_5y: Some(1.0),
            std_5y: Some(0.1),
            min_5y: Some(0.5),
            max_5y: Some(1.5),
        }
    }

    fn weights() -> MacroWeightSet {
        MacroWeightSet {
            asset: "SPX".to_string(),
            horizon_label: "90D".to_string(),
            components: vec![
                SeriesWeight { series_id: "CPI".to_string(), weight: 0.4, lag_days: 30, sign: -1.0 },
                SeriesWeight { series_id: "WALCL".to_string(), weight: 0.3, lag_days: 7, sign: 1.0 },
                SeriesWeight { series_id: "NFP".to_string(), weight: 0.3, lag_days: 30, sign: 1.0 },
            ],
        }
    }

    #[test]
    fn full_data_produces_clamped_score_in_bounds() {
        let mut contexts = HashMap::new();
        contexts.insert("CPI".to_string(), ctx("CPI", 2.0));
        contexts.insert("WALCL".to_string(), ctx("WALCL", 1.0));
        contexts.insert("NFP".to_string(), ctx("NFP", 1.0));

        let score = compute(&weights(), &contexts);
        assert!(score.score >= -1.0 && score.score <= 1.0);
        assert!(score.missing.is_empty());
    }

    #[test]
    fn missing_series_are_skipped_and_recorded() {
        let mut contexts = HashMap::new();
        contexts.insert("WALCL".to_string(), ctx("WALCL", 1.0));
        contexts.insert("NFP".to_string(), ctx("NFP", 1.0));

        let score = compute(&weights(), &contexts);
        assert_eq!(score.missing, vec!["CPI".to_string()]);
    }

    #[test]
    fn majority_missing_forces_low_confidence() {
        let mut contexts = HashMap::new();
        contexts.insert("NFP".to_string(), ctx("NFP", 1.0)); // only 0.3 of 1.0 weight

        let score = compute(&weights(), &contexts);
        assert_eq!(score.confidence, ConfidenceLabel::Low.to_numeric());
    }

    #[test]
    fn zero_data_yields_zero_score_not_nan() {
        let contexts = HashMap::new();
        let score = compute(&weights(), &contexts);
        assert_eq!(score.score, 0.0);
        assert!(!score.score.is_nan());
    }

    #[test]
    fn sign_flips_direction_of_contribution() {
        let mut contexts = HashMap::new();
        contexts.insert("CPI".to_string(), ctx("CPI", 2.0)); // sign -1
        contexts.insert("WALCL".to_string(), ctx("WALCL", 0.0));
        contexts.insert("NFP".to_string(), ctx("NFP", 0.0));

        let score = compute(&weights(), &contexts);
        assert!(score.score < 0.0);
    }
}
