//! Capital Allocation Optimizer (§4.13).
//!
//! A small-delta wrapper around the allocation policy's output: scores each
//! risk asset from forecast evidence, bounds the resulting delta, applies
//! scenario/cross-asset safety constraints in order, then renormalizes.

use std::collections::BTreeMap;

use regime_core::types::{
    Allocation, AssetRationale, CrossAssetRegime, OptimizerMode, OptimizerOutput, Posture, Scenario,
};
use serde::{Deserialize, Serialize};

const MAX_DELTA_BASE: f64 = 0.15;
const MAX_DELTA_DEFENSIVE: f64 = 0.08;
const MAX_DELTA_TAIL_CAP: f64 = 0.10;

const W_RETURN: f64 = 3.0;
const W_TAIL: f64 = 1.5;
const W_CORR: f64 = 1.0;
const W_GUARD: f64 = 0.5;
const SCORE_TO_DELTA_K: f64 = 1.0;

const CASH_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssetForecastInputs {
    pub mean: f64,
    pub q05: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerInputs {
    pub current: Allocation,
    pub posture: Posture,
    pub scenario: Scenario,
    pub cross_asset_regime: CrossAssetRegime,
    pub contagion_score: f64,
    pub spx_forecast: AssetForecastInputs,
    pub btc_forecast: AssetForecastInputs,
    pub mode: OptimizerMode,
}

fn max_delta_allowed(posture: Posture, scenario: Scenario) -> f64 {
    let base = match posture {
        Posture::Defensive => MAX_DELTA_DEFENSIVE,
        Posture::Offensive | Posture::Neutral => MAX_DELTA_BASE,
    };
    if scenario == Scenario::Tail {
        base.min(MAX_DELTA_TAIL_CAP)
    } else {
        base
    }
}

fn score(forecast: AssetForecastInputs, contagion: f64, posture: Posture) -> AssetRationale {
    let expected_tilt = forecast.mean * W_RETURN;
    let tail_penalty = forecast.q05.abs() * W_TAIL;
    let corr_penalty = contagion * W_CORR;
    let guard_penalty = if posture == Posture::Defensive { W_GUARD } else { 0.0 };
    let total = expected_tilt - tail_penalty - corr_penalty - guard_penalty;
    AssetRationale {
        expected_tilt,
        tail_penalty,
        corr_penalty,
        guard_penalty,
        score: total,
    }
}

/// Run the optimizer. In `off` mode the allocation is returned unchanged
/// and `applied` is false. In `preview` mode the deltas are computed but not
/// applied. In `on` mode deltas are applied to `inputs.current`.
pub fn optimize(inputs: &OptimizerInputs) -> OptimizerOutput {
    if inputs.mode == OptimizerMode::Off {
        return OptimizerOutput {
            mode: OptimizerMode::Off,
            rationale: BTreeMap::new(),
            deltas: BTreeMap::new(),
            final_allocations: inputs.current,
            applied: false,
        };
    }

    let max_delta = max_delta_allowed(inputs.posture, inputs.scenario);

    let spx_rationale = score(inputs.spx_forecast, inputs.contagion_score, inputs.posture);
    let btc_rationale = score(inputs.btc_forecast, inputs.contagion_score, inputs.posture);

    let mut spx_delta = (spx_rationale.score * SCORE_TO_DELTA_K).clamp(-max_delta, max_delta);
    let mut btc_delta = (btc_rationale.score * SCORE_TO_DELTA_K).clamp(-max_delta, max_delta);

    // Safety constraints, applied in order.
    if inputs.scenario == Scenario::Tail {
        spx_delta = spx_delta.min(0.0);
        btc_delta = btc_delta.min(0.0);
    }
    if inputs.cross_asset_regime == CrossAssetRegime::RiskOffSync {
        btc_delta = btc_delta.min(spx_delta);
    }

    let mut spx = (inputs.current.spx + spx_delta).max(0.0);
    let mut btc = (inputs.current.btc + btc_delta).max(0.0);
    let mut cash = inputs.current.cash;

    let deficit = CASH_FLOOR - cash;
    if deficit > 0.0 {
        if btc >= spx {
            let take = deficit.min(btc);
            btc -= take;
            cash += take;
        } else {
            let take = deficit.min(spx);
            spx -= take;
            cash += take;
        }
    }

    let total = spx + btc + cash;
    if total > 1e-9 {
        spx /= total;
        btc /= total;
        cash /= total;
    }

    let final_allocations = Allocation {
        spx,
        btc,
        dxy: inputs.current.dxy,
        cash,
    };

    let mut rationale = BTreeMap::new();
    rationale.insert("spx".to_string(), spx_rationale);
    rationale.insert("btc".to_string(), btc_rationale);

    let mut deltas = BTreeMap::new();
    deltas.insert("spx".to_string(), spx_delta);
    deltas.insert("btc".to_string(), btc_delta);

    OptimizerOutput {
        mode: inputs.mode,
        rationale,
        deltas,
        final_allocations,
        applied: inputs.mode == OptimizerMode::On,
    }
}
