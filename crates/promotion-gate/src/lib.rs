//! Promotion Gate (§4.15).
//!
//! Evaluates a walk-forward simulation report against the acceptance gates
//! and produces a promote/review/reject recommendation. In `on` mode a
//! `promote` recommendation atomically swaps the active version pointer via
//! the caller-supplied `ActiveVersionPointer`.

use regime_core::types::Scenario;
use serde::{Deserialize, Serialize};
use walk_forward_sim::SimulationReport;

const MIN_DELTA_HIT_RATE_PP: f64 = 2.0;
const MAX_DEGRADATION_PP: f64 = -1.0;
const MAX_FLIP_RATE_PER_YEAR: f64 = 6.0;
const MAX_OVERRIDE_INTENSITY_BASE_RISK: f64 = 0.35;
const MAX_OVERRIDE_INTENSITY_TAIL: f64 = 0.60;
const MAX_DATA_FRESHNESS_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Promote,
    Review,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Evaluate,
    On,
}

#[derive(Debug, Clone)]
pub struct GateInputs<'a> {
    pub report: &'a SimulationReport,
    pub dominant_scenario: Scenario,
    pub days_since_last_calibration: i64,
    pub router_fallback_count: u32,
    pub mode: GateMode,
    pub candidate_version_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub recommendation: Recommendation,
    pub reasons: Vec<String>,
    pub promoted: bool,
}

/// Swaps the process-wide active version pointer. Implemented by the store
/// layer; a single-writer, multi-reader atomic swap per §5 "Active
/// pointers".
pub trait ActiveVersionPointer {
    fn swap_active(&mut self, asset: &str, version_id: &str);
}

fn max_override_intensity_threshold(scenario: Scenario) -> f64 {
    if scenario == Scenario::Tail {
        MAX_OVERRIDE_INTENSITY_TAIL
    } else {
        MAX_OVERRIDE_INTENSITY_BASE_RISK
    }
}

/// Evaluate the gates without applying any version swap.
pub fn evaluate(inputs: &GateInputs) -> GateResult {
    let mut reasons = Vec::new();

    let any_horizon_improved = inputs
        .report
        .per_horizon_delta_hit_rate_pp
        .values()
        .any(|v| *v >= MIN_DELTA_HIT_RATE_PP);
    if !any_horizon_improved {
        reasons.push(format!(
            "no horizon improved hit rate by >= {:.1}pp",
            MIN_DELTA_HIT_RATE_PP
        ));
    }

    let no_degradation = inputs
        .report
        .per_horizon_delta_hit_rate_pp
        .values()
        .all(|v| *v >= MAX_DEGRADATION_PP);
    if !no_degradation {
        reasons.push(format!("a horizon degraded by more than {:.1}pp", MAX_DEGRADATION_PP.abs()));
    }

    let flip_ok = inputs.report.flip_rate_per_year <= MAX_FLIP_RATE_PER_YEAR;
    if !flip_ok {
        reasons.push(format!(
            "flip rate {:.2}/yr exceeds {:.1}/yr",
            inputs.report.flip_rate_per_year, MAX_FLIP_RATE_PER_YEAR
        ));
    }

    let intensity_threshold = max_override_intensity_threshold(inputs.dominant_scenario);
    let intensity_ok = inputs.report.max_override_intensity <= intensity_threshold;
    if !intensity_ok {
        reasons.push(format!(
            "max override intensity {:.2} exceeds {:.2} for {:?}",
            inputs.report.max_override_intensity, intensity_threshold, inputs.dominant_scenario
        ));
    }

    let freshness_ok = inputs.days_since_last_calibration <= MAX_DATA_FRESHNESS_DAYS;
    if !freshness_ok {
        reasons.push(format!(
            "data freshness {} days exceeds {} day limit",
            inputs.days_since_last_calibration, MAX_DATA_FRESHNESS_DAYS
        ));
    }

    let fallback_ok = inputs.router_fallback_count == 0;
    if !fallback_ok {
        reasons.push(format!("{} router fallbacks occurred during evaluation", inputs.router_fallback_count));
    }

    let nan_free = !inputs.report.nan_detected;
    if !nan_free {
        reasons.push("simulation report contains NaN/non-finite values".to_string());
    }

    let performance_gates_pass = any_horizon_improved && no_degradation && flip_ok && intensity_ok;
    let integrity_gates_pass = freshness_ok && fallback_ok && nan_free;

    let recommendation = if performance_gates_pass && integrity_gates_pass {
        Recommendation::Promote
    } else if !integrity_gates_pass {
        Recommendation::Reject
    } else {
        Recommendation::Review
    };

    GateResult {
        recommendation,
        reasons,
        promoted: false,
    }
}

/// Evaluate the gates and, in `GateMode::On`, apply the atomic swap when the
/// recommendation is `Promote`.
pub fn evaluate_and_apply(inputs: &GateInputs, store: &mut dyn ActiveVersionPointer, asset: &str) -> GateResult {
    let mut result = evaluate(inputs);
    if inputs.mode == GateMode::On && result.recommendation == Recommendation::Promote {
        store.swap_active(asset, &inputs.candidate_version_id);
        result.promoted = true;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct FakeStore {
        pub active: BTreeMap<String, String>,
    }

    impl ActiveVersionPointer for FakeStore {
        fn swap_active(&mut self, asset: &str, version_id: &str) {
            self.active.insert(asset.to_string(), version_id.to_string());
        }
    }

    fn passing_report() -> SimulationReport {
        let mut deltas = BTreeMap::new();
        deltas.insert("30D".to_string(), 3.0);
        deltas.insert("90D".to_string(), 2.5);
        SimulationReport {
            per_horizon_delta_hit_rate_pp: deltas,
            flip_rate_per_year: 2.0,
            avg_override_intensity: 0.1,
            max_override_intensity: 0.2,
            stability_score: 0.9,
            max_drawdown: 0.1,
            sharpe_proxy: 1.0,
            nan_detected: false,
            samples_evaluated: 100,
        }
    }

    fn inputs(report: &SimulationReport, mode: GateMode) -> GateInputs<'_> {
        GateInputs {
            report,
            dominant_scenario: Scenario::Base,
            days_since_last_calibration: 1,
            router_fallback_count: 0,
            mode,
            candidate_version_id: "calib-v2".to_string(),
        }
    }

    #[test]
    fn all_gates_passing_yields_promote() {
        let report = passing_report();
        let result = evaluate(&inputs(&report, GateMode::Evaluate));
        assert_eq!(result.recommendation, Recommendation::Promote);
    }

    #[test]
    fn no_horizon_improvement_is_not_promoted() {
        let mut report = passing_report();
        report.per_horizon_delta_hit_rate_pp.insert("30D".to_string(), 0.5);
        report.per_horizon_delta_hit_rate_pp.insert("90D".to_string(), 0.3);
        let result = evaluate(&inputs(&report, GateMode::Evaluate));
        assert_ne!(result.recommendation, Recommendation::Promote);
    }

    #[test]
    fn stale_calibration_is_rejected_not_reviewed() {
        let report = passing_report();
        let mut gate_inputs = inputs(&report, GateMode::Evaluate);
        gate_inputs.days_since_last_calibration = 30;
        let result = evaluate(&gate_inputs);
        assert_eq!(result.recommendation, Recommendation::Reject);
    }

    #[test]
    fn tail_scenario_uses_looser_intensity_threshold() {
        let mut report = passing_report();
        report.max_override_intensity = 0.45;
        let mut tail_inputs = inputs(&report, GateMode::Evaluate);
        tail_inputs.dominant_scenario = Scenario::Tail;
        let tail_result = evaluate(&tail_inputs);
        assert_eq!(tail_result.recommendation, Recommendation::Promote);

        let mut base_inputs_ = inputs(&report, GateMode::Evaluate);
        base_inputs_.dominant_scenario = Scenario::Base;
        let base_result = evaluate(&base_inputs_);
        assert_ne!(base_result.recommendation, Recommendation::Promote);
    }

    #[test]
    fn on_mode_promote_swaps_active_version() {
        let report = passing_report();
        let mut store = FakeStore { active: BTreeMap::new() };
        let result = evaluate_and_apply(&inputs(&report, GateMode::On), &mut store, "SPX");
        assert!(result.promoted);
        assert_eq!(store.active["SPX"], "calib-v2");
    }

    #[test]
    fn on_mode_reject_does_not_swap_active_version() {
        let mut report = passing_report();
        report.nan_detected = true;
        let mut store = FakeStore { active: BTreeMap::new() };
        let result = evaluate_and_apply(&inputs(&report, GateMode::On), &mut store, "SPX");
        assert!(!result.promoted);
        assert!(store.active.is_empty());
    }
}
