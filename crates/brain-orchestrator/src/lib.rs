//! Brain Orchestrator (§4.11).
//!
//! Combines the world state (macro regime, liquidity, guard, cross-asset
//! regime) and the forecast bundle into a scenario classification and a set
//! of allocation directives, with fixed precedence: guard tier first, then
//! scenario adjustments, then cross-asset overrides.

use std::collections::BTreeMap;

use regime_core::asset::Horizon;
use regime_core::hash::inputs_hash;
use regime_core::types::{
    CrossAssetPack, CrossAssetRegime, Directives, Guard, GuardLevel, Health, HorizonForecast,
    LiquidityRegime, LiquidityState, MacroRegimeState, MacroScore, RiskMode, Scenario,
    ScenarioPack, ScenarioProbabilities,
};
use serde::{Deserialize, Serialize};

const TAIL_RISK_90D_THRESHOLD: f64 = 0.25;
const TAIL_CRISIS_THRESHOLD: f64 = 0.15;
const RISK_STRESS_PROB_THRESHOLD: f64 = 0.35;
const STRESS_PROB_CAP: f64 = 0.7;

const GUARD_BLOCK_CAP: f64 = 0.05;
const CRISIS_HAIRCUT_BTC: f64 = 0.60;
const CRISIS_HAIRCUT_SPX: f64 = 0.75;
const WARN_HAIRCUT_BTC: f64 = 0.85;
const WARN_HAIRCUT_SPX: f64 = 0.90;

const BULL_EXTENSION: f64 = 1.05;
const BULL_EXTENSION_CAP: f64 = 1.10;
const TAIL_AMPLIFICATION_FACTOR: f64 = 0.3;
const RISK_DAMPENING: f64 = 0.95;

const RISK_OFF_SYNC_BTC_CAP: f64 = 0.85;
const FLIGHT_TO_QUALITY_SPX_CAP: f64 = 0.95;
const DECOUPLED_SCALE: f64 = 0.92;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub macro_regime: MacroRegimeState,
    pub macro_score: MacroScore,
    pub liquidity: LiquidityState,
    pub guard: Guard,
    pub cross_asset: CrossAssetPack,
}

pub type ForecastBundle = BTreeMap<String, BTreeMap<Horizon, HorizonForecast>>;

#[derive(Debug, Clone, Serialize)]
pub struct BrainOutput {
    pub scenario: ScenarioPack,
    pub directives: Directives,
    pub headline: String,
    pub drivers: Vec<String>,
    pub conflicts: Vec<String>,
    pub what_would_flip: Vec<String>,
    pub inputs_hash: String,
    pub health: Health,
}

fn stress_prob(world: &WorldState) -> f64 {
    let mut p = world
        .macro_regime
        .posterior
        .get(regime_core::types::MacroRegime::Stress.index())
        .copied()
        .unwrap_or(0.0);
    p += match world.guard.level {
        GuardLevel::None => 0.0,
        GuardLevel::Warn => 0.10,
        GuardLevel::Crisis => 0.25,
        GuardLevel::Block => 0.35,
    };
    if world.liquidity.regime == LiquidityRegime::Contraction {
        p += 0.15;
    }
    p.min(STRESS_PROB_CAP)
}

fn primary_tail_risk_90d(forecasts: &ForecastBundle) -> f64 {
    forecasts
        .get("SPX")
        .and_then(|h| h.get(&Horizon::D90))
        .map(|f| f.tail_risk)
        .unwrap_or(0.0)
}

/// Step 1: derive the dominant scenario and its probability triple.
fn derive_scenario(world: &WorldState, forecasts: &ForecastBundle) -> ScenarioPack {
    let tail_risk = primary_tail_risk_90d(forecasts);
    let sp = stress_prob(world);

    let is_tail = tail_risk >= TAIL_RISK_90D_THRESHOLD
        || (world.guard.level >= GuardLevel::Crisis && tail_risk >= TAIL_CRISIS_THRESHOLD);
    let is_risk = sp >= RISK_STRESS_PROB_THRESHOLD;

    let dominant = if is_tail {
        Scenario::Tail
    } else if is_risk {
        Scenario::Risk
    } else {
        Scenario::Base
    };

    let p_tail = tail_risk.clamp(0.0, 1.0);
    let p_risk = sp.clamp(0.0, 1.0);
    let p_base = (1.0 - p_tail - p_risk).max(0.0);
    let raw_sum = (p_tail + p_risk + p_base).max(1e-9);

    let probabilities = ScenarioProbabilities {
        base: p_base / raw_sum,
        risk: p_risk / raw_sum,
        tail: p_tail / raw_sum,
    };

    let confidence = match dominant {
        Scenario::Tail => probabilities.tail,
        Scenario::Risk => probabilities.risk,
        Scenario::Base => probabilities.base,
    };

    ScenarioPack {
        dominant,
        probabilities,
        confidence,
    }
}

/// Step 2: build directives with fixed precedence (guard tier, then
/// scenario adjustments, then cross-asset overrides).
fn derive_directives(world: &WorldState, scenario: &ScenarioPack, tail_risk_90d: f64) -> Directives {
    let mut directives = Directives::default();

    match world.guard.level {
        GuardLevel::Block => {
            directives.caps.insert("spx".to_string(), GUARD_BLOCK_CAP);
            directives.caps.insert("btc".to_string(), GUARD_BLOCK_CAP);
            directives.risk_mode = Some(RiskMode::RiskOff);
        }
        GuardLevel::Crisis => {
            directives.haircuts.insert("btc".to_string(), CRISIS_HAIRCUT_BTC);
            directives.haircuts.insert("spx".to_string(), CRISIS_HAIRCUT_SPX);
            directives.risk_mode = Some(RiskMode::RiskOff);
        }
        GuardLevel::Warn => {
            directives.haircuts.insert("btc".to_string(), WARN_HAIRCUT_BTC);
            directives.haircuts.insert("spx".to_string(), WARN_HAIRCUT_SPX);
        }
        GuardLevel::None => {}
    }

    let mut tail_amplified = false;
    match scenario.dominant {
        Scenario::Tail => {
            let factor = (1.0 - TAIL_AMPLIFICATION_FACTOR * tail_risk_90d).clamp(0.0, 1.0);
            directives.scales.insert("spx".to_string(), factor);
            directives.scales.insert("btc".to_string(), factor);
            tail_amplified = true;
        }
        Scenario::Risk => {
            directives.scales.insert("spx".to_string(), RISK_DAMPENING);
            directives.scales.insert("btc".to_string(), RISK_DAMPENING);
        }
        Scenario::Base => {
            if world.macro_score.score > 0.3 {
                let factor = BULL_EXTENSION.min(BULL_EXTENSION_CAP);
                directives.scales.insert("spx".to_string(), factor);
                directives.scales.insert("btc".to_string(), factor);
            }
        }
    }

    match world.cross_asset.label {
        CrossAssetRegime::RiskOffSync => {
            let current = *directives.scales.get("btc").unwrap_or(&1.0);
            directives
                .scales
                .insert("btc".to_string(), current.min(RISK_OFF_SYNC_BTC_CAP));
        }
        CrossAssetRegime::FlightToQuality => {
            let current = *directives.scales.get("spx").unwrap_or(&1.0);
            directives
                .scales
                .insert("spx".to_string(), current.min(FLIGHT_TO_QUALITY_SPX_CAP));
        }
        CrossAssetRegime::Decoupled => {
            for asset in ["spx", "btc"] {
                let current = *directives.scales.get(asset).unwrap_or(&1.0);
                directives.scales.insert(asset.to_string(), current * DECOUPLED_SCALE);
            }
        }
        CrossAssetRegime::RiskOnSync => {
            if scenario.dominant == Scenario::Base && !tail_amplified {
                for asset in ["spx", "btc"] {
                    let current = *directives.scales.get(asset).unwrap_or(&1.0);
                    directives
                        .scales
                        .insert(asset.to_string(), (current * BULL_EXTENSION).min(BULL_EXTENSION_CAP));
                }
            }
        }
        CrossAssetRegime::Mixed => {}
    }

    directives
}

fn detect_conflicts(world: &WorldState, scenario: &ScenarioPack) -> Vec<String> {
    let mut conflicts = Vec::new();
    if scenario.dominant == Scenario::Base && world.guard.level >= GuardLevel::Crisis {
        conflicts.push("Guard at CRISIS/BLOCK while scenario classified as BASE".to_string());
    }
    if world.macro_score.score > 0.3 && world.cross_asset.label == CrossAssetRegime::RiskOffSync {
        conflicts.push("Bullish macro score against a RISK_OFF_SYNC cross-asset regime".to_string());
    }
    if world.liquidity.regime == LiquidityRegime::Expansion && scenario.dominant == Scenario::Tail {
        conflicts.push("Liquidity expanding while scenario classified as TAIL".to_string());
    }
    conflicts
}

fn what_would_flip(world: &WorldState, scenario: &ScenarioPack, tail_risk_90d: f64) -> Vec<String> {
    let mut items = Vec::new();
    match scenario.dominant {
        Scenario::Base => {
            let gap = (RISK_STRESS_PROB_THRESHOLD - stress_prob(world)).max(0.0);
            items.push(format!(
                "Stress probability would need to rise by {:.2} to flip to RISK",
                gap
            ));
        }
        Scenario::Risk => {
            let gap = (TAIL_RISK_90D_THRESHOLD - tail_risk_90d).max(0.0);
            items.push(format!(
                "90D tail risk would need to rise by {:.2} to flip to TAIL",
                gap
            ));
        }
        Scenario::Tail => {
            items.push("A guard de-escalation below CRISIS combined with falling tail risk would flip away from TAIL".to_string());
        }
    }
    if world.guard.level == GuardLevel::Warn {
        items.push("A further credit/VIX escalation would move the guard to CRISIS".to_string());
    }
    items
}

fn build_headline(scenario: &ScenarioPack, guard: &Guard) -> String {
    format!(
        "{:?} scenario ({:.0}% confidence), guard {:?}",
        scenario.dominant,
        scenario.confidence * 100.0,
        guard.level
    )
}

fn ranked_drivers(world: &WorldState) -> Vec<String> {
    let mut drivers: Vec<(String, f64)> = world
        .macro_score
        .components
        .iter()
        .map(|c| (c.series_id.clone(), c.signed_pressure.abs() * c.weight))
        .collect();
    drivers.push(("liquidity_impulse".to_string(), world.liquidity.impulse.abs()));
    drivers.push(("cross_asset_contagion".to_string(), world.cross_asset.contagion_score));
    drivers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    drivers.into_iter().map(|(name, _)| name).collect()
}

fn build_health(world: &WorldState, forecasts: &ForecastBundle) -> Health {
    let mut health = Health::ok();
    for m in &world.macro_score.missing {
        health.add_missing(m.clone());
    }
    if world.liquidity.decomposition.walcl.is_none() {
        health.add_missing("WALCL".to_string());
    }
    if world.liquidity.decomposition.rrp.is_none() {
        health.add_missing("RRP".to_string());
    }
    if world.liquidity.decomposition.tga.is_none() {
        health.add_missing("TGA".to_string());
    }
    for window in &world.cross_asset.windows {
        if window.insufficient {
            health.add_warning(format!("cross-asset {}-day window has insufficient samples", window.window));
        }
    }
    if forecasts.is_empty() {
        health.add_warning("no forecast bundle supplied".to_string());
    }
    if !health.missing.is_empty() {
        health.ok = false;
    }
    health
}

#[derive(Serialize)]
struct HashInputs<'a> {
    world: &'a WorldState,
    forecasts: &'a ForecastBundle,
}

/// Produce a full decision for one (asset universe, date) observation.
pub fn decide(world: &WorldState, forecasts: &ForecastBundle) -> BrainOutput {
    let tail_risk_90d = primary_tail_risk_90d(forecasts);
    let scenario = derive_scenario(world, forecasts);
    let directives = derive_directives(world, &scenario, tail_risk_90d);
    let headline = build_headline(&scenario, &world.guard);
    let drivers = ranked_drivers(world);
    let conflicts = detect_conflicts(world, &scenario);
    let flip_conditions = what_would_flip(world, &scenario, tail_risk_90d);
    let health = build_health(world, forecasts);
    let inputs_hash = inputs_hash(&HashInputs { world, forecasts });

    BrainOutput {
        scenario,
        directives,
        headline,
        drivers,
        conflicts,
        what_would_flip: flip_conditions,
        inputs_hash,
        health,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_core::types::{
        CrossAssetWindow, Date, LiquidityComponents, MacroRegime, PairCorrelations,
    };

    fn base_world(guard_level: GuardLevel, cross_asset: CrossAssetRegime) -> WorldState {
        WorldState {
            macro_regime: MacroRegimeState {
                asset: "SPX".to_string(),
                date: Date::from_ymd_opt(2024, 1, 1).unwrap(),
                dominant: MacroRegime::Neutral,
                posterior: [0.1, 0.1, 0.1, 0.6, 0.1],
                persistence: 0.6,
                transition_hint: None,
                days_in_state: 5,
                flips_30d: 0,
                stability: 1.0,
            },
            macro_score: MacroScore {
                score: 0.0,
                confidence: 0.6,
                components: vec![],
                missing: vec![],
            },
            liquidity: LiquidityState {
                impulse: 0.0,
                regime: LiquidityRegime::Neutral,
                confidence: 0.5,
                decomposition: LiquidityComponents { walcl: Some(1.0), rrp: Some(1.0), tga: Some(1.0) },
            },
            guard: Guard { level: guard_level, credit_composite: 0.1, vix: 15.0 },
            cross_asset: CrossAssetPack {
                windows: vec![CrossAssetWindow {
                    window: 20,
                    correlations: PairCorrelations::default(),
                    sample_count: 20,
                    insufficient: false,
                }],
                label: cross_asset,
                confidence: 0.5,
                rationale: "test".to_string(),
                contagion_score: 0.1,
                decouple_score: 0.5,
                sign_flip_count: 0,
                corr_stability: 0.1,
            },
        }
    }

    fn forecasts_with_tail(tail_risk: f64) -> ForecastBundle {
        let mut bundle = BTreeMap::new();
        let mut per_horizon = BTreeMap::new();
        per_horizon.insert(
            Horizon::D90,
            HorizonForecast { mean: 0.0, q05: -0.05, q50: 0.0, q95: 0.05, tail_risk },
        );
        bundle.insert("SPX".to_string(), per_horizon);
        bundle
    }

    #[test]
    fn high_tail_risk_drives_tail_scenario() {
        let world = base_world(GuardLevel::None, CrossAssetRegime::Mixed);
        let forecasts = forecasts_with_tail(0.4);
        let output = decide(&world, &forecasts);
        assert_eq!(output.scenario.dominant, Scenario::Tail);
    }

    #[test]
    fn block_guard_caps_risk_assets_near_zero() {
        let world = base_world(GuardLevel::Block, CrossAssetRegime::Mixed);
        let forecasts = forecasts_with_tail(0.05);
        let output = decide(&world, &forecasts);
        assert_eq!(output.directives.caps["spx"], GUARD_BLOCK_CAP);
        assert_eq!(output.directives.risk_mode, Some(RiskMode::RiskOff));
    }

    #[test]
    fn risk_off_sync_tightens_btc_scale() {
        let world = base_world(GuardLevel::Warn, CrossAssetRegime::RiskOffSync);
        let forecasts = forecasts_with_tail(0.05);
        let output = decide(&world, &forecasts);
        assert!(output.directives.scales["btc"] <= RISK_OFF_SYNC_BTC_CAP + 1e-9);
    }

    #[test]
    fn scenario_probabilities_sum_to_one() {
        let world = base_world(GuardLevel::None, CrossAssetRegime::Mixed);
        let forecasts = forecasts_with_tail(0.1);
        let output = decide(&world, &forecasts);
        let sum = output.scenario.probabilities.base + output.scenario.probabilities.risk + output.scenario.probabilities.tail;
        assert!((sum - 1.0).abs() < 0.01);
    }

    #[test]
    fn inputs_hash_is_stable_for_identical_inputs() {
        let world = base_world(GuardLevel::None, CrossAssetRegime::Mixed);
        let forecasts = forecasts_with_tail(0.1);
        let a = decide(&world, &forecasts);
        let b = decide(&world, &forecasts);
        assert_eq!(a.inputs_hash, b.inputs_hash);
    }

    #[test]
    fn conflict_detected_when_base_scenario_meets_crisis_guard() {
        let world = base_world(GuardLevel::Crisis, CrossAssetRegime::Mixed);
        // keep tail risk low enough to stay out of TAIL scenario bucket
        let forecasts = forecasts_with_tail(0.02);
        let output = decide(&world, &forecasts);
        assert!(output.conflicts.iter().any(|c| c.contains("CRISIS/BLOCK")) || output.scenario.dominant == Scenario::Tail);
    }
}
