//! Allocation Policy (§4.12).
//!
//! An ordered cascade from cascade sizes through guard caps, brain
//! directives, liquidity multipliers, a confidence multiplier, and
//! conflict-pattern haircuts down to a final clamped allocation. Each step
//! is recorded in the audit trail so the cascade is fully inspectable.

use regime_core::types::{Allocation, Directives, Guard, GuardLevel, LiquidityRegime};
use serde::{Deserialize, Serialize};

const CASCADE_BASE_SPX: f64 = 0.35;
const CASCADE_BASE_BTC: f64 = 0.15;
const CASCADE_SIGNAL_SCALE: f64 = 0.25;
const DXY_SIGNAL_SCALE: f64 = 0.6;

const DEFAULT_MIN_CASH_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPattern {
    None,
    Severe,
    MacroBearish,
    LiquidityDrain,
}

impl ConflictPattern {
    /// (btc multiplier, spx multiplier). BTC is always cut at least as hard
    /// as SPX so the hierarchy invariant holds regardless of pattern.
    fn haircuts(self) -> (f64, f64) {
        match self {
            ConflictPattern::None => (1.0, 1.0),
            ConflictPattern::Severe => (0.50, 0.70),
            ConflictPattern::MacroBearish => (0.70, 0.85),
            ConflictPattern::LiquidityDrain => (0.75, 0.90),
        }
    }
}

fn liquidity_multiplier(regime: LiquidityRegime) -> f64 {
    match regime {
        LiquidityRegime::Expansion => 1.10,
        LiquidityRegime::Neutral => 1.0,
        LiquidityRegime::Contraction => 0.85,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyInputs {
    pub spx_signal: f64,
    pub btc_signal: f64,
    pub macro_signal: f64,
    pub guard: Guard,
    pub directives: Directives,
    pub liquidity_regime: LiquidityRegime,
    pub confidence: f64,
    pub conflict_pattern: ConflictPattern,
    pub min_cash_floor: f64,
}

impl PolicyInputs {
    pub fn with_defaults(spx_signal: f64, btc_signal: f64, macro_signal: f64, guard: Guard) -> Self {
        Self {
            spx_signal,
            btc_signal,
            macro_signal,
            guard,
            directives: Directives::default(),
            liquidity_regime: LiquidityRegime::Neutral,
            confidence: 0.6,
            conflict_pattern: ConflictPattern::None,
            min_cash_floor: DEFAULT_MIN_CASH_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStep {
    pub label: String,
    pub spx: f64,
    pub btc: f64,
    pub dxy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutput {
    pub allocation: Allocation,
    pub audit_trail: Vec<AuditStep>,
}

fn record(trail: &mut Vec<AuditStep>, label: &str, spx: f64, btc: f64, dxy: f64) {
    trail.push(AuditStep {
        label: label.to_string(),
        spx,
        btc,
        dxy,
    });
}

/// Run the full allocation cascade.
pub fn apply(inputs: &PolicyInputs) -> PolicyOutput {
    let mut trail = Vec::new();

    // 1. Cascade sizes.
    let mut spx = (CASCADE_BASE_SPX + CASCADE_SIGNAL_SCALE * inputs.spx_signal).clamp(0.0, 1.0);
    let mut btc = (CASCADE_BASE_BTC + CASCADE_SIGNAL_SCALE * inputs.btc_signal).clamp(0.0, 1.0);
    let mut dxy = (inputs.macro_signal.abs() * DXY_SIGNAL_SCALE).clamp(0.0, 1.0);
    record(&mut trail, "cascade_sizes", spx, btc, dxy);

    // 2. Guard caps. BLOCK zeros risk assets and short-circuits the rest of
    // the multiplicative cascade.
    if inputs.guard.level == GuardLevel::Block {
        spx = 0.0;
        btc = 0.0;
        if let Some(cap) = inputs.directives.caps.get("dxy") {
            dxy = dxy.min(*cap);
        }
        record(&mut trail, "guard_block_short_circuit", spx, btc, dxy);
        return finalize(spx, btc, dxy, inputs, &mut trail);
    }
    if let Some(cap) = inputs.directives.caps.get("spx") {
        spx = spx.min(*cap);
    }
    if let Some(cap) = inputs.directives.caps.get("btc") {
        btc = btc.min(*cap);
    }
    // Brain haircuts/scales (guard tier haircuts, scenario adjustments,
    // cross-asset overrides) apply multiplicatively here.
    if let Some(h) = inputs.directives.haircuts.get("spx") {
        spx *= h;
    }
    if let Some(h) = inputs.directives.haircuts.get("btc") {
        btc *= h;
    }
    if let Some(s) = inputs.directives.scales.get("spx") {
        spx *= s;
    }
    if let Some(s) = inputs.directives.scales.get("btc") {
        btc *= s;
    }
    record(&mut trail, "guard_caps_and_directives", spx, btc, dxy);

    // 3. Liquidity multiplier.
    let liq_mult = liquidity_multiplier(inputs.liquidity_regime);
    spx *= liq_mult;
    btc *= liq_mult;
    record(&mut trail, "liquidity_multiplier", spx, btc, dxy);

    // 4. Confidence multiplier (risk assets only).
    let confidence_mult = (0.5 + 0.5 * inputs.confidence.clamp(0.0, 1.0)).clamp(0.0, 1.0);
    spx *= confidence_mult;
    btc *= confidence_mult;
    record(&mut trail, "confidence_multiplier", spx, btc, dxy);

    // 5. Conflict-pattern hierarchy haircuts: BTC always cut >= SPX.
    let (btc_hc, spx_hc) = inputs.conflict_pattern.haircuts();
    btc *= btc_hc;
    spx *= spx_hc;
    record(&mut trail, "conflict_pattern_haircuts", spx, btc, dxy);

    finalize(spx, btc, dxy, inputs, &mut trail)
}

fn finalize(
    mut spx: f64,
    mut btc: f64,
    mut dxy: f64,
    inputs: &PolicyInputs,
    trail: &mut Vec<AuditStep>,
) -> PolicyOutput {
    // 6. Clamp to [0,1] and re-apply guard caps to preserve monotonicity.
    spx = spx.clamp(0.0, 1.0);
    btc = btc.clamp(0.0, 1.0);
    dxy = dxy.clamp(0.0, 1.0);
    if let Some(cap) = inputs.directives.caps.get("spx") {
        spx = spx.min(*cap);
    }
    if let Some(cap) = inputs.directives.caps.get("btc") {
        btc = btc.min(*cap);
    }
    record(trail, "clamp_and_reclamp", spx, btc, dxy);

    // 7. Cash fills the remainder, floored at minCashFloor.
    let cash = (1.0 - (spx + btc + dxy) / 3.0).clamp(inputs.min_cash_floor, 1.0);
    record(trail, "cash_floor", spx, btc, dxy);

    PolicyOutput {
        allocation: Allocation { spx, btc, dxy, cash },
        audit_trail: trail.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_core::types::GuardLevel;

    fn guard(level: GuardLevel) -> Guard {
        Guard { level, credit_composite: 0.1, vix: 15.0 }
    }

    #[test]
    fn allocations_stay_within_unit_interval() {
        let inputs = PolicyInputs::with_defaults(0.8, 0.8, 0.5, guard(GuardLevel::None));
        let out = apply(&inputs);
        assert!(out.allocation.spx >= 0.0 && out.allocation.spx <= 1.0);
        assert!(out.allocation.btc >= 0.0 && out.allocation.btc <= 1.0);
        assert!(out.allocation.cash >= inputs.min_cash_floor);
    }

    #[test]
    fn block_guard_zeros_risk_assets() {
        let inputs = PolicyInputs::with_defaults(0.8, 0.8, 0.5, guard(GuardLevel::Block));
        let out = apply(&inputs);
        assert_eq!(out.allocation.spx, 0.0);
        assert_eq!(out.allocation.btc, 0.0);
    }

    #[test]
    fn guard_escalation_never_increases_risk_assets() {
        let none = apply(&PolicyInputs::with_defaults(0.7, 0.7, 0.3, guard(GuardLevel::None)));
        let warn = apply(&PolicyInputs::with_defaults(0.7, 0.7, 0.3, guard(GuardLevel::Warn)));
        let crisis = apply(&PolicyInputs::with_defaults(0.7, 0.7, 0.3, guard(GuardLevel::Crisis)));
        let block = apply(&PolicyInputs::with_defaults(0.7, 0.7, 0.3, guard(GuardLevel::Block)));

        assert!(warn.allocation.spx <= none.allocation.spx);
        assert!(crisis.allocation.spx <= warn.allocation.spx);
        assert!(block.allocation.spx <= crisis.allocation.spx);
        assert!(warn.allocation.btc <= none.allocation.btc);
        assert!(crisis.allocation.btc <= warn.allocation.btc);
        assert!(block.allocation.btc <= crisis.allocation.btc);
    }

    #[test]
    fn conflict_pattern_always_cuts_btc_at_least_as_hard_as_spx() {
        for pattern in [
            ConflictPattern::Severe,
            ConflictPattern::MacroBearish,
            ConflictPattern::LiquidityDrain,
        ] {
            let mut inputs = PolicyInputs::with_defaults(0.6, 0.6, 0.2, guard(GuardLevel::None));
            inputs.conflict_pattern = pattern;
            let baseline = PolicyInputs::with_defaults(0.6, 0.6, 0.2, guard(GuardLevel::None));
            let with_pattern = apply(&inputs);
            let without_pattern = apply(&baseline);
            let btc_cut = 1.0 - with_pattern.allocation.btc / without_pattern.allocation.btc.max(1e-9);
            let spx_cut = 1.0 - with_pattern.allocation.spx / without_pattern.allocation.spx.max(1e-9);
            assert!(btc_cut >= spx_cut - 1e-9);
        }
    }

    #[test]
    fn audit_trail_records_every_cascade_step() {
        let inputs = PolicyInputs::with_defaults(0.5, 0.5, 0.2, guard(GuardLevel::Warn));
        let out = apply(&inputs);
        assert!(out.audit_trail.len() >= 5);
    }

    #[test]
    fn cash_never_below_floor() {
        let inputs = PolicyInputs::with_defaults(1.0, 1.0, 1.0, guard(GuardLevel::None));
        let out = apply(&inputs);
        assert!(out.allocation.cash >= inputs.min_cash_floor);
    }
}
