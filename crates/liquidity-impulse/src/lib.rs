//! Liquidity Impulse Engine (§4.4).
//!
//! Combines WALCL/RRP/TGA z-scores into a signed impulse and classifies the
//! liquidity regime. The open question in Design Notes §9 about the exact
//! confidence-mixing rule when only two of three components are available is
//! resolved here by scaling confidence by the "x3/available" rule (see
//! DESIGN.md).

use regime_core::types::{LiquidityComponents, LiquidityRegime, LiquidityState, SeriesContext};

/// z4w with fallback to z13w, per component.
fn z_or_fallback(ctx: &SeriesContext) -> Option<f64> {
    ctx.z_4w.or(ctx.z_13w)
}

/// Compute the liquidity state from WALCL/RRP/TGA contexts.
///
/// `impulse = (+z(walcl) - z(rrp) - z(tga)) * 3 / available`, clamped to
/// `[-3, 3]`, where `available` is the count of the three components that
/// produced a z-score at all. If none are available the impulse is 0.0 with
/// confidence 0.0.
pub fn compute(walcl: &SeriesContext, rrp: &SeriesContext, tga: &SeriesContext) -> LiquidityState {
    let z_walcl = z_or_fallback(walcl);
    let z_rrp = z_or_fallback(rrp);
    let z_tga = z_or_fallback(tga);

    let available = [z_walcl, z_rrp, z_tga].iter().filter(|z| z.is_some()).count();

    let impulse = if available == 0 {
        0.0
    } else {
        let raw = z_walcl.unwrap_or(0.0) - z_rrp.unwrap_or(0.0) - z_tga.unwrap_or(0.0);
        (raw * 3.0 / available as f64).clamp(-3.0, 3.0)
    };

    let regime = if impulse > 0.75 {
        LiquidityRegime::Expansion
    } else if impulse < -0.75 {
        LiquidityRegime::Contraction
    } else {
        LiquidityRegime::Neutral
    };

    let confidence = 0.6 * (available as f64 / 3.0) + 0.4 * (impulse.abs() / 2.0).min(1.0);

    LiquidityState {
        impulse,
        regime,
        confidence,
        decomposition: LiquidityComponents {
            walcl: z_walcl,
            rrp: z_rrp,
            tga: z_tga,
        },
    }
}
