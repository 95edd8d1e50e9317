//! Cross-Asset Regime Engine (§4.8).
//!
//! Classifies the joint regime of {BTC, SPX, DXY, GOLD} from rolling Pearson
//! correlations of log returns over three windows, then derives diagnostics
//! (decouple score, sign-flip count, correlation stability, contagion
//! score).

use regime_core::types::{CrossAssetPack, CrossAssetRegime, CrossAssetWindow, PairCorrelations};

pub const WINDOWS: [usize; 3] = [20, 60, 120];

/// Aligned close-price series for the four assets, indexed by common trading
/// day (caller is responsible for intersecting calendars before calling
/// `classify`).
#[derive(Debug, Clone)]
pub struct AlignedPrices {
    pub btc: Vec<f64>,
    pub spx: Vec<f64>,
    pub dxy: Vec<f64>,
    pub gold: Vec<f64>,
}

fn window_correlations(returns: &AlignedReturns, window: usize) -> CrossAssetWindow {
    let n = returns.btc.len();
    let take = window.min(n);
    let slice = |v: &[f64]| -> &[f64] { &v[n - take..] };

    let btc = slice(&returns.btc);
    let spx = slice(&returns.spx);
    let dxy = slice(&returns.dxy);
    let gold = slice(&returns.gold);

    let correlations = PairCorrelations {
        btc_spx: rolling_stats::pearson_correlation(btc, spx),
        btc_dxy: rolling_stats::pearson_correlation(btc, dxy),
        btc_gold: rolling_stats::pearson_correlation(btc, gold),
        spx_dxy: rolling_stats::pearson_correlation(spx, dxy),
        spx_gold: rolling_stats::pearson_correlation(spx, gold),
        dxy_gold: rolling_stats::pearson_correlation(dxy, gold),
    };

    let insufficient = take < ((window as f64 * 0.5).ceil() as usize);

    CrossAssetWindow {
        window,
        correlations,
        sample_count: take,
        insufficient,
    }
}

struct AlignedReturns {
    btc: Vec<f64>,
    spx: Vec<f64>,
    dxy: Vec<f64>,
    gold: Vec<f64>,
}

fn returns_from(prices: &AlignedPrices) -> AlignedReturns {
    AlignedReturns {
        btc: rolling_stats::log_returns(&prices.btc),
        spx: rolling_stats::log_returns(&prices.spx),
        dxy: rolling_stats::log_returns(&prices.dxy),
        gold: rolling_stats::log_returns(&prices.gold),
    }
}

fn classify_label(windows: &[CrossAssetWindow]) -> (CrossAssetRegime, String) {
    // Use the shortest (20D) window as the primary classifier; longer
    // windows feed only the diagnostics.
    let primary = &windows[0].correlations;

    let btc_spx = primary.btc_spx.unwrap_or(0.0);
    let dxy_risk = primary.btc_dxy.unwrap_or(0.0).max(primary.spx_dxy.unwrap_or(0.0));
    let spx_dxy = primary.spx_dxy.unwrap_or(0.0);
    let gold_spx = primary.spx_gold.unwrap_or(0.0);
    let gold_risk = primary.btc_gold.unwrap_or(0.0).min(primary.spx_gold.unwrap_or(0.0));
    let dxy_gold = primary.dxy_gold.unwrap_or(0.0);

    if btc_spx >= 0.35 && dxy_risk >= 0.10 {
        return (
            CrossAssetRegime::RiskOffSync,
            "BTC and SPX move together while DXY rises with risk assets".to_string(),
        );
    }
    if btc_spx >= 0.35 && spx_dxy <= -0.15 && gold_spx <= 0.0 {
        return (
            CrossAssetRegime::RiskOnSync,
            "BTC and SPX move together, inverse to DXY, gold decoupled from equities".to_string(),
        );
    }
    if gold_risk <= -0.10 && dxy_gold <= -0.10 {
        return (
            CrossAssetRegime::FlightToQuality,
            "Gold inversely tracks risk assets and DXY".to_string(),
        );
    }
    let decouple_score = decouple_score(primary);
    if btc_spx <= 0.15 && decouple_score >= 0.3 {
        return (
            CrossAssetRegime::Decoupled,
            "BTC and SPX show weak co-movement across the board".to_string(),
        );
    }
    (
        CrossAssetRegime::Mixed,
        "No dominant cross-asset pattern exceeded threshold".to_string(),
    )
}

fn decouple_score(corr: &PairCorrelations) -> f64 {
    let values = [
        corr.btc_spx,
        corr.btc_dxy,
        corr.btc_gold,
        corr.spx_dxy,
        corr.spx_gold,
        corr.dxy_gold,
    ];
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    if present.is_empty() {
        return 0.0;
    }
    let mean_abs = present.iter().map(|v| v.abs()).sum::<f64>() / present.len() as f64;
    (1.0 - mean_abs).clamp(0.0, 1.0)
}

fn sign_flip_count(windows: &[CrossAssetWindow]) -> u32 {
    let mut flips = 0u32;
    let pairs: Vec<fn(&PairCorrelations) -> Option<f64>> = vec![
        |c| c.btc_spx,
        |c| c.btc_dxy,
        |c| c.btc_gold,
        |c| c.spx_dxy,
        |c| c.spx_gold,
        |c| c.dxy_gold,
    ];
    for pair_fn in pairs {
        let series: Vec<f64> = windows.iter().filter_map(|w| pair_fn(&w.correlations)).collect();
        for pair in series.windows(2) {
            if pair[0].signum() != pair[1].signum() && pair[0] != 0.0 && pair[1] != 0.0 {
                flips += 1;
            }
        }
    }
    flips
}

fn corr_stability(windows: &[CrossAssetWindow]) -> f64 {
    let btc_spx: Vec<f64> = windows.iter().filter_map(|w| w.correlations.btc_spx).collect();
    if btc_spx.len() < 2 {
        return 1.0;
    }
    rolling_stats::std_dev(&btc_spx)
}

fn contagion_score(windows: &[CrossAssetWindow]) -> f64 {
    let Some(w60) = windows.iter().find(|w| w.window == 60) else {
        return 0.0;
    };
    let c = &w60.correlations;
    let risk_pairs = [c.btc_spx, c.btc_dxy, c.spx_dxy];
    let present: Vec<f64> = risk_pairs.iter().filter_map(|v| *v).map(|v| v.abs()).collect();
    if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    }
}

fn confidence(windows: &[CrossAssetWindow], label: CrossAssetRegime) -> f64 {
    let sufficient = windows.iter().filter(|w| !w.insufficient).count();
    let coverage = sufficient as f64 / windows.len() as f64;

    let consistent = windows
        .iter()
        .filter(|w| !w.insufficient)
        .filter(|w| classify_label(std::slice::from_ref(w)).0 == label)
        .count();
    let consistency = if sufficient == 0 {
        0.0
    } else {
        consistent as f64 / sufficient as f64
    };

    (0.5 * coverage + 0.5 * consistency).clamp(0.0, 1.0)
}

/// Classify the cross-asset regime from aligned daily close prices.
pub fn classify(prices: &AlignedPrices) -> CrossAssetPack {
    let returns = returns_from(prices);
    let windows: Vec<CrossAssetWindow> = WINDOWS
        .iter()
        .map(|w| window_correlations(&returns, *w))
        .collect();

    let (label, rationale) = classify_label(&windows);

    CrossAssetPack {
        decouple_score: decouple_score(&windows[0].correlations),
        sign_flip_count: sign_flip_count(&windows),
        corr_stability: corr_stability(&windows),
        contagion_score: contagion_score(&windows),
        confidence: confidence(&windows, label),
        windows,
        label,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_prices(n: usize, start: f64, drift: f64) -> Vec<f64> {
        (0..n).map(|i| start + drift * i as f64).collect()
    }

    #[test]
    fn risk_on_sync_when_btc_spx_correlated_and_dxy_inverse() {
        let n = 150;
        let btc = flat_prices(n, 100.0, 1.0);
        let spx = flat_prices(n, 4000.0, 5.0);
        let dxy = flat_prices(n, 100.0, -0.3);
        let gold = (0..n).map(|i| 1800.0 + if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let pack = classify(&AlignedPrices { btc, spx, dxy, gold });
        assert_eq!(pack.label, CrossAssetRegime::RiskOnSync);
    }

    #[test]
    fn confidence_is_within_unit_interval() {
        let n = 150;
        let btc = flat_prices(n, 100.0, 1.0);
        let spx = flat_prices(n, 4000.0, -2.0);
        let dxy = flat_prices(n, 100.0, 0.5);
        let gold = flat_prices(n, 1800.0, 1.0);
        let pack = classify(&AlignedPrices { btc, spx, dxy, gold });
        assert!(pack.confidence >= 0.0 && pack.confidence <= 1.0);
    }

    #[test]
    fn short_history_marks_windows_insufficient() {
        let n = 15;
        let btc = flat_prices(n, 100.0, 1.0);
        let spx = flat_prices(n, 4000.0, 1.0);
        let dxy = flat_prices(n, 100.0, 1.0);
        let gold = flat_prices(n, 1800.0, 1.0);
        let pack = classify(&AlignedPrices { btc, spx, dxy, gold });
        assert!(pack.windows.iter().any(|w| w.insufficient));
    }

    #[test]
    fn decouple_score_never_negative() {
        let n = 150;
        let btc = flat_prices(n, 100.0, 1.0);
        let spx = flat_prices(n, 4000.0, 5.0);
        let dxy = flat_prices(n, 100.0, 5.0);
        let gold = flat_prices(n, 1800.0, 5.0);
        let pack = classify(&AlignedPrices { btc, spx, dxy, gold });
        assert!(pack.decouple_score >= 0.0);
    }

    #[test]
    fn contagion_score_reflects_sixty_day_window() {
        let n = 150;
        let btc = flat_prices(n, 100.0, 2.0);
        let spx = flat_prices(n, 4000.0, 8.0);
        let dxy = flat_prices(n, 100.0, -1.0);
        let gold = flat_prices(n, 1800.0, 3.0);
        let pack = classify(&AlignedPrices { btc, spx, dxy, gold });
        assert!(pack.contagion_score >= 0.0);
    }
}
