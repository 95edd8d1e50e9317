//! Markov Regime Engine (§4.7).
//!
//! Five discrete macro regimes with a default row-stochastic 5x5 transition
//! matrix (diagonal dominance per `MacroRegime::default_persistence`).
//! Bayesian posterior update against regime-specific score expectations,
//! hysteresis over a 30-day window, and transition hints.

use regime_core::types::{Date, MacroRegime, MacroRegimeState};
use statrs::distribution::{Continuous, Normal};

/// Row-stochastic 5x5 transition matrix indexed by `MacroRegime::index()`.
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    rows: [[f64; 5]; 5],
}

impl TransitionMatrix {
    /// Default matrix: diagonal set to each regime's `default_persistence`,
    /// remaining probability mass spread evenly over the other four regimes.
    pub fn default_matrix() -> Self {
        let mut rows = [[0.0; 5]; 5];
        for (i, regime) in MacroRegime::ALL.iter().enumerate() {
            let diag = regime.default_persistence();
            let off = (1.0 - diag) / 4.0;
            for j in 0..5 {
                rows[i][j] = if i == j { diag } else { off };
            }
        }
        Self { rows }
    }

    pub fn row(&self, regime: MacroRegime) -> [f64; 5] {
        self.rows[regime.index()]
    }

    pub fn persistence(&self, regime: MacroRegime) -> f64 {
        self.rows[regime.index()][regime.index()]
    }
}

/// (mu, sigma) of the average macro score under each regime's Gaussian
/// emission model. Easing/Tightening are the clearly directional regimes;
/// Stress and NeutralMixed have the widest spread since a single scalar
/// score cannot disambiguate them cleanly from Neutral.
fn emission_params(regime: MacroRegime) -> (f64, f64) {
    match regime {
        MacroRegime::Easing => (-0.55, 0.30),
        MacroRegime::Tightening => (0.55, 0.30),
        MacroRegime::Stress => (-0.10, 0.55),
        MacroRegime::Neutral => (0.0, 0.22),
        MacroRegime::NeutralMixed => (0.0, 0.45),
    }
}

fn likelihood(regime: MacroRegime, avg_score: f64) -> f64 {
    let (mu, sigma) = emission_params(regime);
    Normal::new(mu, sigma)
        .map(|n| n.pdf(avg_score))
        .unwrap_or(1e-9)
        .max(1e-9)
}

fn normalize(v: &mut [f64; 5]) {
    let sum: f64 = v.iter().sum();
    if sum > 1e-12 {
        for x in v.iter_mut() {
            *x /= sum;
        }
    } else {
        for x in v.iter_mut() {
            *x = 0.2;
        }
    }
}

/// Count dominant-regime flips in the trailing window, including the
/// transition into `new_dominant` if it differs from the last recorded
/// dominant.
fn count_flips(recent_dominants: &[MacroRegime], new_dominant: MacroRegime) -> u32 {
    let mut flips = 0u32;
    for pair in recent_dominants.windows(2) {
        if pair[0] != pair[1] {
            flips += 1;
        }
    }
    if let Some(last) = recent_dominants.last() {
        if *last != new_dominant {
            flips += 1;
        }
    }
    flips
}

/// Run one Bayesian update step.
///
/// `previous` is the regime state as of the prior observation date for this
/// asset, or `None` on cold start (uniform prior). `recent_dominants` is the
/// ordered (oldest-first) sequence of dominant regimes over the trailing
/// 30-day window, not including `previous.dominant`'s own day twice.
pub fn update(
    matrix: &TransitionMatrix,
    previous: Option<&MacroRegimeState>,
    recent_dominants: &[MacroRegime],
    avg_score: f64,
    asset: &str,
    date: Date,
) -> MacroRegimeState {
    let mut prior = [0.2_f64; 5];
    if let Some(prev) = previous {
        prior = prev.posterior;
        let dominant_idx = prev.dominant.index();
        prior[dominant_idx] = matrix.persistence(prev.dominant);
        normalize(&mut prior);
    }

    let mut posterior = [0.0_f64; 5];
    for (i, regime) in MacroRegime::ALL.iter().enumerate() {
        posterior[i] = prior[i] * likelihood(*regime, avg_score);
    }
    normalize(&mut posterior);

    let dominant_idx = posterior
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(3);
    let dominant = MacroRegime::ALL[dominant_idx];

    let persistence = posterior[dominant_idx];

    let row = matrix.row(dominant);
    let transition_hint = if persistence < 0.5 {
        row.iter()
            .enumerate()
            .filter(|(i, _)| *i != dominant_idx)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .filter(|(_, p)| **p > 0.1)
            .map(|(i, _)| MacroRegime::ALL[i])
    } else {
        None
    };

    let days_in_state = match previous {
        Some(prev) if prev.dominant == dominant => prev.days_in_state + 1,
        _ => 1,
    };

    let flips_30d = count_flips(recent_dominants, dominant);
    let stability = (1.0 - flips_30d as f64 / 5.0).max(0.0);

    MacroRegimeState {
        asset: asset.to_string(),
        date,
        dominant,
        posterior,
        persistence,
        transition_hint,
        days_in_state,
        flips_30d,
        stability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matrix_rows_sum_to_one() {
        let m = TransitionMatrix::default_matrix();
        for regime in MacroRegime::ALL {
            let row = m.row(regime);
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn posterior_sums_to_one() {
        let m = TransitionMatrix::default_matrix();
        let date = Date::from_ymd_opt(2024, 6, 1).unwrap();
        let state = update(&m, None, &[], 0.6, "SPX", date);
        let sum: f64 = state.posterior.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn strongly_dovish_score_favors_easing() {
        let m = TransitionMatrix::default_matrix();
        let date = Date::from_ymd_opt(2024, 6, 1).unwrap();
        let state = update(&m, None, &[], -0.9, "SPX", date);
        assert_eq!(state.dominant, MacroRegime::Easing);
    }

    #[test]
    fn strongly_hawkish_score_favors_tightening() {
        let m = TransitionMatrix::default_matrix();
        let date = Date::from_ymd_opt(2024, 6, 1).unwrap();
        let state = update(&m, None, &[], 0.9, "SPX", date);
        assert_eq!(state.dominant, MacroRegime::Tightening);
    }

    #[test]
    fn days_in_state_increments_while_dominant_unchanged() {
        let m = TransitionMatrix::default_matrix();
        let d1 = Date::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = Date::from_ymd_opt(2024, 6, 2).unwrap();
        let first = update(&m, None, &[], 0.9, "SPX", d1);
        let second = update(&m, Some(&first), &[first.dominant], 0.85, "SPX", d2);
        assert_eq!(second.dominant, first.dominant);
        assert_eq!(second.days_in_state, 2);
    }

    #[test]
    fn days_in_state_resets_on_regime_change() {
        let m = TransitionMatrix::default_matrix();
        let d1 = Date::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = Date::from_ymd_opt(2024, 6, 2).unwrap();
        let first = update(&m, None, &[], 0.9, "SPX", d1);
        let second = update(&m, Some(&first), &[first.dominant], -0.9, "SPX", d2);
        assert_ne!(second.dominant, first.dominant);
        assert_eq!(second.days_in_state, 1);
    }

    #[test]
    fn flips_reduce_stability() {
        let flips = count_flips(
            &[
                MacroRegime::Neutral,
                MacroRegime::Easing,
                MacroRegime::Neutral,
                MacroRegime::Easing,
            ],
            MacroRegime::Neutral,
        );
        assert_eq!(flips, 4);
        let stability = (1.0 - flips as f64 / 5.0).max(0.0);
        assert!(stability < 1.0);
    }

    #[test]
    fn transition_hint_absent_when_persistence_is_high() {
        let m = TransitionMatrix::default_matrix();
        let date = Date::from_ymd_opt(2024, 6, 1).unwrap();
        // Strong, unambiguous dovish score -> high posterior on Easing.
        let state = update(&m, None, &[], -1.2, "SPX", date);
        assert!(state.persistence >= 0.5);
        assert!(state.transition_hint.is_none());
    }
}
