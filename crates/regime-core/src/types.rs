use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type Date = NaiveDate;

/// One observation in a `Series`. A missing point is represented by the
/// absence of a date in the sequence, never by a sentinel value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub date: Date,
    pub value: f64,
}

/// Publication/sampling frequency of a `Series`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// A finite, ordered, immutable sequence of (date, value) pairs for one
/// series id. Dates must be strictly increasing; enforced by `Series::new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub frequency: Frequency,
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Build a series, dropping any point whose date does not strictly
    /// increase over the previous one (defends the strictly-increasing
    /// invariant against out-of-order upstream data rather than panicking).
    pub fn new(id: impl Into<String>, frequency: Frequency, mut points: Vec<SeriesPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            id: id.into(),
            frequency,
            points,
        }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Points with date <= `on_or_before`, inclusive.
    pub fn up_to(&self, on_or_before: Date) -> &[SeriesPoint] {
        let idx = self.points.partition_point(|p| p.date <= on_or_before);
        &self.points[..idx]
    }

    /// Most recent value with date <= `on_or_before`, if any.
    pub fn value_at_or_before(&self, on_or_before: Date) -> Option<f64> {
        self.up_to(on_or_before).last().map(|p| p.value)
    }
}

/// Static publication-lag table, keyed by series id (§4.1).
pub fn publication_lag_days(series_id: &str) -> i64 {
    match series_id {
        // Monthly macro releases, revised with a lag.
        "CPI" | "PCE" | "NFP" | "UNRATE" => 30,
        // Weekly Fed balance-sheet data (H.4.1 release).
        "WALCL" | "RRP" | "TGA" => 7,
        // Daily market prices: published same day.
        "BTC" | "SPX" | "DXY" | "GOLD" => 0,
        _ => 0,
    }
}

/// Per-series rolling context at a reference date (§3 SeriesContext).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesContext {
    pub series_id: String,
    pub as_of: Date,
    pub current_value: Option<f64>,
    pub delta_4w: Option<f64>,
    pub delta_13w: Option<f64>,
    pub delta_26w: Option<f64>,
    pub z_4w: Option<f64>,
    pub z_13w: Option<f64>,
    pub z_26w: Option<f64>,
    pub mean_5y: Option<f64>,
    pub std_5y: Option<f64>,
    pub min_5y: Option<f64>,
    pub max_5y: Option<f64>,
}

/// Confidence qualifier as the source system represents it; normalized to a
/// single numeric scale at the boundary per the fixed mapping in Design
/// Notes §9 ({LOW: 0.3, MEDIUM: 0.6, HIGH: 0.9}).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
}

impl ConfidenceLabel {
    pub fn to_numeric(self) -> f64 {
        match self {
            ConfidenceLabel::Low => 0.3,
            ConfidenceLabel::Medium => 0.6,
            ConfidenceLabel::High => 0.9,
        }
    }

    pub fn from_numeric(v: f64) -> Self {
        if v >= 0.75 {
            ConfidenceLabel::High
        } else if v >= 0.45 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

/// A single macro series' contribution to `MacroScore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentContribution {
    pub series_id: String,
    pub weight: f64,
    pub lag_days: i64,
    pub signed_pressure: f64,
}

/// Aggregate macro score for one (asset, horizon) at a reference date (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroScore {
    pub score: f64,
    pub confidence: f64,
    pub components: Vec<ComponentContribution>,
    pub missing: Vec<String>,
}

/// Liquidity regime label (§3 LiquidityState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityRegime {
    Expansion,
    Neutral,
    Contraction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityComponents {
    pub walcl: Option<f64>,
    pub rrp: Option<f64>,
    pub tga: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityState {
    pub impulse: f64,
    pub regime: LiquidityRegime,
    pub confidence: f64,
    pub decomposition: LiquidityComponents,
}

/// Discrete macro regime (§3/§4.7 MacroRegimeState, Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacroRegime {
    Easing,
    Tightening,
    Stress,
    Neutral,
    NeutralMixed,
}

impl MacroRegime {
    pub const ALL: [MacroRegime; 5] = [
        MacroRegime::Easing,
        MacroRegime::Tightening,
        MacroRegime::Stress,
        MacroRegime::Neutral,
        MacroRegime::NeutralMixed,
    ];

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|r| r == self).unwrap()
    }

    /// Default diagonal persistence (§4.7).
    pub fn default_persistence(&self) -> f64 {
        match self {
            MacroRegime::Easing => 0.75,
            MacroRegime::Tightening => 0.72,
            MacroRegime::Stress => 0.55,
            MacroRegime::Neutral => 0.50,
            MacroRegime::NeutralMixed => 0.40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRegimeState {
    pub asset: String,
    pub date: Date,
    pub dominant: MacroRegime,
    pub posterior: [f64; 5],
    pub persistence: f64,
    pub transition_hint: Option<MacroRegime>,
    pub days_in_state: u32,
    pub flips_30d: u32,
    pub stability: f64,
}

/// Cross-asset regime label (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossAssetRegime {
    RiskOnSync,
    RiskOffSync,
    FlightToQuality,
    Decoupled,
    Mixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PairCorrelations {
    pub btc_spx: Option<f64>,
    pub btc_dxy: Option<f64>,
    pub btc_gold: Option<f64>,
    pub spx_dxy: Option<f64>,
    pub spx_gold: Option<f64>,
    pub dxy_gold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossAssetWindow {
    pub window: usize,
    pub correlations: PairCorrelations,
    pub sample_count: usize,
    pub insufficient: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossAssetPack {
    pub windows: Vec<CrossAssetWindow>,
    pub label: CrossAssetRegime,
    pub confidence: f64,
    pub rationale: String,
    pub contagion_score: f64,
    pub decouple_score: f64,
    pub sign_flip_count: u32,
    pub corr_stability: f64,
}

/// Per-(regime,horizon,quantile) linear model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileWeights {
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub version_id: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub seed: u64,
    pub smoothing: f64,
    pub feature_count: usize,
    pub horizons: Vec<Horizon>,
    /// regime -> horizon label -> quantile label -> weights
    pub experts: std::collections::BTreeMap<String, std::collections::BTreeMap<String, std::collections::BTreeMap<String, QuantileWeights>>>,
    pub dropped_regimes: Vec<String>,
    pub samples_per_regime: std::collections::BTreeMap<String, usize>,
    pub training_wall_time_ms: u64,
}

use crate::asset::Horizon;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub mean: f64,
    pub q05: f64,
    pub q50: f64,
    pub q95: f64,
    pub tail_risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    Base,
    Risk,
    Tail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPack {
    pub dominant: Scenario,
    pub probabilities: ScenarioProbabilities,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioProbabilities {
    pub base: f64,
    pub risk: f64,
    pub tail: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GuardLevel {
    None,
    Warn,
    Crisis,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guard {
    pub level: GuardLevel,
    pub credit_composite: f64,
    pub vix: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskMode {
    RiskOn,
    Neutral,
    RiskOff,
    Crisis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directives {
    pub caps: std::collections::BTreeMap<String, f64>,
    pub haircuts: std::collections::BTreeMap<String, f64>,
    pub scales: std::collections::BTreeMap<String, f64>,
    pub risk_mode: Option<RiskMode>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Allocation {
    pub spx: f64,
    pub btc: f64,
    pub dxy: f64,
    pub cash: f64,
}

impl Allocation {
    pub fn risk_sum(&self) -> f64 {
        self.spx + self.btc + self.dxy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerMode {
    Off,
    Preview,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Posture {
    Offensive,
    Neutral,
    Defensive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRationale {
    pub expected_tilt: f64,
    pub tail_penalty: f64,
    pub corr_penalty: f64,
    pub guard_penalty: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerOutput {
    pub mode: OptimizerMode,
    pub rationale: std::collections::BTreeMap<String, AssetRationale>,
    pub deltas: std::collections::BTreeMap<String, f64>,
    pub final_allocations: Allocation,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptiveParamSource {
    Default,
    Tuned,
    Promoted,
}

/// Health block carried on every decision (§7 "user-visible behavior").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
    pub missing: Vec<String>,
    pub warnings: Vec<String>,
}

impl Health {
    pub fn ok() -> Self {
        Self {
            ok: true,
            missing: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn merge(&mut self, other: Health) {
        self.missing.extend(other.missing);
        self.warnings.extend(other.warnings);
        self.ok = self.ok && other.ok;
    }

    pub fn add_missing(&mut self, what: impl Into<String>) {
        self.missing.push(what.into());
    }

    pub fn add_warning(&mut self, what: impl Into<String>) {
        self.warnings.push(what.into());
    }
}
