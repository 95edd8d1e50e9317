//! One function per subcommand. Each reads its input file, calls straight
//! into the engine crate that owns the behavior, and prints the result as
//! pretty JSON to stdout — the same DTOs `decision-api` uses over HTTP, just
//! read from disk instead of a request body.

use std::path::Path;

use anyhow::{Context, Result};
use brain_orchestrator::{BrainOutput, ForecastBundle, WorldState};
use decision_store::DecisionStore;
use horizon_calibrator::{CalibrationDataset, CalibrationReport, SearchConfig};
use promotion_gate::{ActiveVersionPointer, GateInputs, GateMode, GateResult, Recommendation};
use regime_core::types::Scenario;
use serde::{Deserialize, Serialize};
use walk_forward_sim::{SimulationReport, SimulationSample};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct DecideInput {
    world: WorldState,
    forecasts: ForecastBundle,
}

pub fn decide(input: &Path) -> Result<()> {
    let req: DecideInput = read_json(input)?;
    let output: BrainOutput = brain_orchestrator::decide(&req.world, &req.forecasts);
    print_json(&output)
}

#[derive(Debug, Deserialize)]
struct CalibrateInput {
    dataset: CalibrationDataset,
    search: SearchConfig,
}

pub async fn calibrate(input: &Path, store: &impl DecisionStore) -> Result<()> {
    let req: CalibrateInput = read_json(input)?;
    let report = horizon_calibrator::calibrate(&req.dataset, &req.search);
    store
        .put_calibration_version(&report.version_id, &report.asset, &report)
        .await?;
    print_json(&report)
}

#[derive(Debug, Deserialize)]
struct SimulateInput {
    samples: Vec<SimulationSample>,
    span_years: f64,
}

pub async fn simulate(input: &Path, store: &impl DecisionStore) -> Result<()> {
    let req: SimulateInput = read_json(input)?;
    let report: SimulationReport = walk_forward_sim::simulate(&req.samples, req.span_years);
    let run_id = uuid::Uuid::new_v4().to_string();
    store.put_tuning_run(&run_id, &report).await?;
    print_json(&serde_json::json!({ "run_id": run_id, "report": report }))
}

#[derive(Debug, Deserialize)]
pub struct PromoteCommandInput {
    pub asset: String,
    pub candidate_version_id: String,
    pub report: SimulationReport,
    pub dominant_scenario: Scenario,
    pub days_since_last_calibration: i64,
    pub router_fallback_count: u32,
    pub candidate: CalibrationReport,
}

/// Adapts the async `DecisionStore` to the synchronous `ActiveVersionPointer`
/// the Promotion Gate expects, by staging the swap and performing the actual
/// store write after `evaluate_and_apply` returns control. `swap_active`
/// itself only records which asset/version to persist; the in-process CLI
/// owns a `tokio` runtime the whole way down, so the follow-up await happens
/// right after in `promote` below rather than inside the trait method.
struct StagedSwap {
    pending: Option<(String, String)>,
}

impl ActiveVersionPointer for StagedSwap {
    fn swap_active(&mut self, asset: &str, version_id: &str) {
        self.pending = Some((asset.to_string(), version_id.to_string()));
    }
}

pub async fn promote(input: &Path, store: &impl DecisionStore) -> Result<()> {
    let req: PromoteCommandInput = read_json(input)?;

    let inputs = GateInputs {
        report: &req.report,
        dominant_scenario: req.dominant_scenario,
        days_since_last_calibration: req.days_since_last_calibration,
        router_fallback_count: req.router_fallback_count,
        mode: GateMode::On,
        candidate_version_id: req.candidate_version_id.clone(),
    };

    let mut staged = StagedSwap { pending: None };
    let result: GateResult = promotion_gate::evaluate_and_apply(&inputs, &mut staged, &req.asset);

    if result.recommendation == Recommendation::Promote {
        if staged.pending.take().is_some() {
            store.set_active_params(&req.asset, &req.candidate).await?;
            store.append_param_history(&req.asset, &req.candidate).await?;
        }
    }

    print_json(&result)
}
