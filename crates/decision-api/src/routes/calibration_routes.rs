//! `/calibration/run`, `/calibration/active`, `/calibration/promote`
//! (§6.3 / §4.6, §4.15). `promote` evaluates the Promotion Gate and, on
//! a `Promote` recommendation, writes the candidate's weights as the new
//! active params directly (rather than through `ActiveVersionPointer`,
//! which is synchronous and meant for in-process callers like
//! `decision-cli`).

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use decision_store::DecisionStore;
use horizon_calibrator::{CalibrationDataset, CalibrationReport, SearchConfig};
use promotion_gate::{GateInputs, GateMode, GateResult, Recommendation};
use regime_core::types::Scenario;
use serde::{Deserialize, Serialize};
use walk_forward_sim::SimulationReport;

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn calibration_routes() -> Router<AppState> {
    Router::new()
        .route("/calibration/run", post(post_calibration_run))
        .route("/calibration/active", get(get_calibration_active))
        .route("/calibration/promote", post(post_calibration_promote))
}

#[derive(Debug, Deserialize)]
pub struct CalibrationRunRequest {
    pub dataset: CalibrationDataset,
    pub search: SearchConfig,
}

async fn post_calibration_run(
    State(state): State<AppState>,
    Json(req): Json<CalibrationRunRequest>,
) -> Result<ApiResponse<CalibrationReport>, AppError> {
    let report = horizon_calibrator::calibrate(&req.dataset, &req.search);
    state
        .store
        .put_calibration_version(&report.version_id, &report.asset, &report)
        .await?;
    Ok(ok(report))
}

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub asset: String,
}

async fn get_calibration_active(
    State(state): State<AppState>,
    Query(q): Query<ActiveQuery>,
) -> Result<ApiResponse<CalibrationReport>, AppError> {
    let active: CalibrationReport = state
        .store
        .get_active_params(&q.asset)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no active calibration for {}", q.asset)))?;
    Ok(ok(active))
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub asset: String,
    pub candidate_version_id: String,
    pub report: SimulationReport,
    pub dominant_scenario: Scenario,
    pub days_since_last_calibration: i64,
    pub router_fallback_count: u32,
    pub candidate: CalibrationReport,
}

#[derive(Serialize)]
pub struct PromoteResponse {
    #[serde(flatten)]
    pub gate: GateResult,
}

async fn post_calibration_promote(
    State(state): State<AppState>,
    Json(req): Json<PromoteRequest>,
) -> Result<ApiResponse<PromoteResponse>, AppError> {
    let inputs = GateInputs {
        report: &req.report,
        dominant_scenario: req.dominant_scenario,
        days_since_last_calibration: req.days_since_last_calibration,
        router_fallback_count: req.router_fallback_count,
        mode: GateMode::On,
        candidate_version_id: req.candidate_version_id.clone(),
    };
    let mut gate = promotion_gate::evaluate(&inputs);

    if gate.recommendation == Recommendation::Promote {
        state.store.set_active_params(&req.asset, &req.candidate).await?;
        state.store.append_param_history(&req.asset, &req.candidate).await?;
        gate.promoted = true;
    }

    Ok(ok(PromoteResponse { gate }))
}
