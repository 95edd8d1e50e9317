//! `/promotion/recommendation` (§6.3 / §4.15): evaluates the
//! Promotion Gate without applying any version swap — the read-only half of
//! what `/calibration/promote` does.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use promotion_gate::{GateInputs, GateMode, GateResult};
use regime_core::types::Scenario;
use serde::Deserialize;
use walk_forward_sim::SimulationReport;

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn promotion_routes() -> Router<AppState> {
    Router::new().route("/promotion/recommendation", post(post_promotion_recommendation))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub report: SimulationReport,
    pub dominant_scenario: Scenario,
    pub days_since_last_calibration: i64,
    pub router_fallback_count: u32,
    pub candidate_version_id: String,
}

async fn post_promotion_recommendation(
    State(_state): State<AppState>,
    Json(req): Json<RecommendationRequest>,
) -> Result<ApiResponse<GateResult>, AppError> {
    let inputs = GateInputs {
        report: &req.report,
        dominant_scenario: req.dominant_scenario,
        days_since_last_calibration: req.days_since_last_calibration,
        router_fallback_count: req.router_fallback_count,
        mode: GateMode::Evaluate,
        candidate_version_id: req.candidate_version_id,
    };
    let result = promotion_gate::evaluate(&inputs);
    Ok(ok(result))
}
