//! `/optimizer/preview`, `/optimizer/simulate` (§6.3 / §4.13).

use axum::extract::State;
use axum::routing::post;
use capital_optimizer::{OptimizerInputs, OptimizerOutput};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn optimizer_routes() -> Router<AppState> {
    Router::new()
        .route("/optimizer/preview", post(post_optimizer_preview))
        .route("/optimizer/simulate", post(post_optimizer_simulate))
}

/// Runs the optimizer once without persisting anything; the caller is
/// expected to have set `mode: Preview` on the input (`mode: On` would still
/// compute the same output here since the handler never applies it).
async fn post_optimizer_preview(
    State(_state): State<AppState>,
    Json(inputs): Json<OptimizerInputs>,
) -> Result<ApiResponse<OptimizerOutput>, AppError> {
    let output = capital_optimizer::optimize(&inputs);
    Ok(ok(output))
}

#[derive(Debug, Deserialize)]
pub struct OptimizerSimulateRequest {
    pub steps: Vec<OptimizerInputs>,
}

#[derive(serde::Serialize)]
pub struct OptimizerSimulateResponse {
    pub outputs: Vec<OptimizerOutput>,
}

/// Runs the optimizer over an ordered sequence of inputs — each step
/// independent, matching `walk-forward-sim`'s per-sample evaluation model —
/// so a caller can see how deltas would have evolved across a history.
async fn post_optimizer_simulate(
    State(_state): State<AppState>,
    Json(req): Json<OptimizerSimulateRequest>,
) -> Result<ApiResponse<OptimizerSimulateResponse>, AppError> {
    let outputs = req.steps.iter().map(capital_optimizer::optimize).collect();
    Ok(ok(OptimizerSimulateResponse { outputs }))
}
