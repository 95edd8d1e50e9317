//! `/stress/run`, `/stress/status?id=` (§6.3): re-evaluates the Crisis
//! Guard (§4.10) for a hypothetical credit/VIX reading, then threads the
//! resulting guard level through the Allocation Policy (§4.12) so a caller
//! can see the allocation impact of a worse guard tier before it occurs.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use allocation_policy::PolicyInputs;
use decision_store::DecisionStore;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn stress_routes() -> Router<AppState> {
    Router::new()
        .route("/stress/run", post(post_stress_run))
        .route("/stress/status/:id", get(get_stress_status))
}

#[derive(Debug, Deserialize)]
pub struct StressRunRequest {
    pub credit_composite: f64,
    pub vix: f64,
    pub policy_inputs: PolicyInputs,
}

#[derive(Serialize, Deserialize)]
pub struct StressResult {
    pub id: String,
    pub guard: regime_core::types::Guard,
    pub outcome: allocation_policy::PolicyOutput,
}

async fn post_stress_run(
    State(state): State<AppState>,
    Json(mut req): Json<StressRunRequest>,
) -> Result<ApiResponse<StressResult>, AppError> {
    let guard = crisis_guard::evaluate(req.credit_composite, req.vix);
    req.policy_inputs.guard = guard.clone();
    let outcome = allocation_policy::apply(&req.policy_inputs);

    let id = uuid::Uuid::new_v4().to_string();
    let result = StressResult { id: id.clone(), guard, outcome };
    state.store.put_tuning_run(&id, &result).await?;
    Ok(ok(result))
}

async fn get_stress_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<StressResult>, AppError> {
    let result: StressResult = state
        .store
        .get_tuning_run(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("stress run {id}")))?;
    Ok(ok(result))
}
