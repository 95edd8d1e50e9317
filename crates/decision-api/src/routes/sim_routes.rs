//! `/sim/run`, `/sim/report?id=` (§6.3 / §4.14): runs the Walk-Forward
//! Simulator over caller-supplied samples and persists the report under a
//! generated run id so it can be fetched again later.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use decision_store::DecisionStore;
use serde::{Deserialize, Serialize};
use walk_forward_sim::{SimulationReport, SimulationSample};

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn sim_routes() -> Router<AppState> {
    Router::new()
        .route("/sim/run", post(post_sim_run))
        .route("/sim/report/:id", get(get_sim_report))
}

#[derive(Debug, Deserialize)]
pub struct SimRunRequest {
    pub samples: Vec<SimulationSample>,
    pub span_years: f64,
}

#[derive(Serialize)]
pub struct SimRunResponse {
    pub id: String,
    pub report: SimulationReport,
}

async fn post_sim_run(
    State(state): State<AppState>,
    Json(req): Json<SimRunRequest>,
) -> Result<ApiResponse<SimRunResponse>, AppError> {
    let report = walk_forward_sim::simulate(&req.samples, req.span_years);
    let id = uuid::Uuid::new_v4().to_string();
    state.store.put_tuning_run(&id, &report).await?;
    Ok(ok(SimRunResponse { id, report }))
}

#[derive(Serialize)]
pub struct SimReportResponse {
    pub id: String,
    pub report: SimulationReport,
}

async fn get_sim_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<SimReportResponse>, AppError> {
    let report: SimulationReport = state
        .store
        .get_tuning_run(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("simulation report {id}")))?;
    Ok(ok(SimReportResponse { id, report }))
}
