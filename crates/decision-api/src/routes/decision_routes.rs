//! `/decision`, `/world`, `/forecast` (§6.3): the core read surface.
//! Each handler only deserializes its request, calls one core-crate
//! function, and serializes the result — no business logic lives here.

use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use brain_orchestrator::{BrainOutput, ForecastBundle, WorldState};
use regime_core::types::{HorizonForecast, TrainedModel};
use regime_core::Horizon;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn decision_routes() -> Router<AppState> {
    Router::new()
        .route("/decision", post(post_decision))
        .route("/world", post(post_world))
        .route("/forecast", post(post_forecast))
}

#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    #[serde(rename = "asOf")]
    pub as_of: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub world: WorldState,
    pub forecasts: ForecastBundle,
}

/// `POST /decision?asOf=` — runs the Brain Orchestrator (§4.11) over a
/// caller-assembled `WorldState`/`ForecastBundle` pair.
async fn post_decision(
    State(_state): State<AppState>,
    Query(_q): Query<AsOfQuery>,
    Json(req): Json<DecisionRequest>,
) -> Result<ApiResponse<BrainOutput>, AppError> {
    let output = brain_orchestrator::decide(&req.world, &req.forecasts);
    Ok(ok(output))
}

/// `POST /world?asOf=` — echoes the assembled world state back through the
/// envelope so a caller can inspect the inputs a `/decision` call would use
/// without invoking the Brain.
async fn post_world(
    State(_state): State<AppState>,
    Query(_q): Query<AsOfQuery>,
    Json(world): Json<WorldState>,
) -> Result<ApiResponse<WorldState>, AppError> {
    Ok(ok(world))
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub asset: String,
    #[serde(rename = "asOf")]
    pub as_of: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub model: TrainedModel,
    pub features: Vec<f64>,
    #[serde(rename = "regimePosterior")]
    pub regime_posterior: BTreeMap<String, f64>,
}

#[derive(serde::Serialize)]
pub struct ForecastResponse {
    pub asset: String,
    pub forecast: BTreeMap<Horizon, HorizonForecast>,
}

/// `POST /forecast?asset=&asOf=` — runs Quantile Mixture-of-Experts
/// inference (§4.9) for one asset against a caller-supplied trained model,
/// feature vector, and regime posterior.
async fn post_forecast(
    State(_state): State<AppState>,
    Query(q): Query<ForecastQuery>,
    Json(req): Json<ForecastRequest>,
) -> Result<ApiResponse<ForecastResponse>, AppError> {
    let forecast = quantile_forecaster::infer(&req.model, &req.features, &req.regime_posterior);
    Ok(ok(ForecastResponse { asset: q.asset, forecast }))
}
