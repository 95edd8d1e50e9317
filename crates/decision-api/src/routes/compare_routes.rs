//! `/compare`, `/compare/timeline` (§6.3): diff two allocations, or a
//! sequence of them, in terms of the same override-intensity metric
//! `walk-forward-sim` uses to score a single simulation step.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use regime_core::types::Allocation;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;

pub fn compare_routes() -> Router<AppState> {
    Router::new()
        .route("/compare", post(post_compare))
        .route("/compare/timeline", post(post_compare_timeline))
}

fn override_intensity(a: &Allocation, b: &Allocation) -> f64 {
    (a.spx - b.spx).abs() + (a.btc - b.btc).abs() + (a.dxy - b.dxy).abs()
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub before: Allocation,
    pub after: Allocation,
}

#[derive(Serialize)]
pub struct CompareResponse {
    pub delta_spx: f64,
    pub delta_btc: f64,
    pub delta_dxy: f64,
    pub override_intensity: f64,
}

async fn post_compare(
    State(_state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<ApiResponse<CompareResponse>, AppError> {
    let response = CompareResponse {
        delta_spx: req.after.spx - req.before.spx,
        delta_btc: req.after.btc - req.before.btc,
        delta_dxy: req.after.dxy - req.before.dxy,
        override_intensity: override_intensity(&req.after, &req.before),
    };
    Ok(ok(response))
}

#[derive(Debug, Deserialize)]
pub struct TimelinePoint {
    pub date: regime_core::types::Date,
    pub allocation: Allocation,
}

#[derive(Debug, Deserialize)]
pub struct CompareTimelineRequest {
    pub points: Vec<TimelinePoint>,
}

#[derive(Serialize)]
pub struct TimelineStep {
    pub date: regime_core::types::Date,
    pub override_intensity: f64,
}

#[derive(Serialize)]
pub struct CompareTimelineResponse {
    pub steps: Vec<TimelineStep>,
}

/// Sequential diff over an ordered series of allocations — the same
/// override-intensity metric as `/compare`, applied pairwise.
async fn post_compare_timeline(
    State(_state): State<AppState>,
    Json(req): Json<CompareTimelineRequest>,
) -> Result<ApiResponse<CompareTimelineResponse>, AppError> {
    let steps = req
        .points
        .windows(2)
        .map(|pair| TimelineStep {
            date: pair[1].date,
            override_intensity: override_intensity(&pair[1].allocation, &pair[0].allocation),
        })
        .collect();
    Ok(ok(CompareTimelineResponse { steps }))
}
