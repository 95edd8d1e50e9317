pub mod calibration_routes;
pub mod compare_routes;
pub mod decision_routes;
pub mod optimizer_routes;
pub mod promotion_routes;
pub mod sim_routes;
pub mod stress_routes;

use axum::Router;

use crate::state::AppState;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(decision_routes::decision_routes())
        .merge(compare_routes::compare_routes())
        .merge(sim_routes::sim_routes())
        .merge(stress_routes::stress_routes())
        .merge(optimizer_routes::optimizer_routes())
        .merge(calibration_routes::calibration_routes())
        .merge(promotion_routes::promotion_routes())
        .with_state(state)
}
