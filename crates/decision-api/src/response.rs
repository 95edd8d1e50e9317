//! The §6.3 response envelope: every route returns `{ok: true, ...payload}`
//! on success or `{ok: false, error, message}` on failure. Modeled as two
//! distinct axum response types rather than one struct with optional fields,
//! so a route's handler signature documents which shape it returns.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Wraps a successful payload. `T`'s fields are flattened alongside `ok`.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    payload: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(payload: T) -> Self {
        Self { ok: true, payload }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn ok<T: Serialize>(payload: T) -> ApiResponse<T> {
    ApiResponse::new(payload)
}
