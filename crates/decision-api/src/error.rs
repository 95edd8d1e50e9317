//! Maps engine/store failures onto the `{ok: false, error, message}` half of
//! the §6.3 envelope: a single `AppError` enum implementing
//! `axum::response::IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use regime_core::DecisionError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Decision(DecisionError::InsufficientData(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Decision(DecisionError::StaleData(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Decision(DecisionError::ValidationFailure(_)) => StatusCode::BAD_REQUEST,
            AppError::Decision(DecisionError::ConstraintBreach(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Decision(DecisionError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Decision(DecisionError::PromotionRejected(_)) => StatusCode::CONFLICT,
            AppError::Decision(DecisionError::RunNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Decision(DecisionError::SeriesUnavailable(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Decision(DecisionError::InsufficientData(_)) => "INSUFFICIENT_DATA",
            AppError::Decision(DecisionError::StaleData(_)) => "STALE_DATA",
            AppError::Decision(DecisionError::ValidationFailure(_)) => "VALIDATION_FAILURE",
            AppError::Decision(DecisionError::ConstraintBreach(_)) => "CONSTRAINT_BREACH",
            AppError::Decision(DecisionError::Timeout(_)) => "TIMEOUT",
            AppError::Decision(DecisionError::PromotionRejected(_)) => "PROMOTION_REJECTED",
            AppError::Decision(DecisionError::RunNotFound(_)) => "RUN_NOT_FOUND",
            AppError::Decision(DecisionError::SeriesUnavailable(_)) => "SERIES_UNAVAILABLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            ok: false,
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
