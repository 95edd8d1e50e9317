use thiserror::Error;

/// Shared error taxonomy for the decision pipeline.
///
/// Pure numeric routines never construct these for ordinary missing data —
/// they return `None`/empty containers instead (see `regime_core::Health`).
/// These variants are for contract violations that must travel to the top
/// of a decision and be recorded there.
#[derive(Error, Debug, Clone)]
pub enum DecisionError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("stale data: {0}")]
    StaleData(String),

    #[error("validation failure: {0}")]
    ValidationFailure(String),

    #[error("constraint breach: {0}")]
    ConstraintBreach(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("promotion rejected: {0}")]
    PromotionRejected(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("series unavailable: {0}")]
    SeriesUnavailable(String),
}

pub type DecisionResult<T> = Result<T, DecisionError>;
