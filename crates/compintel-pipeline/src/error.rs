use compintel_core::StoreError;
use thiserror::Error;

/// Why a request was refused before any work started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),

    #[error("subject was researched recently; try again in {remaining_secs}s or force a refresh")]
    Cooldown { remaining_secs: u64 },

    #[error("daily credit budget exhausted ({used} of {budget} used)")]
    BudgetExhausted { used: f64, budget: f64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse classification of [`PipelineError`] for callers that map errors to
/// transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Nothing was persisted as failed; the same call may succeed later.
    Retryable,
    /// The report moved to `failed`.
    Fatal,
    /// A precondition refused the request before any work started.
    Precondition,
    NotFound,
    /// The report's current status does not allow this operation.
    InvalidState,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request rejected: {0}")]
    Rejected(Rejection),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("temporary failure: {0}")]
    Retryable(String),

    #[error("stage failed: {0}")]
    Fatal(String),
}

impl PipelineError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Rejected(_) => ErrorClass::Precondition,
            PipelineError::NotFound(_) => ErrorClass::NotFound,
            PipelineError::InvalidState(_) => ErrorClass::InvalidState,
            PipelineError::Retryable(_) => ErrorClass::Retryable,
            PipelineError::Fatal(_) => ErrorClass::Fatal,
        }
    }

    pub(crate) fn report_not_found(id: uuid::Uuid) -> Self {
        PipelineError::NotFound(format!("report {id}"))
    }
}

impl From<Rejection> for PipelineError {
    fn from(rejection: Rejection) -> Self {
        PipelineError::Rejected(rejection)
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => PipelineError::NotFound("record".to_string()),
            StoreError::StatusConflict { .. } | StoreError::InProgress(_) => {
                PipelineError::InvalidState(err.to_string())
            }
            StoreError::Backend(message) => {
                PipelineError::Retryable(compintel_core::redact_secrets(&message))
            }
        }
    }
}
