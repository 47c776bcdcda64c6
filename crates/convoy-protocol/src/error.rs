//! Error types for the coordination engine.

use thiserror::Error;

/// Errors that can occur in engine operations.
///
/// `Conflict` and `NotFound` are recoverable by the caller with fresh
/// state; `HandlerFailure` is recorded on the failed message and requires
/// deliberate re-enqueue; `IntegrityViolation` means the write would have
/// broken a data invariant and was rejected at the boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("handler failure: {0}")]
    HandlerFailure(String),
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("message id generation exhausted after {attempts} attempts")]
    QueueExhausted { attempts: u32 },
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
