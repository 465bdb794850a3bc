//! Error taxonomy for the test case lifecycle core

use thiserror::Error;

use crate::ai::AiError;
use crate::extract::ExtractError;

/// Errors surfaced by store, ledger, resolver and restore operations.
///
/// `EmptySelection` and `NoOp` are expected, user-facing outcomes; callers
/// usually report them rather than unwind over them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No items selected")]
    EmptySelection,

    #[error("Nothing to do: {0}")]
    NoOp(String),

    #[error("External service failed: {0}")]
    ExternalFailure(String),
}

impl CoreError {
    /// True for the conditions reported as a no-op instead of a failure
    pub fn is_noop(&self) -> bool {
        matches!(self, CoreError::EmptySelection | CoreError::NoOp(_))
    }

    /// True when retrying with refreshed state or a new external call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound(_)
                | CoreError::EmptySelection
                | CoreError::NoOp(_)
                | CoreError::ExternalFailure(_)
        )
    }
}

impl From<AiError> for CoreError {
    fn from(e: AiError) -> Self {
        CoreError::ExternalFailure(e.to_string())
    }
}

impl From<ExtractError> for CoreError {
    fn from(e: ExtractError) -> Self {
        CoreError::ExternalFailure(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
