use thiserror::Error;

use crate::hooks::traits::HookName;

/// Failure of a single hook handler. Never aborts a dispatch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HookError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Handler for {expected} returned a {actual} payload")]
    PayloadMismatch { expected: HookName, actual: HookName },
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }
}
