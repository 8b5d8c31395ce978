//! Typed errors for the profile API and removal task transitions.

use crate::features::removal::TaskState;

/// Failure reported by a profile API call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Upstream answered with a non-success status
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    /// Request never produced an upstream response (connect, timeout, decode)
    #[error("{0}")]
    Transport(String),
}

impl ApiError {
    /// HTTP status reported to callers; transport failures count as 500
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Rejected { status, .. } => *status,
            ApiError::Transport(_) => 500,
        }
    }

    /// Message without the status suffix
    pub fn message(&self) -> &str {
        match self {
            ApiError::Rejected { message, .. } => message,
            ApiError::Transport(message) => message,
        }
    }
}

/// Invalid state change on a removal task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("removal task already resolved as {0}")]
    AlreadyResolved(TaskState),

    #[error("removal task cannot return to pending")]
    BackToPending,
}
