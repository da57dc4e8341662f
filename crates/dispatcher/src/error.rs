//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Client creation error
    #[error("failed to create client for project '{project}': {message}")]
    ClientCreation { project: String, message: String },

    /// `start` called on a dispatcher that is already running
    #[error("io dispatcher already started")]
    AlreadyStarted,

    /// `start` called after a stop was requested
    #[error("io dispatcher has been stopped")]
    Stopped,

    /// Batch larger than the whole byte budget
    #[error("batch of {requested} bytes exceeds budget capacity {capacity}")]
    BudgetExceeded { requested: usize, capacity: usize },
}

impl DispatcherError {
    /// Create a client creation error
    pub fn client_creation(project: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientCreation {
            project: project.into(),
            message: message.into(),
        }
    }
}
