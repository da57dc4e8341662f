//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// No project to send to
    #[error("No destination project: {message}")]
    NoProject { message: String },

    /// Not every batch was resolved before the deadline
    #[error("Timed out with {pending} of {submitted} batches unresolved")]
    Timeout { pending: u64, submitted: u64 },

    /// A batch could never fit the byte budget; earlier batches were still resolved
    #[error("Stopped after {submitted} batches: {message}")]
    BudgetRejected { message: String, submitted: u64 },

    /// Dispatcher setup or shutdown error
    #[error(transparent)]
    Dispatcher(#[from] dispatcher::DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn no_project(message: impl Into<String>) -> Self {
        Self::NoProject {
            message: message.into(),
        }
    }
}
