//! Layered error definitions
//!
//! Categorized by source: config / project / write

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// No client is registered for the batch's project
    #[error("the config of project {project} is not exist")]
    ProjectConfigNotExist { project: String },

    // ===== Write Errors =====
    /// Remote write failed
    #[error("write error [{code}]: {message} (request_id: {request_id})")]
    Write {
        code: String,
        message: String,
        request_id: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create the error reported for an unknown destination project
    pub fn project_config_not_exist(project: impl Into<String>) -> Self {
        Self::ProjectConfigNotExist {
            project: project.into(),
        }
    }

    /// Create write error
    pub fn write(
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self::Write {
            code: code.into(),
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            Self::ConfigParse { .. } => "ConfigParse",
            Self::ConfigValidation { .. } => "ConfigValidation",
            Self::ProjectConfigNotExist { .. } => "ProjectConfigNotExist",
            Self::Write { code, .. } => code,
            Self::Io(_) => "IoError",
            Self::Other(_) => "Other",
        }
    }

    /// True for errors raised before any write was attempted
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
                | Self::ProjectConfigNotExist { .. }
        )
    }

    /// Annotate a failed write with the number of items in the batch.
    ///
    /// Non-write errors are folded into a `Write` error so that the
    /// callback always sees a code, a message and a request id.
    pub fn with_items_count(self, items: usize) -> Self {
        match self {
            Self::Write {
                code,
                message,
                request_id,
            } => Self::Write {
                code,
                message: format!("{message}, itemscount: {items}"),
                request_id,
            },
            other => Self::Write {
                code: other.error_code().to_string(),
                message: format!("{other}, itemscount: {items}"),
                request_id: String::new(),
            },
        }
    }
}
