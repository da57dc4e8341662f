//! ProducerBlueprint - Config Loader output
//!
//! Describes the producer settings and the projects it can ship to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ProducerConfig;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dispatcher settings
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Known destination projects
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

/// One destination project and the client used to reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (destination key)
    pub project: String,

    /// Client implementation
    #[serde(default)]
    pub client_type: ClientType,

    /// Client-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Built-in client kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Log request summaries via tracing
    #[default]
    Console,
    /// Append requests as JSON lines to a file (`path` param)
    File,
}
