//! # Config Loader
//!
//! Loads a `ProducerBlueprint` from TOML or JSON.
//!
//! Loading runs in three steps:
//! - parse the file (format picked from the extension)
//! - apply `LOG_PRODUCER_*` environment overrides to the producer settings
//! - validate the result
//!
//! [`ConfigLoader::warnings`] lists settings that are valid but likely to
//! misbehave, for example an idle timeout shorter than the poll interval.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path_with_env(Path::new("producer.toml")).unwrap();
//! for warning in ConfigLoader::warnings(&blueprint) {
//!     eprintln!("warning: {warning}");
//! }
//! ```

mod advice;
mod overrides;
mod parser;
mod validator;

pub use contracts::ProducerBlueprint;
pub use overrides::ENV_PREFIX;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Producer configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a file, ignoring the environment
    ///
    /// # Errors
    /// Unreadable file, unknown extension, parse or validation failure
    pub fn load_from_path(path: &Path) -> Result<ProducerBlueprint, ContractError> {
        let (content, format) = Self::read(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a file, then apply `LOG_PRODUCER_*` variables from the process
    /// environment before validating
    ///
    /// # Errors
    /// As [`load_from_path`](Self::load_from_path), plus unparsable overrides
    pub fn load_from_path_with_env(path: &Path) -> Result<ProducerBlueprint, ContractError> {
        let (content, format) = Self::read(path)?;
        Self::load_from_str_with_overrides(&content, format, std::env::vars())
    }

    /// Parse and validate `content`
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProducerBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Parse `content`, apply overrides from `vars`, then validate
    pub fn load_from_str_with_overrides<I, K, V>(
        content: &str,
        format: ConfigFormat,
        vars: I,
    ) -> Result<ProducerBlueprint, ContractError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut blueprint = parser::parse(content, format)?;
        overrides::apply(&mut blueprint.producer, vars)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Non-fatal issues in an already valid blueprint
    pub fn warnings(blueprint: &ProducerBlueprint) -> Vec<String> {
        advice::warnings(blueprint)
    }

    pub fn to_toml(blueprint: &ProducerBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(blueprint: &ProducerBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Read a file and pick its format from the extension
    fn read(path: &Path) -> Result<(String, ConfigFormat), ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;
        let format = ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })?;
        Ok((std::fs::read_to_string(path)?, format))
    }
}
