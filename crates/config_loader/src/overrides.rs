//! Environment overrides for producer settings
//!
//! `LOG_PRODUCER_<FIELD>` replaces the matching `[producer]` value after
//! parsing and before validation, so an out-of-range override is reported
//! like a bad file value. Unrelated `LOG_PRODUCER_*` variables (the CLI's own
//! flags) are ignored.

use std::fmt::Display;
use std::str::FromStr;

use contracts::{ContractError, LogsFormat, ProducerConfig};

/// Prefix shared by every override variable
pub const ENV_PREFIX: &str = "LOG_PRODUCER_";

/// Apply overrides from `vars`, returning how many were applied
pub fn apply<I, K, V>(producer: &mut ProducerConfig, vars: I) -> Result<usize, ContractError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut applied = 0;
    for (key, value) in vars {
        let key = key.as_ref();
        let Some(field) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let value = value.as_ref().trim();

        match field {
            "MAX_IO_WORKERS" => producer.max_io_workers = parse_number(key, value)?,
            "PACKAGE_TIMEOUT_MS" => producer.package_timeout_ms = parse_number(key, value)?,
            "RETRY_TIMES" => producer.retry_times = parse_number(key, value)?,
            "IO_WORKER_IDLE_TIMEOUT_MS" => {
                producer.io_worker_idle_timeout_ms = parse_number(key, value)?
            }
            "TOTAL_SIZE_IN_BYTES" => producer.total_size_in_bytes = parse_number(key, value)?,
            "LOGS_FORMAT" => producer.logs_format = parse_logs_format(key, value)?,
            _ => continue,
        }
        applied += 1;
    }
    Ok(applied)
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ContractError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e| {
        ContractError::config_validation(format!("env.{key}"), format!("invalid value '{value}': {e}"))
    })
}

fn parse_logs_format(key: &str, value: &str) -> Result<LogsFormat, ContractError> {
    match value.to_ascii_lowercase().as_str() {
        "protobuf" => Ok(LogsFormat::Protobuf),
        "json" => Ok(LogsFormat::Json),
        _ => Err(ContractError::config_validation(
            format!("env.{key}"),
            format!("expected 'protobuf' or 'json', got '{value}'"),
        )),
    }
}
