//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log producer - asynchronous batch dispatch driver
#[derive(Parser, Debug)]
#[command(
    name = "log-producer",
    author,
    version,
    about = "Asynchronous log batch producer",
    long_about = "Loads a producer configuration, starts the I/O dispatcher and pushes \n\
                  synthetic log batches through it, reporting delivery statistics."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOG_PRODUCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LOG_PRODUCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter directive derived from `-v` / `-q`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit synthetic batches through the dispatcher
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "producer.toml",
        env = "LOG_PRODUCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Number of batches to submit
    #[arg(long, default_value = "100", env = "LOG_PRODUCER_BATCHES")]
    pub batches: u64,

    /// Log records per batch
    #[arg(long, default_value = "10")]
    pub items_per_batch: usize,

    /// Destination project (defaults to the first configured project)
    #[arg(long)]
    pub project: Option<String>,

    /// Logstore name put on every batch
    #[arg(long, default_value = "default")]
    pub logstore: String,

    /// Give up waiting for callbacks after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "LOG_PRODUCER_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOG_PRODUCER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "producer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "log-producer",
            "-v",
            "run",
            "--config",
            "p.toml",
            "--batches",
            "5",
            "--project",
            "web",
        ]);
        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.batches, 5);
                assert_eq!(args.items_per_batch, 10);
                assert_eq!(args.project.as_deref(), Some("web"));
                assert_eq!(args.config, PathBuf::from("p.toml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["log-producer", "-q", "-v", "validate"]).is_err());
    }
}
