//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = ConfigLoader::load_from_path_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    for warning in ConfigLoader::warnings(&blueprint) {
        warn!(%warning, "Configuration warning");
    }

    let project = match &args.project {
        Some(project) => project.clone(),
        None => blueprint
            .projects
            .first()
            .map(|p| p.project.clone())
            .ok_or_else(|| CliError::no_project("configuration lists no projects"))?,
    };

    info!(
        projects = blueprint.projects.len(),
        max_io_workers = blueprint.producer.max_io_workers,
        retry_times = blueprint.producer.retry_times,
        %project,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        project,
        logstore: args.logstore.clone(),
        batches: args.batches,
        items_per_batch: args.items_per_batch,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let stats = pipeline.run(shutdown_signal()).await?;
    stats.print_summary();

    if let Some(message) = stats.budget_rejection.clone() {
        return Err(CliError::BudgetRejected {
            message,
            submitted: stats.submitted,
        }
        .into());
    }

    if stats.timed_out {
        return Err(CliError::Timeout {
            pending: stats.pending(),
            submitted: stats.submitted,
        }
        .into());
    }

    info!("Log producer finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
