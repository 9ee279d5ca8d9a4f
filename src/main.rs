use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use snapsweep::{
    azure::{ArmClient, AzureTokenSource},
    cleaner,
    config::{CleanerConfig, RetentionPolicy},
    observability,
};

#[derive(Parser, Debug)]
#[command(
    name = "snapsweep",
    about = "Retention-policy driven cleaner for Azure managed disk snapshots",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "snapsweep.toml")]
    config: PathBuf,

    /// Run a single cleaning pass and exit instead of looping on the
    /// worker interval.
    #[arg(long)]
    once: bool,

    /// Evaluate and log the deletion set without issuing any deletions.
    /// Overrides `worker.dry_run = false` in the configuration.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CleanerConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    observability::init_tracing(&config.observability);

    let retention = match RetentionPolicy::from_env() {
        Ok(retention) => retention,
        Err(e) => {
            tracing::error!(error = %e, "Invalid retention configuration");
            return ExitCode::FAILURE;
        }
    };

    let tokens = match AzureTokenSource::from_config(&config.azure.auth) {
        Ok(tokens) => Arc::new(tokens),
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up Azure credentials");
            return ExitCode::FAILURE;
        }
    };

    let client = match ArmClient::new(reqwest::Client::new(), tokens, &config.azure) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up Azure Resource Manager client");
            return ExitCode::FAILURE;
        }
    };

    let dry_run = cli.dry_run || config.worker.dry_run;

    if cli.once {
        match cleaner::run_once(&client, &client, &config.filters, retention, dry_run).await {
            Ok(result) => {
                tracing::info!(
                    evaluated = result.evaluated,
                    matched = result.matched,
                    retained = result.retained,
                    deleted = result.deleted,
                    failed = result.failed,
                    dry_run,
                    "Cleaning pass complete"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Cleaning pass failed");
                ExitCode::FAILURE
            }
        }
    } else {
        let mut worker_config = config.worker.clone();
        worker_config.dry_run = dry_run;

        let worker = cleaner::start_cleaner_worker(
            Arc::new(client),
            Arc::new(config.filters),
            retention,
            worker_config,
        );

        tokio::select! {
            _ = worker => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
            }
        }
        ExitCode::SUCCESS
    }
}
