use clap::Args;
use modelsync::output::OutputFormat;
use modelsync::{DatabaseManager, ModelsyncConfig, ReconciliationStatus};
use std::path::PathBuf;
use tracing::info;

use super::{print_report, read_models};

/// Arguments for the Reconcile command
#[derive(Args)]
pub struct ReconcileArgs {
    /// Service the models belong to
    #[clap(short, long)]
    pub service: String,

    /// JSON file with the service's model declarations
    #[clap()]
    pub models: PathBuf,

    /// Only report drift, do not create tables or columns
    #[clap(long)]
    pub dry_run: bool,
}

pub async fn run(
    config: &ModelsyncConfig,
    args: ReconcileArgs,
    output_format: OutputFormat,
) -> i32 {
    let ReconcileArgs {
        service,
        models,
        dry_run,
    } = args;

    let models = match read_models(&models) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 1;
        }
    };

    let manager = match DatabaseManager::open(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 1;
        }
    };

    let result = manager
        .register_models_with_report(&service, &models, !dry_run)
        .await;
    let (valid, report) = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 1;
        }
    };
    info!("service {} registered {} model(s)", service, valid.len());

    // dry runs and empty registrations produce no report; check instead
    let report = match report {
        Some(report) => report,
        None => match manager.check_consistency(&service, &models).await {
            Ok(report) => report,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return 1;
            }
        },
    };

    print_report(&report, output_format);
    if report.status == ReconciliationStatus::PartialFailure {
        2
    } else {
        0
    }
}
