use clap::Args;
use modelsync::output::OutputFormat;
use modelsync::{DatabaseManager, ModelsyncConfig, ReconciliationStatus};
use std::path::PathBuf;

use super::{print_report, read_models};

/// Arguments for the Check command
#[derive(Args)]
pub struct CheckArgs {
    /// Service the models belong to
    #[clap(short, long)]
    pub service: String,

    /// JSON file with the service's model declarations
    #[clap()]
    pub models: PathBuf,

    /// Exit with a non-zero status when the schema is not clean
    #[clap(long)]
    pub strict: bool,
}

pub async fn run(config: &ModelsyncConfig, args: CheckArgs, output_format: OutputFormat) -> i32 {
    let CheckArgs {
        service,
        models,
        strict,
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

    match manager.check_consistency(&service, &models).await {
        Ok(report) => {
            print_report(&report, output_format);
            match report.status {
                ReconciliationStatus::Clean => 0,
                ReconciliationStatus::PartialFailure => 2,
                _ if strict => 3,
                _ => 0,
            }
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            1
        }
    }
}
