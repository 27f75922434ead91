use clap::{Parser, Subcommand};
use modelsync::output::OutputFormat;
use modelsync::ModelsyncConfig;
use tracing::Level;

mod commands;

use commands::check::CheckArgs;
use commands::config::ConfigArgs;
use commands::reconcile::ReconcileArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.modelsync/modelsync.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report drift between declared models and the live schema, read-only
    Check(CheckArgs),

    /// Register models and create missing tables and columns
    Reconcile(ReconcileArgs),

    /// Show the active configuration
    Config(ConfigArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match ModelsyncConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .init();
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("ERROR: unable to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Check(args) => {
            runtime.block_on(commands::check::run(&config, args, cli.format))
        }
        Commands::Reconcile(args) => {
            runtime.block_on(commands::reconcile::run(&config, args, cli.format))
        }
        Commands::Config(args) => {
            commands::config::run(&config, args, cli.format);
            0
        }
    };

    std::process::exit(code);
}
