use clap::Args;
use modelsync::output::OutputFormat;
use modelsync::ModelsyncConfig;
use serde::Serialize;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    #[serde(flatten)]
    settings: &'a ModelsyncConfig,
    sqlite_path: String,
}

pub fn run(config: &ModelsyncConfig, _args: ConfigArgs, output_format: OutputFormat) {
    let info = ConfigInfo {
        config_file: ModelsyncConfig::config_file_path(),
        settings: config,
        sqlite_path: config.sqlite_path(),
    };

    match output_format {
        OutputFormat::Json | OutputFormat::JsonLine => match serde_json::to_string(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing config info: {}", e),
        },
        OutputFormat::JsonPretty => match serde_json::to_string_pretty(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing config info: {}", e),
        },
        _ => {
            // Table, Markdown, and PSV all use the same human-readable format
            println!("modelsync Configuration");
            println!("=======================\n");
            println!("Config File:        {}", info.config_file);
            println!("{}", config.summary());

            eprintln!();
            eprintln!("Tips:");
            eprintln!("  Use --format json for machine-readable output");
            eprintln!("  Edit ~/.modelsync/modelsync.toml or set MODELSYNC_* variables to customize settings");
        }
    }
}
