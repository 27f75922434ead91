pub mod check;
pub mod config;
pub mod reconcile;

use anyhow::{anyhow, Result};
use modelsync::output::{format_report, OutputFormat};
use modelsync::ReconciliationReport;
use serde_json::Value;
use std::path::Path;

/// Read a JSON array of model declarations
pub(crate) fn read_models(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Unable to read models file {}: {}", path.display(), e))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| anyhow!("Models file {} is not valid JSON: {}", path.display(), e))?;
    match value {
        Value::Array(models) => Ok(models),
        Value::Object(mut obj) => match obj.remove("models") {
            Some(Value::Array(models)) => Ok(models),
            _ => Err(anyhow!(
                "Models file {} must hold an array or an object with a \"models\" array",
                path.display()
            )),
        },
        _ => Err(anyhow!(
            "Models file {} must hold an array of models",
            path.display()
        )),
    }
}

pub(crate) fn print_report(report: &ReconciliationReport, output_format: OutputFormat) {
    println!("{}", format_report(report, output_format));
}
