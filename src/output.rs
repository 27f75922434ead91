//! Report formatting
//!
//! Reports can be printed as tables (with the `display` feature), JSON in
//! several flavors, or pipe-separated rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::reconcile::ReconciliationReport;
use crate::repair::SkipReason;

/// Unified output format for all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line per object)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one drift row per line)
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    /// Check if this is a JSON variant
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    /// Check if this is a table variant
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// One drift item flattened for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct DriftRow {
    pub table: String,
    pub field: String,
    pub kind: String,
    pub declared: String,
    pub actual: String,
    pub outcome: String,
}

/// Flatten a report's drift, noting what became of each item
pub fn drift_rows(report: &ReconciliationReport) -> Vec<DriftRow> {
    report
        .drift
        .iter()
        .map(|item| {
            let outcome = if report.applied.contains(item) {
                "applied".to_string()
            } else if let Some(f) = report.failed.iter().find(|f| &f.item == item) {
                format!("failed: {}", f.error)
            } else if let Some(s) = report.skipped.iter().find(|s| &s.item == item) {
                match s.reason {
                    SkipReason::Destructive | SkipReason::NotAutoRepairable => {
                        "reported".to_string()
                    }
                    reason => format!("skipped: {}", reason),
                }
            } else {
                "reported".to_string()
            };

            DriftRow {
                table: item.table_name.clone(),
                field: item.field_name.clone().unwrap_or_default(),
                kind: item.kind.to_string(),
                declared: item.declared.map(|t| t.to_string()).unwrap_or_default(),
                actual: item.actual.clone().unwrap_or_default(),
                outcome,
            }
        })
        .collect()
}

/// Render one report in `format`
pub fn format_report(report: &ReconciliationReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
        OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::JsonLine => drift_rows(report)
            .iter()
            .filter_map(|row| serde_json::to_string(row).ok())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Psv => {
            let mut lines = vec!["table|field|kind|declared|actual|outcome".to_string()];
            lines.extend(drift_rows(report).iter().map(|r| {
                format!(
                    "{}|{}|{}|{}|{}|{}",
                    r.table, r.field, r.kind, r.declared, r.actual, r.outcome
                )
            }));
            lines.join("\n")
        }
        OutputFormat::Table | OutputFormat::Markdown => format_table(report, format),
    }
}

#[cfg(feature = "display")]
fn format_table(report: &ReconciliationReport, format: OutputFormat) -> String {
    use tabled::settings::Style;
    use tabled::Table;

    let mut out = vec![report.summary()];
    let rows = drift_rows(report);
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        match format {
            OutputFormat::Markdown => table.with(Style::markdown()),
            _ => table.with(Style::rounded()),
        };
        out.push(table.to_string());
    }
    out.extend(notes(report));
    out.join("\n")
}

#[cfg(not(feature = "display"))]
fn format_table(report: &ReconciliationReport, _format: OutputFormat) -> String {
    let mut out = vec![report.summary()];
    out.extend(drift_rows(report).iter().map(|r| {
        format!(
            "  {} {}.{} {} {} ({})",
            r.kind, r.table, r.field, r.declared, r.actual, r.outcome
        )
    }));
    out.extend(notes(report));
    out.join("\n")
}

fn notes(report: &ReconciliationReport) -> Vec<String> {
    let mut lines: Vec<String> = report.notes.iter().map(|n| format!("note: {}", n)).collect();
    if let Some(e) = &report.error {
        lines.push(format!("error: {}", e));
    }
    let destructive = report.destructive_drift().count();
    if destructive > 0 {
        lines.push(format!(
            "{} destructive item(s) need manual attention",
            destructive
        ));
    }
    lines.extend(
        report
            .rejected
            .iter()
            .map(|r| format!("rejected: {}", r.reason)),
    );
    lines
}
