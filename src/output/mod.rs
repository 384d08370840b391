//! Output formatting for CLI results
//!
//! Tables go through `tabled`; JSON is wrapped in a `{data, meta}` envelope.

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::object::Rows;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::models::{ColumnClassification, ScanResult, SensitivityLevel};

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub data: T,
    pub meta: Metadata,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub timestamp: String,
    pub version: String,
}

impl<T> JsonOutput<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Format data as pretty-printed JSON inside the envelope
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonOutput::new(data))?)
}

/// Format rows as a rounded table
pub fn format_table<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

/// One classified column as a table row
#[derive(Debug, Tabled)]
pub struct ColumnRow {
    #[tabled(rename = "COLUMN")]
    pub column: String,
    #[tabled(rename = "LEVEL")]
    pub level: String,
    #[tabled(rename = "CONFIDENCE")]
    pub confidence: String,
    #[tabled(rename = "REASON")]
    pub reason: String,
}

impl From<&ColumnClassification> for ColumnRow {
    fn from(c: &ColumnClassification) -> Self {
        Self {
            column: c.column_name.clone(),
            level: colored_level(c.level),
            confidence: format!("{:.0}%", c.confidence * 100.0),
            reason: if c.reason.is_empty() {
                "-".to_string()
            } else {
                c.reason.clone()
            },
        }
    }
}

/// One cached key as a table row
#[derive(Debug, Tabled)]
pub struct KeyRow {
    #[tabled(rename = "DATABASE")]
    pub database: String,
    #[tabled(rename = "TABLE")]
    pub table: String,
}

pub fn colored_level(level: SensitivityLevel) -> String {
    match level {
        SensitivityLevel::High => level.as_str().red().bold().to_string(),
        SensitivityLevel::Medium => level.as_str().yellow().to_string(),
        SensitivityLevel::Low => level.as_str().green().to_string(),
    }
}

/// Print one scan result. `origin` says where it came from ("cached",
/// "scanned").
pub fn print_result(result: &ScanResult, origin: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Tagged<'a> {
                origin: &'a str,
                #[serde(flatten)]
                result: &'a ScanResult,
            }
            println!("{}", format_json(&Tagged { origin, result })?);
        }
        OutputFormat::Table => {
            println!("{}", result_header(result, origin));
            let rows: Vec<ColumnRow> = result.columns.iter().map(ColumnRow::from).collect();
            println!("{}", format_table(&rows));
        }
    }
    Ok(())
}

fn result_header(result: &ScanResult, origin: &str) -> String {
    let high = result.at_least(SensitivityLevel::High).count();
    format!(
        "{}.{}  {}  {} columns, {} high  ({} {})",
        result.database_name.bold(),
        result.table_name.bold(),
        origin.dimmed(),
        result.columns.len(),
        high,
        result.scan_id.dimmed(),
        result
            .scanned_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M"),
    )
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
