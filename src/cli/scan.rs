//! Scan commands

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::engine::{BatchItem, ScanOutcome, ScanState};
use crate::error::{Error, Result};
use crate::models::{ColumnDescriptor, ScanRequest, SensitivityLevel, TriggerSource};
use crate::output;

/// Spinner on stderr while a scan is in flight. Hidden when stderr is not a
/// terminal or when JSON output is requested.
fn spinner(message: String, format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Classify one table
pub async fn run(
    opts: &GlobalOptions,
    database: &str,
    table: &str,
    session: &str,
    columns: &[String],
    source: TriggerSource,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    let request = ScanRequest::new(database, table, session)
        .with_columns(columns.iter().map(|c| ColumnDescriptor::parse(c)).collect())
        .with_source(source);

    let pb = spinner(format!("Classifying {}.{}", database, table), ctx.format);
    let outcome = ctx.engine.scan(request).await;
    pb.finish_and_clear();

    match outcome? {
        ScanOutcome::Cached(result) => output::print_result(&result, "cached", ctx.format),
        ScanOutcome::Scanned(result) => output::print_result(&result, "scanned", ctx.format),
        ScanOutcome::Busy => {
            eprintln!(
                "{} A scan of {}.{} is already running",
                "⚠".yellow(),
                database,
                table
            );
            Ok(())
        }
    }
}

/// Batch row for table output
#[derive(Debug, Tabled, Serialize)]
struct BatchRow {
    #[tabled(rename = "TABLE")]
    table: String,
    #[tabled(rename = "OUTCOME")]
    outcome: String,
    #[tabled(rename = "COLUMNS")]
    columns: usize,
    #[tabled(rename = "HIGH")]
    high: usize,
    #[tabled(rename = "ERROR")]
    #[serde(skip_serializing_if = "String::is_empty")]
    error: String,
}

impl From<&BatchItem> for BatchRow {
    fn from(item: &BatchItem) -> Self {
        let (outcome, error) = match &item.outcome {
            Ok(ScanOutcome::Cached(_)) => ("cached", String::new()),
            Ok(ScanOutcome::Scanned(_)) => ("scanned", String::new()),
            Ok(ScanOutcome::Busy) => ("busy", String::new()),
            Err(e) => ("failed", e.to_string()),
        };
        let result = item.outcome.as_ref().ok().and_then(ScanOutcome::result);
        Self {
            table: item.table.clone(),
            outcome: outcome.to_string(),
            columns: result.map(|r| r.columns.len()).unwrap_or(0),
            high: result
                .map(|r| r.at_least(SensitivityLevel::High).count())
                .unwrap_or(0),
            error,
        }
    }
}

/// Classify several tables of one database
pub async fn run_many(
    opts: &GlobalOptions,
    database: &str,
    tables: &[String],
    session: &str,
    concurrency: usize,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    let requests = tables
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| ScanRequest::new(database, t, session))
        .collect::<Vec<_>>();

    let pb = spinner(
        format!("Classifying {} tables in {}", requests.len(), database),
        ctx.format,
    );
    let items = ctx.engine.scan_many(requests, concurrency).await;
    pb.finish_and_clear();

    let rows: Vec<BatchRow> = items.iter().map(BatchRow::from).collect();
    match ctx.format {
        OutputFormat::Json => println!("{}", output::format_json(&rows)?),
        OutputFormat::Table => println!("{}", output::format_table(&rows)),
    }

    let failed = items.iter().filter(|i| i.outcome.is_err()).count();
    if failed > 0 {
        return Err(Error::Other(format!(
            "{} of {} scans failed",
            failed,
            items.len()
        )));
    }
    Ok(())
}

/// Show a cached result without scanning
pub fn show(opts: &GlobalOptions, database: &str, table: &str) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    match ctx.engine.state(table, database) {
        ScanState::Ready => match ctx.engine.get_cached(table, database) {
            Some(result) => output::print_result(&result, "cached", ctx.format),
            None => not_cached(database, table, ctx.format),
        },
        ScanState::Idle | ScanState::Busy => not_cached(database, table, ctx.format),
    }
}

fn not_cached(database: &str, table: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", output::format_json(&serde_json::Value::Null)?),
        OutputFormat::Table => println!(
            "No cached classification for {}.{}. Run {} to classify it.",
            database,
            table,
            format!("sensiscan scan {} {} --session <HANDLE>", database, table).cyan()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::error::ScanError;
    use crate::models::{ColumnClassification, RawLevel, ScanResult};

    fn item(outcome: Result<ScanOutcome>) -> BatchItem {
        BatchItem {
            database: "sales".into(),
            table: "customers".into(),
            outcome,
        }
    }

    #[test]
    fn test_batch_row_counts_high_columns() {
        let result = ScanResult {
            table_name: "customers".into(),
            database_name: "sales".into(),
            columns: vec![
                ColumnClassification::from_raw("ssn".into(), &RawLevel::Code(3), String::new(), 1.0),
                ColumnClassification::from_raw("id".into(), &RawLevel::Code(0), String::new(), 1.0),
            ],
            scanned_at: Utc::now(),
            scan_id: "scan-1".into(),
        };
        let row = BatchRow::from(&item(Ok(ScanOutcome::Scanned(result))));
        assert_eq!(row.outcome, "scanned");
        assert_eq!(row.columns, 2);
        assert_eq!(row.high, 1);
        assert!(row.error.is_empty());
    }

    #[test]
    fn test_batch_row_failure_carries_message() {
        let err = ScanError::Timeout {
            job_id: "j".into(),
            attempts: 3,
        };
        let row = BatchRow::from(&item(Err(err.into())));
        assert_eq!(row.outcome, "failed");
        assert!(row.error.contains("3 polls"));
    }
}
