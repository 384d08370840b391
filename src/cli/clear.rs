//! Clear command: drop cached classifications

use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use dialoguer::Confirm;
use serde::Serialize;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::Result;
use crate::output;

#[derive(Debug, Serialize)]
struct ClearReport {
    scope: String,
    cleared: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    durable_entries: Option<usize>,
}

/// Clear one table, one database, or everything for the organization.
pub fn run(
    opts: &GlobalOptions,
    database: Option<&str>,
    table: Option<&str>,
    yes: bool,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let org = ctx.config.require_org_id()?.to_string();

    // Collect invalidations as they are broadcast
    let cleared = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&cleared);
    let listener = ctx.engine.subscribe(move |event| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.to_string());
        Ok(())
    });

    let mut report = match (database, table) {
        (Some(db), Some(t)) => {
            ctx.engine.clear(t, db);
            ClearReport::scoped(format!("{}.{}", db, t))
        }
        (Some(db), None) => {
            ctx.engine.clear_by_database(db);
            ClearReport::scoped(db.to_string())
        }
        (None, _) => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Clear every cached classification for organization '{}'?",
                        org
                    ))
                    .default(false)
                    .interact()?;

                if !confirmed {
                    eprintln!("Cancelled.");
                    ctx.engine.unsubscribe(listener);
                    return Ok(());
                }
            }
            let stats = ctx.engine.clear_all();
            ClearReport {
                scope: format!("org:{}", org),
                cleared: Vec::new(),
                memory_entries: Some(stats.memory_entries),
                durable_entries: Some(stats.durable_entries),
            }
        }
    };

    ctx.engine.unsubscribe(listener);
    report.cleared = cleared
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    match ctx.format {
        OutputFormat::Json => println!("{}", output::format_json(&report)?),
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

impl ClearReport {
    fn scoped(scope: String) -> Self {
        Self {
            scope,
            cleared: Vec::new(),
            memory_entries: None,
            durable_entries: None,
        }
    }
}

fn print_report(report: &ClearReport) {
    if let Some(durable) = report.durable_entries {
        println!(
            "{} Cleared {} cache records for {}",
            "✓".green(),
            durable,
            report.scope
        );
        return;
    }

    if report.cleared.is_empty() {
        println!("Nothing cached for {}", report.scope);
        return;
    }

    for key in &report.cleared {
        println!("{} Cleared {}", "✓".green(), key);
    }
}
