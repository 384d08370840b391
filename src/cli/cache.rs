//! Cache management commands

use serde::Serialize;

use crate::cache::key::split_cache_key;
use crate::cli::context::{cache_dir, load_config};
use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::Result;
use crate::output::{self, KeyRow};

#[derive(Debug, Serialize)]
struct CacheStatus {
    path: Option<String>,
    total_entries: usize,
    total_size_bytes: usize,
    total_size_human: String,
    oldest_entry_timestamp: Option<i64>,
    newest_entry_timestamp: Option<i64>,
    cached_tables: Vec<String>,
}

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let keys = ctx.engine.cached_keys();

    let stats = match &ctx.disk {
        Some(disk) => Some((disk.path().display().to_string(), disk.stats()?)),
        None => None,
    };

    let status = CacheStatus {
        path: stats.as_ref().map(|(p, _)| p.clone()),
        total_entries: stats.as_ref().map(|(_, s)| s.total_entries).unwrap_or(0),
        total_size_bytes: stats.as_ref().map(|(_, s)| s.total_size_bytes).unwrap_or(0),
        total_size_human: output::format_size(
            stats.as_ref().map(|(_, s)| s.total_size_bytes).unwrap_or(0),
        ),
        oldest_entry_timestamp: stats.as_ref().and_then(|(_, s)| s.oldest_entry),
        newest_entry_timestamp: stats.as_ref().and_then(|(_, s)| s.newest_entry),
        cached_tables: keys,
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", output::format_json(&status)?),
        OutputFormat::Table => print_status(&status),
    }
    Ok(())
}

fn print_status(status: &CacheStatus) {
    println!("Cache Status");
    println!("────────────────────────────────────────");
    println!(
        "Location:       {}",
        status.path.as_deref().unwrap_or("memory only")
    );
    println!("Records:        {}", status.total_entries);
    println!("Total size:     {}", status.total_size_human);

    for (label, ts) in [
        ("Oldest entry:  ", status.oldest_entry_timestamp),
        ("Newest entry:  ", status.newest_entry_timestamp),
    ] {
        if let Some(ts) = ts {
            let dt = chrono::DateTime::from_timestamp(ts, 0)
                .map(|d| {
                    d.with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                })
                .unwrap_or_else(|| "unknown".to_string());
            println!("{} {}", label, dt);
        }
    }

    println!();
    let rows: Vec<KeyRow> = status
        .cached_tables
        .iter()
        .filter_map(|k| split_cache_key(k))
        .map(|(database, table)| KeyRow {
            database: database.to_string(),
            table: table.to_string(),
        })
        .collect();
    println!("{}", output::format_table(&rows));
}

/// Remove expired and version-mismatched entries
pub fn purge(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let removed = ctx.engine.purge_expired();

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            output::format_json(&serde_json::json!({ "entries_removed": removed }))?
        ),
        OutputFormat::Table => {
            if removed > 0 {
                println!("Removed {} stale cache entries", removed);
            } else {
                println!("No stale cache entries");
            }
        }
    }
    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    let dir = match load_config(opts) {
        Ok(config) => cache_dir(&config)?,
        Err(_) => match opts.cache_dir_ref() {
            Some(dir) => dir.into(),
            None => crate::cache::SqliteStore::cache_dir()?,
        },
    };
    println!("{}", dir.display());
    Ok(())
}
