//! Session handle management

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOptions, OutputFormat};
use crate::config::Config;
use crate::error::{ConfigError, Result, SessionError};
use crate::output;
use crate::session::SessionEntry;

#[derive(Debug, Tabled, Serialize)]
struct SessionRow {
    #[tabled(rename = "HANDLE")]
    handle: String,
    #[tabled(rename = "PROJECT")]
    project_id: String,
    #[tabled(rename = "DATABASE")]
    database_id: String,
    #[tabled(rename = "CONNECTION")]
    connection_id: String,
}

/// List configured session handles
pub fn list(opts: &GlobalOptions) -> Result<()> {
    let config = Config::load_at(opts.config_ref())?;

    let rows: Vec<SessionRow> = config
        .sessions
        .iter()
        .map(|(handle, entry)| SessionRow {
            handle: handle.clone(),
            project_id: entry.project_id.clone().unwrap_or_default(),
            database_id: entry.database_id.clone().unwrap_or_default(),
            connection_id: entry.connection_id.clone().unwrap_or_default(),
        })
        .collect();

    match opts.format {
        OutputFormat::Json => println!("{}", output::format_json(&rows)?),
        OutputFormat::Table => println!("{}", output::format_table(&rows)),
    }
    Ok(())
}

/// Add or replace a session handle, creating the config file if needed
pub fn add(
    opts: &GlobalOptions,
    handle: &str,
    project_id: &str,
    database_id: &str,
    connection_id: Option<&str>,
) -> Result<()> {
    if handle.trim().is_empty() {
        return Err(ConfigError::Invalid("session handle must not be empty".into()).into());
    }

    let mut config = match Config::load_at(opts.config_ref()) {
        Ok(config) => config,
        Err(crate::error::Error::Config(ConfigError::NotFound)) => Config::default(),
        Err(e) => return Err(e),
    };

    let replaced = config
        .sessions
        .insert(
            handle.to_string(),
            SessionEntry {
                project_id: Some(project_id.to_string()),
                connection_id: connection_id.map(str::to_string),
                database_id: Some(database_id.to_string()),
            },
        )
        .is_some();
    config.save_at(opts.config_ref())?;

    let verb = if replaced { "Updated" } else { "Added" };
    println!("{} {} session: {}", "✓".green(), verb, handle);
    Ok(())
}

/// Remove a session handle
pub fn remove(opts: &GlobalOptions, handle: &str) -> Result<()> {
    let mut config = Config::load_at(opts.config_ref())?;

    if config.sessions.remove(handle).is_none() {
        return Err(SessionError::NotFound(handle.to_string()).into());
    }
    config.save_at(opts.config_ref())?;

    println!("{} Removed session: {}", "✓".green(), handle);
    Ok(())
}
