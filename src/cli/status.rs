//! Status command implementation

use colored::Colorize;

use crate::cli::GlobalOptions;
use crate::cli::context::{cache_dir, load_config};
use crate::config::Config;
use crate::error::Result;

/// Display configuration status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "sensiscan Configuration Status".bold());

    let config = match load_config(opts) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Configuration not loaded: {}", "✗".red(), e);
            println!();
            println!(
                "Create {} with at least `org_id` and a `sessions:` entry.",
                Config::resolve_path(opts.config_ref())?
                    .display()
                    .to_string()
                    .cyan()
            );
            println!();
            return Ok(());
        }
    };

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!("Config file: {}", config_path.display().to_string().cyan());
    println!();

    if config.api_key.is_some() {
        println!("{} API key configured", "✓".green());
    } else {
        println!("{} API key not configured (requests are sent unauthenticated)", "○".dimmed());
    }

    match config.require_org_id() {
        Ok(org) => println!("{} Organization: {}", "✓".green(), org),
        Err(_) => {
            println!("{} No organization set", "✗".red());
            println!("  → Set `org_id` in the config file or pass --org");
        }
    }

    println!("{} API host: {}", "○".dimmed(), config.api_host().cyan());

    if config.sessions.is_empty() {
        println!("{} No session handles configured", "⚠".yellow());
        println!("  → Run 'sensiscan session add <HANDLE> --project-id .. --database-id ..'");
    } else {
        let names: Vec<&str> = config.sessions.keys().map(String::as_str).collect();
        println!(
            "{} Sessions: {}",
            "✓".green(),
            names.join(", ")
        );
    }

    let dir = if opts.no_cache {
        "disabled (--no-cache)".to_string()
    } else {
        cache_dir(&config)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    };
    println!("{} Cache: {}", "○".dimmed(), dir);
    println!(
        "{} Polling: every {} ms, up to {} attempts, {:?} mode",
        "○".dimmed(),
        config.poll.interval_ms,
        config.poll.max_attempts,
        config.poll.mode
    );
    println!();

    Ok(())
}
