//! CLI command definitions and handlers

use clap::{Parser, Subcommand};

pub mod args;
pub mod cache;
pub mod clear;
pub mod context;
pub mod scan;
pub mod session;
pub mod status;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

use crate::models::TriggerSource;

/// sensiscan - cached sensitive-column classification for database tables
#[derive(Parser, Debug)]
#[command(name = "sensiscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json)
    #[arg(
        long,
        global = true,
        env = "SENSISCAN_FORMAT",
        default_value = "table",
        hide_env = true
    )]
    pub format: OutputFormat,

    /// Override organization used to namespace the cache
    #[arg(long, global = true, env = "SENSISCAN_ORG_ID", hide_env = true)]
    pub org: Option<String>,

    /// Override config file location
    #[arg(long, global = true, env = "SENSISCAN_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override classification service host
    #[arg(long, global = true, env = "SENSISCAN_API_HOST", hide_env = true)]
    pub api_host: Option<String>,

    /// Override on-disk cache directory
    #[arg(long, global = true, env = "SENSISCAN_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "SENSISCAN_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Skip the on-disk cache; results live only for this run
    #[arg(long, global = true, env = "SENSISCAN_NO_CACHE", hide_env = true)]
    pub no_cache: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a table's columns (served from cache when possible)
    #[command(after_help = "\
Examples:
  sensiscan scan sales customers --session warehouse
  sensiscan scan sales customers --session warehouse --column email:varchar --column phone")]
    Scan {
        /// Database name
        database: String,
        /// Table name
        table: String,
        /// Session handle from the config file
        #[arg(long, short = 's')]
        session: String,
        /// Known column, as name or name:type (repeatable)
        #[arg(long = "column", short = 'c')]
        columns: Vec<String>,
        /// Where the request originates
        #[arg(long, value_enum, default_value = "table-view")]
        source: TriggerSource,
    },

    /// Classify several tables of one database concurrently
    ScanMany {
        /// Database name
        database: String,
        /// Tables to scan, comma-separated or repeated
        #[arg(long, short = 't', required = true, value_delimiter = ',')]
        tables: Vec<String>,
        /// Session handle from the config file
        #[arg(long, short = 's')]
        session: String,
        /// Maximum concurrent jobs
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Show a cached classification without scanning
    Show {
        /// Database name
        database: String,
        /// Table name
        table: String,
    },

    /// Clear cached classifications
    #[command(after_help = "\
Examples:
  sensiscan clear --database sales --table customers   # one table
  sensiscan clear --database sales                     # every table of a database
  sensiscan clear --yes                                # everything for this organization")]
    Clear {
        /// Limit to one database
        #[arg(long, short = 'd')]
        database: Option<String>,
        /// Limit to one table (requires --database)
        #[arg(long, short = 't', requires = "database")]
        table: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Manage the on-disk cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Manage session handles in the config file
    #[command(subcommand)]
    Session(SessionCommands),

    /// Show configuration status
    Status,

    /// Display version information
    Version,
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics and cached tables
    Status,
    /// Remove expired and outdated entries
    Purge,
    /// Print cache directory path
    Path,
}

/// Session management subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List configured session handles
    List,
    /// Add or replace a session handle
    Add {
        /// Handle name
        handle: String,
        /// Project identifier
        #[arg(long)]
        project_id: String,
        /// Database identifier
        #[arg(long)]
        database_id: String,
        /// Connection identifier
        #[arg(long)]
        connection_id: Option<String>,
    },
    /// Remove a session handle
    Remove {
        /// Handle name
        handle: String,
    },
}
