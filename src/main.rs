//! sensiscan - cached sensitive-column classification for database tables

use clap::Parser;

mod cache;
mod cli;
mod client;
mod config;
mod engine;
mod error;
mod models;
mod notifier;
mod output;
mod session;

use cli::{CacheCommands, Cli, Commands, GlobalOptions, SessionCommands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Scan {
            database,
            table,
            session,
            columns,
            source,
        } => cli::scan::run(&opts, &database, &table, &session, &columns, source).await,
        Commands::ScanMany {
            database,
            tables,
            session,
            concurrency,
        } => cli::scan::run_many(&opts, &database, &tables, &session, concurrency).await,
        Commands::Show { database, table } => cli::scan::show(&opts, &database, &table),
        Commands::Clear {
            database,
            table,
            yes,
        } => cli::clear::run(&opts, database.as_deref(), table.as_deref(), yes),
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Purge => cli::cache::purge(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
        },
        Commands::Session(cmd) => match cmd {
            SessionCommands::List => cli::session::list(&opts),
            SessionCommands::Add {
                handle,
                project_id,
                database_id,
                connection_id,
            } => cli::session::add(
                &opts,
                &handle,
                &project_id,
                &database_id,
                connection_id.as_deref(),
            ),
            SessionCommands::Remove { handle } => cli::session::remove(&opts, &handle),
        },
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("sensiscan version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
