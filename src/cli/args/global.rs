//! Global CLI options shared across all commands
//!
//! Precedence is CLI flag > environment variable > config file > default.
//! This struct captures the CLI/env layer; config file values are merged in
//! `CommandContext`.

use crate::cli::{Cli, OutputFormat};

/// Global CLI options passed to all command handlers.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format (table, json)
    pub format: OutputFormat,

    /// Organization ID override (bypasses config file)
    pub org: Option<String>,

    /// Custom config file path (defaults to ~/.sensiscan/config.yaml)
    pub config: Option<String>,

    /// Keep results in memory only for this run
    pub no_cache: bool,

    /// Custom classification service host
    pub api_host: Option<String>,

    /// Custom directory for the on-disk cache
    pub cache_dir: Option<String>,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            org: cli.org.clone(),
            config: cli.config.clone(),
            no_cache: cli.no_cache,
            api_host: cli.api_host.clone(),
            cache_dir: cli.cache_dir.clone(),
        }
    }

    pub fn org_ref(&self) -> Option<&str> {
        self.org.as_deref()
    }

    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn api_host_ref(&self) -> Option<&str> {
        self.api_host.as_deref()
    }

    pub fn cache_dir_ref(&self) -> Option<&str> {
        self.cache_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_global_options_from_cli() {
        let cli = Cli::parse_from([
            "sensiscan",
            "--org",
            "org-123",
            "--config",
            "/custom/path",
            "--api-host",
            "http://localhost:8080",
            "--cache-dir",
            "/tmp/cache",
            "--no-cache",
            "--format",
            "json",
            "status",
        ]);
        let opts = GlobalOptions::from_cli(&cli);

        assert_eq!(opts.format, OutputFormat::Json);
        assert_eq!(opts.org_ref(), Some("org-123"));
        assert_eq!(opts.config_ref(), Some("/custom/path"));
        assert_eq!(opts.api_host_ref(), Some("http://localhost:8080"));
        assert_eq!(opts.cache_dir_ref(), Some("/tmp/cache"));
        assert!(opts.no_cache);
    }

    #[test]
    fn test_global_options_none_accessors() {
        let opts = GlobalOptions::default();

        assert_eq!(opts.format, OutputFormat::Table);
        assert_eq!(opts.org_ref(), None);
        assert_eq!(opts.config_ref(), None);
        assert_eq!(opts.api_host_ref(), None);
        assert_eq!(opts.cache_dir_ref(), None);
        assert!(!opts.no_cache);
    }
}
