//! Command-line configuration.

mod duration;

pub use duration::parse_duration_to_secs;

use crate::query::CommandOptions;
use clap::Parser;

/// PostgreSQL connection options
#[derive(Parser, Clone, Debug)]
pub struct ConnectionOpts {
    /// PostgreSQL connection string
    #[arg(long, env = "ROWMAP_CONNECTION_STRING")]
    pub connection_string: String,

    /// Command timeout, e.g. "30", "30s", "2m" (0 disables it)
    #[arg(long, default_value = "30", env = "ROWMAP_TIMEOUT")]
    pub timeout: String,

    /// Dry run mode - roll back the transaction instead of committing
    #[arg(long)]
    pub dry_run: bool,
}

impl ConnectionOpts {
    /// Per-command options derived from these connection options.
    pub fn command_options(&self) -> anyhow::Result<CommandOptions> {
        let secs = parse_duration_to_secs(&self.timeout)?;
        Ok(CommandOptions::with_timeout_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_connection_opts_defaults() {
        let opts = ConnectionOpts::try_parse_from([
            "rowmap",
            "--connection-string",
            "host=localhost user=postgres",
        ])
        .unwrap();
        assert_eq!(opts.timeout, "30");
        assert!(!opts.dry_run);
        assert_eq!(
            opts.command_options().unwrap().timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_zero_timeout_disables() {
        let opts = ConnectionOpts::try_parse_from([
            "rowmap",
            "--connection-string",
            "host=localhost",
            "--timeout",
            "0",
            "--dry-run",
        ])
        .unwrap();
        assert!(opts.dry_run);
        assert_eq!(opts.command_options().unwrap().timeout, None);
    }
}
