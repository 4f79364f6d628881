//! Command-line argument parsing for pgprobe.

use crate::config::Config;
use crate::runner::OptionOverrides;
use clap::Parser;
use std::path::PathBuf;

/// Checks that a PostgreSQL server is reachable, runs the configured query,
/// and prints the result.
#[derive(Parser, Debug)]
#[command(name = "pgprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.properties or .toml) [default: database.properties]
    #[arg(short = 'c', long, value_name = "PATH", env = "PGPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip the host and port probes and connect directly
    #[arg(long)]
    pub skip_reachability: bool,

    /// Do not print database, driver and OS metadata
    #[arg(long)]
    pub no_metadata: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Flags only ever switch stages off; unset flags defer to the config file.
    pub fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            check_reachability: self.skip_reachability.then_some(false),
            report_metadata: self.no_metadata.then_some(false),
        }
    }
}
