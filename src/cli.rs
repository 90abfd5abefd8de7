//! Command-line argument parsing for snow-sheets.

use crate::config::{DEFAULT_CONFIG_FILE, PROFILE_ENV_VAR};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runs a configured list of Snowflake queries and loads each result into a Google Sheets tab.
#[derive(Parser, Debug)]
#[command(name = "snow-sheets")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Profile to merge over the shared settings
    #[arg(short = 'p', long, value_name = "NAME", env = PROFILE_ENV_VAR)]
    pub profile: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run every configured query and write the results (default)
    Run,

    /// Print the contents of a worksheet, to check sheet access
    Peek {
        /// Tab to read
        #[arg(short, long, value_name = "NAME")]
        worksheet: String,

        /// A1 range within the tab
        #[arg(short, long, value_name = "A1")]
        range: Option<String>,

        /// Treat the first row as data rather than column names
        #[arg(long)]
        no_header: bool,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to execute; `run` when none is given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["snow-sheets"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(cli.log_file.is_none());
        assert_eq!(cli.command(), Command::Run);
    }

    #[test]
    fn test_profile_flag() {
        let cli = Cli::try_parse_from(["snow-sheets", "--profile", "prod", "run"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("prod"));
        assert_eq!(cli.command(), Command::Run);
    }

    #[test]
    fn test_config_and_log_file() {
        let cli = Cli::try_parse_from([
            "snow-sheets",
            "--config",
            "/etc/jobs/sales.yaml",
            "--log-file",
            "/tmp/run.log",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/jobs/sales.yaml"));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/run.log")));
    }

    #[test]
    fn test_peek() {
        let cli = Cli::try_parse_from([
            "snow-sheets",
            "peek",
            "--worksheet",
            "Sales",
            "--range",
            "A1:C10",
            "--no-header",
        ])
        .unwrap();
        assert_eq!(
            cli.command(),
            Command::Peek {
                worksheet: "Sales".to_string(),
                range: Some("A1:C10".to_string()),
                no_header: true,
            }
        );
    }

    #[test]
    fn test_peek_requires_worksheet() {
        assert!(Cli::try_parse_from(["snow-sheets", "peek"]).is_err());
    }
}
