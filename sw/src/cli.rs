//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::events::EventKind;

/// SpyWatch - SecuritySpy event stream watcher
#[derive(Parser)]
#[command(
    name = "sw",
    about = "Watch a SecuritySpy server's live event stream",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream events from the server until Ctrl-C
    Watch {
        /// Reconnect delay in milliseconds (overrides config)
        #[arg(long)]
        retry_ms: Option<u64>,

        /// Server refresh period in milliseconds, 0 disables (overrides config)
        #[arg(long)]
        refresh_ms: Option<u64>,

        /// Only print events of these kinds (repeatable, default ALL)
        #[arg(short, long = "kind", value_name = "KIND")]
        kinds: Vec<EventKind>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Parse a single raw event record and print the result
    Parse {
        /// Raw record, e.g. "20190113141131 100525 CAM0 MOTION"
        record: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List the cameras reported by the server
    Cameras {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spywatch")
        .join("logs")
        .join("spywatch.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for printed events and cameras
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["sw"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_watch_defaults() {
        let cli = Cli::parse_from(["sw", "watch"]);
        match cli.command {
            Some(Command::Watch {
                retry_ms,
                refresh_ms,
                kinds,
                format,
            }) => {
                assert!(retry_ms.is_none());
                assert!(refresh_ms.is_none());
                assert!(kinds.is_empty());
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_watch_with_kinds() {
        let cli = Cli::parse_from([
            "sw", "watch", "--retry-ms", "500", "--kind", "motion", "-k", "OFFLINE", "--format", "json",
        ]);
        match cli.command {
            Some(Command::Watch {
                retry_ms,
                kinds,
                format,
                ..
            }) => {
                assert_eq!(retry_ms, Some(500));
                assert_eq!(kinds, vec![EventKind::Motion, EventKind::Offline]);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["sw", "watch", "--kind", "EXPLODE"]).is_err());
    }

    #[test]
    fn test_cli_parse_record() {
        let cli = Cli::parse_from(["sw", "-l", "debug", "parse", "20190113141131 1 CAM0 MOTION"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Some(Command::Parse { ref record, .. }) if record == "20190113141131 1 CAM0 MOTION"
        ));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_log_path_ends_with_log_file() {
        assert!(get_log_path().ends_with("spywatch/logs/spywatch.log"));
    }
}
