//! SpyWatch - SecuritySpy event stream watcher
//!
//! CLI entry point for watching a server's events and inspecting records.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use spywatch::cli::{Cli, Command, OutputFormat, get_log_path};
use spywatch::config::Config;
use spywatch::events::{Event, EventKind, parse_event};
use spywatch::server::{Refresh, Server};
use spywatch::watcher::EventWatcher;

/// Buffer between the dispatcher and the printer
const PRINT_BUFFER: usize = 256;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spywatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("spywatch.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let after_help = format!("Logs are written to: {}", get_log_path().display());
    let cmd = Cli::command().after_help(after_help);
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(url = %config.server.url, "SpyWatch loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Watch {
            retry_ms,
            refresh_ms,
            kinds,
            format,
        }) => {
            debug!(?retry_ms, ?refresh_ms, ?kinds, %format, "main: matched Watch command");
            cmd_watch(&config, retry_ms, refresh_ms, kinds, format).await
        }
        Some(Command::Parse { record, format }) => {
            debug!(%record, %format, "main: matched Parse command");
            cmd_parse(&config, &record, format).await
        }
        Some(Command::Cameras { format }) => {
            debug!(%format, "main: matched Cameras command");
            cmd_cameras(&config, format).await
        }
        None => {
            debug!("main: no command, printing help");
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

async fn cmd_watch(
    config: &Config,
    retry_ms: Option<u64>,
    refresh_ms: Option<u64>,
    kinds: Vec<EventKind>,
    format: OutputFormat,
) -> Result<()> {
    debug!("cmd_watch: called");
    let mut watcher_config = config.watcher.clone();
    if let Some(ms) = retry_ms {
        watcher_config.retry_interval_ms = ms;
    }
    if let Some(ms) = refresh_ms {
        watcher_config.refresh_interval_ms = ms;
    }

    let server = Arc::new(Server::from_config(&config.server).context("Failed to create server client")?);
    // Camera names are best effort; events still flow without them
    if let Err(e) = server.refresh().await {
        warn!(error = %e, "cmd_watch: initial refresh failed");
        eprintln!("{} Could not load cameras: {}", "!".yellow(), e);
    }

    let watcher = Arc::new(EventWatcher::for_server(server.clone()).with_config(&watcher_config));
    let (tx, mut rx) = mpsc::channel(PRINT_BUFFER);
    let kinds = if kinds.is_empty() { vec![EventKind::All] } else { kinds };
    for kind in kinds {
        watcher.bind_channel(kind, tx.clone());
    }
    drop(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, &format);
        }
    });

    let stopper = {
        let watcher = Arc::clone(&watcher);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("cmd_watch: interrupt received");
                watcher.stop();
            }
        })
    };

    println!("Watching {} (Ctrl-C to stop)", server.base_url().cyan());
    let result = watcher
        .watch(watcher_config.retry_interval(), watcher_config.refresh_interval())
        .await;
    stopper.abort();

    // Closes the printer's channel once in-flight deliveries finish
    watcher.unbind_all();
    drop(watcher);
    let _ = printer.await;

    result.context("Failed to watch event stream")
}

async fn cmd_parse(config: &Config, record: &str, format: OutputFormat) -> Result<()> {
    debug!(%record, "cmd_parse: called");
    let server = Server::from_config(&config.server).context("Failed to create server client")?;
    if let Err(e) = server.refresh().await {
        debug!(error = %e, "cmd_parse: refresh failed, parsing without cameras");
    }

    let event = parse_event(record, &server);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&event)?),
        OutputFormat::Text => {
            print_event(&event, &OutputFormat::Text);
            for error in &event.parse_errors {
                println!("  {} {}", "✗".red(), error);
            }
        }
    }
    Ok(())
}

async fn cmd_cameras(config: &Config, format: OutputFormat) -> Result<()> {
    debug!("cmd_cameras: called");
    let server = Server::from_config(&config.server).context("Failed to create server client")?;
    server.refresh().await.context("Failed to load cameras from server")?;

    let cameras = server.cameras();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cameras)?),
        OutputFormat::Text => {
            if cameras.is_empty() {
                println!("No cameras reported by {}", server.base_url());
            }
            for camera in cameras {
                println!("{} {}", format!("CAM{}", camera.number).yellow(), camera.name);
            }
        }
    }
    Ok(())
}

fn print_event(event: &Event, format: &OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "print_event: failed to serialize event"),
        },
        OutputFormat::Text => {
            let line = event.to_string();
            let line = match event.kind {
                EventKind::Motion | EventKind::TriggerMotion | EventKind::TriggerActions => line.yellow(),
                EventKind::Offline | EventKind::Error | EventKind::Disconnected | EventKind::RefreshFailed => {
                    line.red()
                }
                EventKind::Online | EventKind::Connected => line.green(),
                EventKind::Unknown => line.dimmed(),
                _ => line.normal(),
            };
            println!("{}", line);
        }
    }
}
