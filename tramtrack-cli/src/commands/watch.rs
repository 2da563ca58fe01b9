//! `watch` command - run a tracking session and print status changes.
//!
//! Prints one line whenever the rider-facing status changes:
//!
//! ```text
//! tram-1  Running  13.730100,100.778200  moving  Library  link:up  realtime
//! ```

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tramtrack::config::ConfigFile;
use tramtrack::tracking::{
    spawn_status_logger, ChannelClient, PositionReconciler, TrackerSnapshot, TrackingSession,
    WebSocketTransport, DEFAULT_LOG_INTERVAL,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for `tramtrack watch`.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Location server address (overrides server.server_address)
    #[arg(long)]
    pub server: Option<String>,

    /// Enable debug logging to stdout
    #[arg(long)]
    pub debug: bool,

    /// Do not connect; walk the configured fallback route only
    #[arg(long)]
    pub no_server: bool,
}

/// Run the watch command until Ctrl+C.
pub async fn run(args: WatchArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("watch");

    let config = apply_overrides(runner.config().clone(), &args)?;
    let mut reconciler_config = config.reconciler_config();
    let mut session_config = config.session_config();

    if args.no_server {
        if config.fallback.route.is_empty() {
            return Err(CliError::Config(
                "--no-server needs a fallback route (set [fallback] route)".to_string(),
            ));
        }
        reconciler_config.fallback_route = config.fallback.route.clone();
        session_config.connect_on_start = false;
    }

    let client = ChannelClient::new(config.channel_config(), WebSocketTransport::new());
    let session = TrackingSession::new(
        client,
        PositionReconciler::new(reconciler_config),
        session_config,
    );

    let mut status = session.status();
    let mut errors = session.errors();
    let cancellation = CancellationToken::new();

    if tracing::enabled!(tracing::Level::DEBUG) {
        spawn_status_logger(session.status(), cancellation.clone(), DEFAULT_LOG_INTERVAL);
    }

    if args.no_server {
        println!("Walking fallback route ({} waypoints)", config.fallback.route.len());
    } else {
        println!("Connecting to {}", config.server.server_address);
    }
    println!("Press Ctrl+C to stop");
    println!();

    let handle = session.start(cancellation.clone());
    let mut last_line = String::new();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    return Err(CliError::Session(format!("Failed to listen for Ctrl+C: {}", e)));
                }
                info!("Shutdown requested");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = format_status(&status.borrow_and_update());
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
            }
            error = errors.recv() => match error {
                Ok(error) => eprintln!("warning: {}", error),
                Err(RecvError::Lagged(skipped)) => eprintln!("warning: {} errors not shown", skipped),
                Err(RecvError::Closed) => {}
            }
        }
    }

    cancellation.cancel();
    handle
        .await
        .map_err(|e| CliError::Session(e.to_string()))?;
    println!("Stopped");
    Ok(())
}

fn apply_overrides(mut config: ConfigFile, args: &WatchArgs) -> Result<ConfigFile, CliError> {
    if let Some(server) = &args.server {
        if !(server.starts_with("ws://") || server.starts_with("wss://")) {
            return Err(CliError::Config(format!(
                "--server must be a ws:// or wss:// address, got '{}'",
                server
            )));
        }
        config.server.server_address = server.clone();
    }
    Ok(config)
}

/// One status line. Excludes fields that change every frame.
fn format_status(snapshot: &TrackerSnapshot) -> String {
    let tram = &snapshot.tram;
    let location = tram
        .location
        .map(|l| format!("{:.6},{:.6}", l.lat, l.lng))
        .unwrap_or_else(|| "no position".to_string());

    format!(
        "{}  {}  {}  {}  {}  link:{}  {}",
        tram.tram_id,
        tram.status,
        location,
        if tram.is_moving { "moving" } else { "idle" },
        tram.last_building_passed.as_deref().unwrap_or("-"),
        if tram.connection_healthy { "up" } else { "down" },
        snapshot.status.mode,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tramtrack::tracking::ReconcilerConfig;

    fn args(server: Option<&str>) -> WatchArgs {
        WatchArgs {
            server: server.map(str::to_string),
            debug: false,
            no_server: false,
        }
    }

    #[test]
    fn test_server_override() {
        let config = apply_overrides(ConfigFile::default(), &args(Some("ws://10.0.0.5:9000/loc"))).unwrap();
        assert_eq!(config.server.server_address, "ws://10.0.0.5:9000/loc");

        assert!(apply_overrides(ConfigFile::default(), &args(Some("10.0.0.5"))).is_err());
    }

    #[test]
    fn test_format_status_without_position() {
        let reconciler = PositionReconciler::new(ReconcilerConfig::default());
        let line = format_status(&reconciler.snapshot(Instant::now()));
        assert_eq!(line, "tram-1  Stopped  no position  idle  -  link:down  realtime");
    }

    #[test]
    fn test_format_status_with_position() {
        let mut reconciler = PositionReconciler::new(ReconcilerConfig::default());
        reconciler.inject_position(13.7301, 100.7782, Instant::now());
        let line = format_status(&reconciler.snapshot(Instant::now()));
        assert!(line.starts_with("tram-1  Stopped  13.730100,100.778200  idle"));
    }
}
