//! geocache - resolve, cache and compare user locations from the terminal.
//!
//! Drives the location resolver against an on-disk store. The device sensor
//! is scripted from the command line (`--fix` / `--fail`), which makes the
//! resolver's cache, fallback and fail-count behaviour easy to exercise.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use geocache_core::{Coordinate, PolicyKind, SensorError};

/// Directory for an additional daily log file
const LOG_DIR_ENV: &str = "GEOCACHE_LOG_DIR";

#[derive(Debug, Parser)]
#[command(name = "geocache", version, about = "Location resolution with caching and manual fallback")]
struct Cli {
    /// Resolver policy, overrides the config file
    #[arg(long, global = true, env = "GEOCACHE_POLICY")]
    policy: Option<PolicyKind>,

    /// Where coordinates and fail counters are stored
    #[arg(long, global = true, env = "GEOCACHE_STORE_DIR")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the current location and print the resulting state
    Locate {
        /// Position the sensor reports, as LAT,LNG
        #[arg(long, env = "GEOCACHE_FIX", allow_hyphen_values = true, conflicts_with = "fail")]
        fix: Option<Coordinate>,

        /// Make the sensor fail instead
        #[arg(long, value_enum)]
        fail: Option<FailMode>,

        /// Count failures against this target
        #[arg(long)]
        target: Option<String>,

        /// Skip the cache and ask the sensor directly
        #[arg(long)]
        refresh: bool,
    },

    /// Save a manually entered location
    Manual {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },

    /// Show the stored device and manual fixes
    Status,

    /// Show or clear the failure count for a target
    FailCount {
        target: String,

        #[arg(long)]
        clear: bool,
    },

    /// Great-circle distance between two coordinates
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lng1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lng2: f64,
    },

    /// List places from a JSON file, nearest first
    Rank {
        places: PathBuf,

        /// Origin as LAT,LNG instead of the stored location
        #[arg(long, allow_hyphen_values = true)]
        from: Option<Coordinate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailMode {
    Denied,
    Timeout,
    Unavailable,
    Unsupported,
}

impl FailMode {
    fn sensor_error(self) -> Option<SensorError> {
        match self {
            FailMode::Denied => Some(SensorError::PermissionDenied),
            FailMode::Timeout => Some(SensorError::Timeout),
            FailMode::Unavailable => {
                Some(SensorError::Unavailable("position unavailable".to_string()))
            }
            FailMode::Unsupported => None,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "geocache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!(command = ?cli.command, "geocache starting");

    let ctx = commands::Context::load(cli.policy, cli.store_dir)?;

    match cli.command {
        Command::Locate {
            fix,
            fail,
            target,
            refresh,
        } => commands::locate(&ctx, fix, fail, target.as_deref(), refresh).await,
        Command::Manual {
            latitude,
            longitude,
        } => commands::manual(&ctx, latitude, longitude),
        Command::Status => commands::status(&ctx),
        Command::FailCount { target, clear } => commands::fail_count(&ctx, &target, clear),
        Command::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        } => {
            commands::distance(Coordinate::new(lat1, lng1), Coordinate::new(lat2, lng2));
            Ok(())
        }
        Command::Rank { places, from } => commands::rank(&ctx, &places, from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_locate_with_negative_fix() {
        let cli = Cli::try_parse_from([
            "geocache", "locate", "--fix", "-23.55,-46.63", "--target", "market-1",
        ])
        .unwrap();
        match cli.command {
            Command::Locate { fix, target, .. } => {
                assert_eq!(fix, Some(Coordinate::new(-23.55, -46.63)));
                assert_eq!(target.as_deref(), Some("market-1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fix_and_fail_conflict() {
        let result = Cli::try_parse_from([
            "geocache", "locate", "--fix", "1,2", "--fail", "denied",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_policy_and_manual() {
        let cli = Cli::try_parse_from(["geocache", "--policy", "robust", "manual", "-10.5", "20"])
            .unwrap();
        assert_eq!(cli.policy, Some(PolicyKind::Robust));
        match cli.command {
            Command::Manual {
                latitude,
                longitude,
            } => {
                assert_eq!(latitude, -10.5);
                assert_eq!(longitude, 20.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fail_modes() {
        assert_eq!(FailMode::Denied.sensor_error(), Some(SensorError::PermissionDenied));
        assert_eq!(FailMode::Unsupported.sensor_error(), None);
    }
}
