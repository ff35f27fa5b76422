//! # Joydrive
//!
//! Drive a differential-drive robot with a lift from a browser joystick.
//!
//! Serves the joystick page and the `/ws/joystick` WebSocket, and turns each
//! joystick sample into motor-driver GPIO/PWM output.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use joydrive::config::{Config, LoggingConfig};
use joydrive::motor::hardware::RppalGpio;
use joydrive::motor::MotorController;
use joydrive::server::{self, AppState};
use joydrive::session::SharedController;

/// Time an open session gets to stop the motors itself after Ctrl+C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Log file name prefix inside `logging.file_dir`
const LOG_FILE_PREFIX: &str = "joydrive.log";

#[derive(Parser, Debug)]
#[command(name = "joydrive", version, about = "Browser joystick motor driver")]
struct Args {
    /// Path to a TOML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not open GPIO; accept connections but drive nothing
    #[arg(long)]
    no_hardware: bool,
}

/// Main entry point for Joydrive
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse arguments and load configuration
///    - Set up logging (console, plus a daily file when configured)
///    - Open GPIO, falling back to no-op motor control on failure
///
/// 2. **Serve**
///    - HTTP/WebSocket server until Ctrl+C
///
/// 3. **Graceful Shutdown**
///    - Signal the active session to end (it stops the motors)
///    - Stop the motors once more
///
/// # Errors
///
/// Returns error if the configuration is invalid or the address cannot be bound.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let _log_guard = init_logging(&config.logging);
    info!("Joydrive v{} starting...", env!("CARGO_PKG_VERSION"));

    let controller: SharedController =
        Arc::new(Mutex::new(open_controller(&config, args.no_hardware)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(
        Arc::clone(&controller),
        config.server.log_queue_capacity,
        shutdown_rx,
    );
    let app = server::router(state, &config.server.static_dir);
    let listener = server::bind(&config.server).await?;

    info!("Press Ctrl+C to exit");
    server::serve(listener, app, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down...");
        let _ = shutdown_tx.send(true);
    })
    .await?;

    match timeout(SHUTDOWN_GRACE, controller.lock()).await {
        Ok(mut ctrl) => {
            if let Err(e) = ctrl.stop() {
                error!("Failed to stop motors on shutdown: {}", e);
            }
        }
        Err(_) => warn!(
            "Session still open after {:?}, motors stop when it is dropped",
            SHUTDOWN_GRACE
        ),
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
        config.validate().context("Invalid --port")?;
    }

    Ok(config)
}

/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn open_controller(config: &Config, no_hardware: bool) -> MotorController {
    if no_hardware {
        warn!("GPIO disabled by --no-hardware, motor commands are ignored");
        return MotorController::degraded(&config.motor);
    }

    match RppalGpio::open(&config.pins, config.motor.pwm_frequency_hz) {
        Ok(gpio) => MotorController::new(Box::new(gpio), &config.motor),
        Err(e) => {
            error!("GPIO initialization failed: {}. Motor commands are ignored", e);
            MotorController::degraded(&config.motor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_grace() {
        assert_eq!(SHUTDOWN_GRACE, Duration::from_secs(2));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["joydrive"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.port.is_none());
        assert!(!args.no_hardware);
    }

    #[test]
    fn test_args_all_flags() {
        let args = Args::try_parse_from([
            "joydrive",
            "--config",
            "robot.toml",
            "--port",
            "9000",
            "--no-hardware",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("robot.toml")));
        assert_eq!(args.port, Some(9000));
        assert!(args.no_hardware);
    }

    #[test]
    fn test_args_reject_bad_port() {
        assert!(Args::try_parse_from(["joydrive", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_load_config_defaults() {
        let args = Args::try_parse_from(["joydrive"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_config_port_override() {
        let args = Args::try_parse_from(["joydrive", "-p", "8080"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_config_port_zero_rejected() {
        let args = Args::try_parse_from(["joydrive", "-p", "0"]).unwrap();
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let args = Args::try_parse_from(["joydrive", "-c", "/nonexistent/joydrive.toml"]).unwrap();
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/joydrive.toml"));
    }

    #[test]
    fn test_no_hardware_is_degraded() {
        let controller = open_controller(&Config::default(), true);
        assert!(controller.is_degraded());
    }
}
