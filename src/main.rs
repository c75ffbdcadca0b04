//! Cyberwave camera driver.
//!
//! Loads the twin configuration from the environment, opens the camera and
//! streams frames to the twin until SIGINT/SIGTERM. Fatal errors exit with
//! a sysexits-style code and a one-line JSON diagnostic on stderr.

use camera_driver::{
    capture::{CameraSource, SyntheticSource},
    config::{ConfigLoader, DriverConfig},
    metrics::MetricsRegistry,
    publish::HttpConnector,
    shutdown::ShutdownSignal,
    supervisor::Supervisor,
    DriverError,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "camera-driver",
    version,
    about = "Stream a camera feed to a Cyberwave digital twin"
)]
struct Cli {
    /// Settings file (takes precedence over CYBERWAVE_DRIVER_SETTINGS).
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Stream a synthetic test pattern instead of a hardware camera.
    #[arg(long)]
    mock_camera: bool,

    /// Port for the Prometheus exporter; 0 disables it.
    #[arg(long, value_name = "PORT")]
    metrics_port: Option<u16>,

    /// Load and validate the configuration, print a summary and exit.
    #[arg(long)]
    check_config: bool,
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(level.trim().to_lowercase())
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    info!(version = camera_driver::VERSION, "Cyberwave camera driver");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let diagnostic = e.diagnostic();
            match diagnostic.to_json() {
                Ok(line) => eprintln!("{line}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::from(diagnostic.exit_code)
        }
    }
}

fn run(cli: Cli) -> Result<(), DriverError> {
    let config = ConfigLoader::from_process_env()
        .with_settings_path(cli.settings)
        .verify_devices(!cli.mock_camera)
        .load()?;
    info!(config = %config.summary(), "Configuration loaded");

    if cli.check_config {
        println!("{}", config.summary());
        return Ok(());
    }

    let shutdown = ShutdownSignal::new();
    shutdown
        .install_handler()
        .map_err(|e| DriverError::Internal(format!("failed to install signal handler: {e}")))?;

    let source = camera_source(&config, cli.mock_camera)?;
    let connector =
        HttpConnector::new(&config).map_err(|e| DriverError::Internal(e.to_string()))?;

    let registry = MetricsRegistry::new().map_err(|e| DriverError::Internal(e.to_string()))?;
    start_metrics_server(
        &registry,
        cli.metrics_port.unwrap_or(config.settings.metrics.port),
    );

    let mut supervisor =
        Supervisor::new(&config.settings, source, connector, shutdown).with_metrics(registry);
    let stats = supervisor.run()?;

    info!(
        frames_published = stats.frames_published,
        frames_dropped = stats.frames_dropped,
        session_reconnects = stats.session_reconnects,
        device_reopens = stats.device_reopens,
        "Driver exited"
    );
    Ok(())
}

fn camera_source(config: &DriverConfig, mock: bool) -> Result<Arc<dyn CameraSource>, DriverError> {
    if mock {
        info!(depth = config.is_depth_camera, "Using synthetic camera");
        return Ok(Arc::new(SyntheticSource::new(config.is_depth_camera)));
    }

    #[cfg(feature = "camera")]
    {
        Ok(Arc::new(camera_driver::capture::NativeSource::from_config(
            config,
        )))
    }

    #[cfg(not(feature = "camera"))]
    {
        Err(camera_driver::ConfigError::Unsupported(
            "built without the `camera` feature; rebuild with it or pass --mock-camera".to_string(),
        )
        .into())
    }
}

#[cfg(feature = "metrics")]
fn start_metrics_server(registry: &MetricsRegistry, port: u16) {
    use camera_driver::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return;
    }
    if let Err(e) = MetricsServer::new(MetricsServerConfig::with_port(port), registry.clone()).spawn()
    {
        warn!(error = %e, "Failed to start metrics server");
    }
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(_registry: &MetricsRegistry, port: u16) {
    if port != 0 {
        warn!(port, "Metrics exporter requested but built without the `metrics` feature");
    }
}
