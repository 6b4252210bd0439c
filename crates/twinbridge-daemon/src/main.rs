//! twinbridge Daemon - Device to twin bridge service
//!
//! This binary runs the bridge between a fleet of node-protocol devices and
//! their cloud twins:
//! - Loads and validates the YAML configuration
//! - Discovers devices by browsing the node server
//! - Binds each device to its twin connection string
//! - Runs the telemetry, error and rate cycles
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The node server and the twin hub are served by the simulation backends.
//! All cycles share one `CancellationToken` that is cancelled on receipt of
//! SIGTERM or SIGINT.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use twinbridge_alert::EmailAlertGateway;
use twinbridge_core::config::{Config, ServerConfig, VALID_LOG_LEVELS};
use twinbridge_core::domain::{DeviceName, NodePath};
use twinbridge_core::ports::INodeClient;
use twinbridge_sim::{InMemoryTwinHub, SimulatedPlant};
use twinbridge_sync::FleetScheduler;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "twinbridged", version, about = "Industrial device to cloud twin bridge")]
struct Cli {
    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bind the device fleet and run until interrupted
    Run(RunArgs),
    /// View and check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Number of simulated devices (defaults to the number of connection strings)
    #[arg(long, value_name = "N")]
    simulate: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

// ============================================================================
// Configuration and logging
// ============================================================================

/// Loads the file given with `--config`, or the default file when present
fn load_config(path: Option<&Path>) -> Result<(PathBuf, Config)> {
    match path {
        Some(path) => Ok((path.to_path_buf(), Config::load(path)?)),
        None => {
            let path = Config::default_path();
            let config = Config::load_or_default(&path);
            Ok((path, config))
        }
    }
}

/// Filter directive for the configured level, raised by `-v` flags
fn log_filter(level: &str, verbose: u8) -> String {
    let configured = VALID_LOG_LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(level))
        .map_or(2, |i| 4 - i);
    let requested = match verbose {
        0 => 0,
        1 => 3,
        _ => 4,
    };
    VALID_LOG_LEVELS[4 - configured.max(requested)].to_string()
}

fn init_tracing(config: &Config, verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(&config.logging.level, verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

// ============================================================================
// Discovery
// ============================================================================

/// Lists the devices under `server.browse_root` through a dedicated session
async fn discover_devices(
    node_client: &dyn INodeClient,
    server: &ServerConfig,
) -> Result<Vec<DeviceName>> {
    let session = node_client
        .connect(&server.endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", server.endpoint))?;
    let root = NodePath::new(server.browse_root.as_str())?;
    let children = session
        .browse_children(&root)
        .await
        .with_context(|| format!("Failed to browse {root}"))?;

    let mut devices = Vec::with_capacity(children.len());
    for child in children {
        match DeviceName::new(child.display_name.as_str()) {
            Ok(name) => devices.push(name),
            Err(e) => warn!(node = %child.path, error = %e, "Skipping node without a usable name"),
        }
    }

    info!(count = devices.len(), "Discovered devices");
    Ok(devices)
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration and the shutdown token of one daemon run
struct DaemonService {
    config: Config,
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Binds the fleet and runs the cycles until shutdown
    ///
    /// # Errors
    /// Fails on an invalid configuration, a failed discovery, or when there
    /// are fewer connection strings than discovered devices
    async fn run(&self, simulate: Option<usize>) -> Result<()> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            for e in &errors {
                error!(field = %e.field, message = %e.message, "Invalid configuration");
            }
            bail!("Configuration has {} error(s)", errors.len());
        }

        let connections = self
            .config
            .device_connections()
            .context("Invalid device connection string")?;
        let device_count = simulate.unwrap_or(connections.len());

        let server = &self.config.server;
        let plant = SimulatedPlant::new(&server.namespace_prefix, &server.browse_root, device_count);
        let node_client: Arc<dyn INodeClient> = Arc::new(plant.clone());
        let hub = InMemoryTwinHub::new();
        let alerts = Arc::new(
            EmailAlertGateway::from_config(&self.config.alerts)
                .context("Failed to build alert gateway")?,
        );
        info!(devices = device_count, endpoint = %server.endpoint, "Using simulated plant");

        let devices = discover_devices(node_client.as_ref(), server).await?;

        let mut scheduler =
            FleetScheduler::new(&self.config, node_client, Arc::new(hub), alerts);
        if let Err(e) = scheduler.bind_all(devices, connections).await {
            error!(error = %e, "Cannot bind device fleet");
            return Err(e).context("Failed to bind device fleet");
        }
        if scheduler.bindings().is_empty() {
            warn!("No device is bound, cycles will idle");
        }

        let production = tokio::spawn(simulate_production(
            plant,
            self.config.polling.telemetry_interval(),
            self.shutdown.clone(),
        ));

        scheduler.run(self.shutdown.clone()).await;

        if let Err(e) = production.await {
            error!(error = %e, "Production simulation terminated abnormally");
        }
        Ok(())
    }
}

/// Keeps the simulated devices producing until shutdown
async fn simulate_production(plant: SimulatedPlant, step: Duration, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(step) => plant.advance(),
            _ = shutdown.cancelled() => break,
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Commands
// ============================================================================

async fn execute_run(config: Config, args: &RunArgs) -> Result<()> {
    info!("twinbridge daemon starting (twinbridged)");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown);
    let result = service.run(args.simulate).await;

    match &result {
        Ok(()) => info!("twinbridge daemon shut down gracefully"),
        Err(e) => error!(error = %e, "twinbridge daemon exiting with error"),
    }
    result
}

fn execute_config(command: &ConfigCommand, path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let (path, config) = load_config(path)?;
            let yaml =
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            println!("# {}", path.display());
            print!("{yaml}");
            Ok(())
        }
        ConfigCommand::Validate => {
            let path = path.map_or_else(Config::default_path, Path::to_path_buf);
            let config = Config::load(&path)?;
            let errors = config.validate();
            if errors.is_empty() {
                println!("Configuration is valid ({})", path.display());
                return Ok(());
            }
            for e in &errors {
                println!("  {e}");
            }
            bail!("{} validation error(s) in {}", errors.len(), path.display())
        }
    }
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => {
            let (path, config) = load_config(cli.config.as_deref())?;
            init_tracing(&config, cli.verbose);
            info!(config_path = %path.display(), "Loaded configuration");
            execute_run(config, args).await
        }
        Commands::Config(command) => execute_config(command, cli.config.as_deref()),
    }
}

// ============================================================================
// Tests
// ============================================================================
