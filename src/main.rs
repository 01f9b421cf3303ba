//! dynamic-mqtt - Main Entry Point
//!
//! Loads a TOML configuration, wires the connection manager to a real
//! `rumqttc` session and drives it from a fixed-interval loop until SIGINT
//! or SIGTERM.

use clap::{Parser, Subcommand};
use dynamic_mqtt::config::{DynamicMqttConfig, MessageLogLevel};
use dynamic_mqtt::observability::init_default_logging;
use dynamic_mqtt::transport::mqtt::RumqttSession;
use dynamic_mqtt::{AlwaysUp, ConnectionManager, MonotonicClock};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, trace, warn, Level};

const DEFAULT_CONFIG_PATHS: &[&str] = &["dynamic-mqtt.toml", "config/dynamic-mqtt.toml"];

/// TLS MQTT connection manager
#[derive(Parser)]
#[command(name = "dynamic-mqtt")]
#[command(about = "Keeps a TLS MQTT session alive and logs subscribed messages")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and run until interrupted
    Run,
    /// Validate the configuration
    Config {
        /// Print the parsed configuration with secrets redacted
        #[arg(long)]
        show: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let min_level = match cli.verbose {
        0 => None,
        1 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };
    if let Err(e) = init_default_logging(min_level) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!("Starting dynamic-mqtt v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run(config),
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<DynamicMqttConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DynamicMqttConfig::load_from_file(path)?);
    }

    for path in DEFAULT_CONFIG_PATHS.iter().map(Path::new) {
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DynamicMqttConfig::load_from_file(path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create dynamic-mqtt.toml".into())
}

fn run(config: DynamicMqttConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    flag::register(SIGTERM, Arc::clone(&shutdown))?;

    let session = RumqttSession::new(config.runtime.connect_timeout());
    let mut manager = ConnectionManager::new(session, AlwaysUp, MonotonicClock::new());
    manager.configure(
        config.broker.clone(),
        config.tls.clone(),
        config.credentials.to_credentials(),
    )?;
    for entry in &config.on_message {
        manager.register_subscription(entry.topic.clone(), message_logger(entry.log_level));
    }
    manager.initialize()?;

    info!(
        host = %config.broker.host,
        port = config.broker.port,
        "Running; press Ctrl-C to stop"
    );

    let interval = config.runtime.loop_interval();
    while !shutdown.load(Ordering::Relaxed) {
        manager.tick();
        thread::sleep(interval);
    }

    let stats = manager.stats();
    info!(
        connect_attempts = stats.connect_attempts,
        successful_connects = stats.successful_connects,
        sessions_lost = stats.sessions_lost,
        messages_dispatched = stats.messages_dispatched,
        "Received shutdown signal"
    );
    Ok(())
}

/// Handler that logs every message on its topic at `level`
fn message_logger(level: MessageLogLevel) -> impl FnMut(&str, &str) + 'static {
    move |topic: &str, payload: &str| match level {
        MessageLogLevel::Trace => trace!(topic, payload, "Message received"),
        MessageLogLevel::Debug => debug!(topic, payload, "Message received"),
        MessageLogLevel::Info => info!(topic, payload, "Message received"),
        MessageLogLevel::Warn => warn!(topic, payload, "Message received"),
    }
}

fn handle_config_command(
    config: &DynamicMqttConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config.redacted())?);
    }

    info!("Configuration validation complete");
    Ok(())
}
