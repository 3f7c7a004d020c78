//! Main entry point for the Realm Arena matchmaking service
//!
//! This is the production entry point that initializes and runs the
//! complete matchmaking and relay service with proper error handling,
//! logging, and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use realm_arena::config::AppConfig;
use realm_arena::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Realm Arena Matchmaking Service - realtime pairing and PvP relay
#[derive(Parser)]
#[command(
    name = "realm-arena",
    version,
    about = "A realtime WebSocket matchmaking and PvP relay service",
    long_about = "Realm Arena is a Rust-based matchmaking service: clients connect over \
                 WebSocket, register a profile, get paired against waiting opponents by \
                 realm-index proximity, and exchange opaque session messages relayed \
                 through the server."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Listener port override
    #[arg(short, long, value_name = "PORT", help = "Override listener port")]
    port: Option<u16>,

    /// Bind address override
    #[arg(long, value_name = "ADDR", help = "Override listener bind address")]
    bind_address: Option<String>,

    /// Realm tolerance override
    #[arg(
        long,
        value_name = "N",
        help = "Override maximum realm-index difference for pairing"
    )]
    max_realm_difference: Option<i64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without starting service")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config).await?;
    let health = HealthCheck::evaluate(
        app_state.controller(),
        &app_state.config().service.name,
        app_state.started_at(),
    );

    println!("Health Check: {}", health.status);
    println!("  Active Connections: {}", health.stats.active_connections);
    println!("  Registered Players: {}", health.stats.registered_players);
    println!("  Players Waiting: {}", health.stats.players_waiting);
    println!("  Matches Made: {}", health.stats.matches_made);
    println!("  Relays Forwarded: {}", health.stats.relays_forwarded);
    println!("  Uptime: {}", health.stats.uptime_info);

    if health.status == HealthStatus::Healthy {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Realm Arena Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Listener: {}:{}",
        config.transport.bind_address, config.transport.port
    );
    info!(
        "   Max realm difference: {}",
        config.matchmaking.max_realm_difference
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(port) = args.port {
        config.transport.port = port;
    }

    if let Some(bind_address) = &args.bind_address {
        config.transport.bind_address = bind_address.clone();
    }

    if let Some(max_diff) = args.max_realm_difference {
        config.matchmaking.max_realm_difference = max_diff;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Handle special modes
    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    // Display startup information
    display_startup_banner(&config);

    // Initialize application state
    info!("Initializing service components...");
    let app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    // Start the service
    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Realm Arena Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    // Wait for shutdown signal
    wait_for_shutdown_signal().await;

    // Begin graceful shutdown
    info!("Shutdown signal received, beginning graceful shutdown...");

    if let Err(e) = app_state.stop().await {
        warn!("Error during shutdown: {}", e);
    }

    info!("Realm Arena Matchmaking Service stopped");
    Ok(())
}
