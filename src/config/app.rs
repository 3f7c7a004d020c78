//! Main application configuration
//!
//! This module defines the primary configuration structures for the arena
//! service, including environment variable loading and validation.

use crate::matchmaking::matcher::MatchingConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and health reporting
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Listener settings for the WebSocket/HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Address to bind the listener to
    pub bind_address: String,
    /// Port for WebSocket upgrades, health, and metrics
    pub port: u16,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Maximum realm-index distance allowed for a pairing
    pub max_realm_difference: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "realm-arena".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            max_realm_difference: 1,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Transport settings (PORT wins over WS_PORT when both are set)
        if let Ok(bind) = env::var("BIND_ADDRESS") {
            config.transport.bind_address = bind;
        }
        if let Ok(port) = env::var("PORT").or_else(|_| env::var("WS_PORT")) {
            config.transport.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }

        // Matchmaking settings
        if let Ok(max_diff) = env::var("MAX_REALM_DIFFERENCE") {
            config.matchmaking.max_realm_difference = max_diff
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_REALM_DIFFERENCE value: {}", max_diff))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the listener socket address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.transport.bind_address, self.transport.port)
            .parse()
            .map_err(|e| {
                anyhow!(
                    "Invalid listen address {}:{}: {}",
                    self.transport.bind_address,
                    self.transport.port,
                    e
                )
            })
    }

    /// Get the matchmaking configuration for the pairing algorithm
    pub fn matching_config(&self) -> MatchingConfig {
        MatchingConfig {
            max_realm_difference: self.matchmaking.max_realm_difference,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.transport.port == 0 {
        return Err(anyhow!("Transport port cannot be 0"));
    }
    if config.transport.bind_address.is_empty() {
        return Err(anyhow!("Bind address cannot be empty"));
    }

    if config.matchmaking.max_realm_difference < 0 {
        return Err(anyhow!("Max realm difference cannot be negative"));
    }

    Ok(())
}
