//! Health check reporting
//!
//! This module provides health check functionality for the arena service,
//! suitable both for the HTTP health endpoint and the CLI health-check mode.

use crate::session::controller::SessionController;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Connections currently live
    pub active_connections: usize,
    /// Identities currently bound
    pub registered_players: usize,
    /// Clients currently waiting for an opponent
    pub players_waiting: usize,
    /// Pairings made since service start
    pub matches_made: u64,
    /// Relay payloads forwarded since service start
    pub relays_forwarded: u64,
    /// Service uptime information
    pub uptime_info: String,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self {
            active_connections: 0,
            registered_players: 0,
            players_waiting: 0,
            matches_made: 0,
            relays_forwarded: 0,
            uptime_info: "Service running".to_string(),
        }
    }
}

impl HealthCheck {
    /// Evaluate service health from the live controller state
    pub fn evaluate(
        controller: &SessionController,
        service_name: &str,
        started_at: DateTime<Utc>,
    ) -> Self {
        let start = std::time::Instant::now();
        let mut checks = Vec::new();

        let (arena_status, arena_message, stats) = match controller.get_stats() {
            Ok(arena_stats) => {
                let uptime_seconds = (Utc::now() - started_at).num_seconds().max(0);
                let stats = ServiceStats {
                    active_connections: arena_stats.active_connections,
                    registered_players: arena_stats.registered_players,
                    players_waiting: arena_stats.players_waiting,
                    matches_made: arena_stats.matches_made,
                    relays_forwarded: arena_stats.relays_forwarded,
                    uptime_info: format!("Up {}s", uptime_seconds),
                };
                (HealthStatus::Healthy, None, stats)
            }
            Err(e) => {
                error!("Arena state check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("State check failed: {}", e)),
                    ServiceStats::default(),
                )
            }
        };

        checks.push(ComponentCheck {
            name: "arena_state".to_string(),
            status: arena_status.clone(),
            message: arena_message,
            duration_ms: start.elapsed().as_millis() as u64,
        });

        HealthCheck {
            status: arena_status,
            service: service_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            checks,
            stats,
        }
    }

    /// Convert health check to a pretty JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
