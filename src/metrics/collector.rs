//! Metrics collection using Prometheus

use anyhow::Result;
use prometheus::{IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Main metrics collector for the arena service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Connection lifecycle metrics
    connection_metrics: ConnectionMetrics,

    /// Matchmaking metrics
    matchmaking_metrics: MatchmakingMetrics,

    /// Relay traffic metrics
    relay_metrics: RelayMetrics,
}

/// Connection lifecycle metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Connections currently live
    pub active_connections: IntGauge,

    /// Connections evicted by a duplicate login
    pub duplicate_evictions_total: IntCounter,

    /// Inbound messages that failed to decode
    pub malformed_messages_total: IntCounter,
}

/// Matchmaking metrics
#[derive(Clone)]
pub struct MatchmakingMetrics {
    /// Total find_match requests processed
    pub find_requests_total: IntCounter,

    /// Total pairings made
    pub matches_total: IntCounter,

    /// Total searches canceled by the client
    pub cancels_total: IntCounter,

    /// Clients currently waiting for an opponent
    pub players_waiting: IntGauge,
}

/// Relay traffic metrics
#[derive(Clone)]
pub struct RelayMetrics {
    /// Payloads successfully forwarded
    pub relays_forwarded_total: IntCounter,

    /// Relay attempts rejected because the target was offline
    pub relays_offline_total: IntCounter,
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connections_total = IntCounter::with_opts(Opts::new(
            "arena_connections_total",
            "Total connections accepted",
        ))?;
        let active_connections = IntGauge::with_opts(Opts::new(
            "arena_active_connections",
            "Connections currently live",
        ))?;
        let duplicate_evictions_total = IntCounter::with_opts(Opts::new(
            "arena_duplicate_evictions_total",
            "Connections evicted by a duplicate login",
        ))?;
        let malformed_messages_total = IntCounter::with_opts(Opts::new(
            "arena_malformed_messages_total",
            "Inbound messages that failed to decode",
        ))?;

        registry.register(Box::new(connections_total.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(duplicate_evictions_total.clone()))?;
        registry.register(Box::new(malformed_messages_total.clone()))?;

        Ok(Self {
            connections_total,
            active_connections,
            duplicate_evictions_total,
            malformed_messages_total,
        })
    }
}

impl MatchmakingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let find_requests_total = IntCounter::with_opts(Opts::new(
            "arena_find_requests_total",
            "Total find_match requests processed",
        ))?;
        let matches_total = IntCounter::with_opts(Opts::new(
            "arena_matches_total",
            "Total pairings made",
        ))?;
        let cancels_total = IntCounter::with_opts(Opts::new(
            "arena_cancels_total",
            "Total searches canceled by the client",
        ))?;
        let players_waiting = IntGauge::with_opts(Opts::new(
            "arena_players_waiting",
            "Clients currently waiting for an opponent",
        ))?;

        registry.register(Box::new(find_requests_total.clone()))?;
        registry.register(Box::new(matches_total.clone()))?;
        registry.register(Box::new(cancels_total.clone()))?;
        registry.register(Box::new(players_waiting.clone()))?;

        Ok(Self {
            find_requests_total,
            matches_total,
            cancels_total,
            players_waiting,
        })
    }
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let relays_forwarded_total = IntCounter::with_opts(Opts::new(
            "arena_relays_forwarded_total",
            "Payloads successfully forwarded",
        ))?;
        let relays_offline_total = IntCounter::with_opts(Opts::new(
            "arena_relays_offline_total",
            "Relay attempts rejected because the target was offline",
        ))?;

        registry.register(Box::new(relays_forwarded_total.clone()))?;
        registry.register(Box::new(relays_offline_total.clone()))?;

        Ok(Self {
            relays_forwarded_total,
            relays_offline_total,
        })
    }
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let matchmaking_metrics = MatchmakingMetrics::new(&registry)?;
        let relay_metrics = RelayMetrics::new(&registry)?;

        Ok(Self {
            registry,
            connection_metrics,
            matchmaking_metrics,
            relay_metrics,
        })
    }

    /// Get the underlying Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Direct access to connection metrics
    pub fn connection(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    /// Direct access to matchmaking metrics
    pub fn matchmaking(&self) -> &MatchmakingMetrics {
        &self.matchmaking_metrics
    }

    /// Direct access to relay metrics
    pub fn relay(&self) -> &RelayMetrics {
        &self.relay_metrics
    }

    /// Record a newly accepted connection
    pub fn record_connection_opened(&self) {
        self.connection_metrics.connections_total.inc();
        self.connection_metrics.active_connections.inc();
    }

    /// Record a connection teardown
    pub fn record_connection_closed(&self) {
        self.connection_metrics.active_connections.dec();
    }

    /// Record a duplicate-login eviction
    pub fn record_duplicate_eviction(&self) {
        self.connection_metrics.duplicate_evictions_total.inc();
    }

    /// Record an undecodable inbound message
    pub fn record_malformed_message(&self) {
        self.connection_metrics.malformed_messages_total.inc();
    }

    /// Record a find_match request
    pub fn record_find_request(&self) {
        self.matchmaking_metrics.find_requests_total.inc();
    }

    /// Record a successful pairing
    pub fn record_match(&self) {
        self.matchmaking_metrics.matches_total.inc();
    }

    /// Record a canceled search
    pub fn record_cancel(&self) {
        self.matchmaking_metrics.cancels_total.inc();
    }

    /// Update the waiting-pool depth gauge
    pub fn set_players_waiting(&self, waiting: usize) {
        self.matchmaking_metrics.players_waiting.set(waiting as i64);
    }

    /// Record a forwarded relay payload
    pub fn record_relay_forwarded(&self) {
        self.relay_metrics.relays_forwarded_total.inc();
    }

    /// Record a relay rejected for an offline target
    pub fn record_relay_offline(&self) {
        self.relay_metrics.relays_offline_total.inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics collector with fresh registry")
    }
}
