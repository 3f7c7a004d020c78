//! Metrics and monitoring for the arena service
//!
//! This module provides Prometheus-backed metrics collection for connection,
//! matchmaking, and relay activity.

pub mod collector;

pub use collector::{ConnectionMetrics, MatchmakingMetrics, MetricsCollector, RelayMetrics};
