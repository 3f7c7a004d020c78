//! Per-connection lifecycle control and message dispatch
//!
//! This module composes the registry, waiting pool, matchmaker, and relay
//! into the state machine each connection walks through:
//! `Connected -> Registered -> Searching <-> Registered -> Disconnected`.

pub mod controller;

// Re-export commonly used types
pub use controller::{ArenaStats, ClientEventHandler, SessionController};
