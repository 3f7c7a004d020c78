//! Realm Arena - realtime matchmaking and PvP relay service
//!
//! This crate provides WebSocket-based matchmaking with identity
//! registration, realm-proximity pairing, and opaque session relay between
//! paired clients.

pub mod config;
pub mod connection;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod relay;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ArenaError, Result};
pub use types::*;

// Re-export key components
pub use connection::{ClientConnection, ConnectionId, ConnectionRegistry};
pub use matchmaking::{Matchmaker, MatchingConfig, WaitingPool};
pub use session::{ClientEventHandler, SessionController};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
