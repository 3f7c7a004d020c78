//! Error types for the matchmaking and relay service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and relay scenarios
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("Invalid client message: {reason}")]
    InvalidClientMessage { reason: String },

    #[error("Missing profile id")]
    MissingProfileId,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Relay target offline: {target}")]
    TargetOffline { target: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
