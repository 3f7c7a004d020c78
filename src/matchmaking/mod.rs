//! Waiting pool and pairing algorithm
//!
//! This module handles the set of connections currently seeking an opponent
//! and the realm-proximity pairing logic that runs over it.

pub mod matcher;
pub mod pool;

// Re-export commonly used types
pub use matcher::{Matchmaker, MatchingConfig};
pub use pool::{WaitingEntry, WaitingPool};
