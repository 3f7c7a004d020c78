//! Utility functions for the arena service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique connection token
pub fn generate_connection_token() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute distance between two realm indices
pub fn realm_distance(a: i64, b: i64) -> i64 {
    (a - b).abs()
}

/// Check if two realm indices are within the given tolerance
pub fn realms_within_tolerance(a: i64, b: i64, tolerance: i64) -> bool {
    realm_distance(a, b) <= tolerance
}
