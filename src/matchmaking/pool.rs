//! Waiting pool of connections seeking an opponent
//!
//! A deliberately simple structure: an insertion-ordered sequence scanned
//! linearly on each new search. Insertion order is the only priority; the
//! pool is sized for a small number of concurrently-waiting clients and does
//! not attempt fairness beyond first-come-first-considered.

use crate::connection::handle::{ClientConnection, ConnectionId, SharedConnection};
use crate::types::Profile;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// A connection waiting for an opponent, with the profile it searched with
pub struct WaitingEntry {
    pub connection_id: ConnectionId,
    pub connection: SharedConnection,
    pub profile: Profile,
    pub enqueued_at: DateTime<Utc>,
}

/// Insertion-ordered pool of waiting connections.
///
/// Invariant: a given connection appears at most once.
#[derive(Default)]
pub struct WaitingPool {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the tail of the pool.
    ///
    /// Idempotent re-enqueue: any pre-existing entry for the same connection
    /// is removed first, so a repeated search refreshes the stored profile
    /// and moves the waiter to the back of the line.
    pub fn enqueue(&mut self, connection: SharedConnection, profile: Profile) {
        let connection_id = connection.id();
        self.remove(connection_id);
        self.entries.push_back(WaitingEntry {
            connection_id,
            connection,
            profile,
            enqueued_at: current_timestamp(),
        });
    }

    /// Remove the entry for a connection, if present.
    ///
    /// Safe to call for connections that were never enqueued.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<WaitingEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.connection_id == connection_id)?;
        self.entries.remove(index)
    }

    /// Scan in insertion order and remove the first compatible entry.
    ///
    /// The candidate's own entry is skipped (self-match is impossible). On a
    /// miss the pool is left unchanged.
    pub fn scan_and_remove_first_match<F>(
        &mut self,
        candidate_id: ConnectionId,
        candidate: &Profile,
        is_compatible: F,
    ) -> Option<WaitingEntry>
    where
        F: Fn(&Profile, &Profile) -> bool,
    {
        let index = self.entries.iter().position(|entry| {
            entry.connection_id != candidate_id && is_compatible(&entry.profile, candidate)
        })?;
        self.entries.remove(index)
    }

    /// Whether a connection currently has a pool entry
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
