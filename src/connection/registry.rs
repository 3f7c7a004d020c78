//! Identity registry binding player ids to live connections
//!
//! The registry is plain owned data; serialization of access is the
//! responsibility of the lifecycle controller, which keeps it (together with
//! the waiting pool) behind a single lock.

use crate::connection::handle::{ClientConnection, ConnectionId, SharedConnection};
use crate::types::{PlayerId, Profile, DUPLICATE_LOGIN_CLOSE_CODE, DUPLICATE_LOGIN_REASON};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Per-connection bookkeeping record.
///
/// Exactly one entry exists per live connection. The entry outlives nothing:
/// it is destroyed when the connection closes or errors.
pub struct ConnectionEntry {
    /// Handle to the live channel
    pub connection: SharedConnection,
    /// Identity bound via register/find_match, if any
    pub bound_id: Option<PlayerId>,
    /// Most recently presented profile (latest write wins)
    pub last_profile: Option<Profile>,
    /// Whether this connection currently has a waiting-pool entry
    pub searching: bool,
    /// When the transport announced this connection
    pub connected_at: DateTime<Utc>,
}

impl ConnectionEntry {
    fn new(connection: SharedConnection) -> Self {
        Self {
            connection,
            bound_id: None,
            last_profile: None,
            searching: false,
            connected_at: current_timestamp(),
        }
    }
}

/// Bidirectional mapping between connections and bound identities.
///
/// Invariants:
/// - at most one live connection is bound to a given id; binding a second
///   connection evicts (closes) the previous one before installing the new
///   binding;
/// - every id in the index resolves to an entry currently carrying that id.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: HashMap<ConnectionId, ConnectionEntry>,
    ids: HashMap<PlayerId, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure an entry exists for a connection the transport just announced.
    ///
    /// Idempotent: a second announcement for the same connection keeps the
    /// existing entry untouched. Returns whether a new entry was created.
    pub fn track(&mut self, connection: SharedConnection) -> bool {
        match self.entries.entry(connection.id()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(ConnectionEntry::new(connection));
                true
            }
        }
    }

    /// Bind `id` to `connection`, storing `profile` on its entry.
    ///
    /// If `id` is currently bound to a *different* live connection, that
    /// connection is closed with the duplicate-login code before the new
    /// binding replaces it; the evicted handle is returned so the caller can
    /// record the event. Rebinding the same connection under a new id drops
    /// its previous id mapping. Never fails; empty ids are rejected upstream.
    pub fn bind(
        &mut self,
        connection: SharedConnection,
        id: &str,
        profile: Profile,
    ) -> Option<SharedConnection> {
        let connection_id = connection.id();

        let evicted = match self.ids.get(id) {
            Some(existing) if *existing != connection_id => {
                self.entries.get(existing).map(|entry| entry.connection.clone())
            }
            _ => None,
        };

        if let Some(old) = &evicted {
            info!(
                "Evicting connection {} bound to '{}' in favor of {}",
                old.id(),
                id,
                connection_id
            );
            if old.is_open() {
                old.close(DUPLICATE_LOGIN_CLOSE_CODE, DUPLICATE_LOGIN_REASON);
            }
        }

        let entry = self
            .entries
            .entry(connection_id)
            .or_insert_with(|| ConnectionEntry::new(connection));

        // A connection switching identities must not leave its old id
        // pointing at it.
        if let Some(previous) = entry.bound_id.take() {
            if previous != id && self.ids.get(&previous) == Some(&connection_id) {
                self.ids.remove(&previous);
            }
        }

        entry.bound_id = Some(id.to_string());
        entry.last_profile = Some(profile);
        self.ids.insert(id.to_string(), connection_id);

        evicted
    }

    /// Resolve a bound id to its live connection
    pub fn lookup(&self, id: &str) -> Option<SharedConnection> {
        self.ids
            .get(id)
            .and_then(|connection_id| self.entries.get(connection_id))
            .map(|entry| entry.connection.clone())
    }

    /// Entry for a connection, if it is still tracked
    pub fn entry_for(&self, connection_id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&connection_id)
    }

    /// Mutable entry for a connection, if it is still tracked
    pub fn entry_mut(&mut self, connection_id: ConnectionId) -> Option<&mut ConnectionEntry> {
        self.entries.get_mut(&connection_id)
    }

    /// Remove all traces of a connection.
    ///
    /// The id mapping is deleted only when it still points at *this exact*
    /// connection: a duplicate login racing a slow close of the evicted
    /// connection must not clobber the newer binding. Safe to call twice.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        let entry = self.entries.remove(&connection_id)?;

        if let Some(id) = &entry.bound_id {
            if self.ids.get(id) == Some(&connection_id) {
                self.ids.remove(id);
                debug!("Released id '{}' held by connection {}", id, connection_id);
            }
        }

        Some(entry)
    }

    /// Number of tracked connections
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of bound identities
    pub fn bound_count(&self) -> usize {
        self.ids.len()
    }
}
