//! Best-effort relay of opaque payloads between bound identities
//!
//! The relay is a pure forwarding primitive: it resolves the target id,
//! checks liveness, and passes `sessionId`/`kind`/`data` through untouched.
//! "Session" is caller-supplied correlation data, not relay state; there is
//! no queuing and no retry.

use crate::connection::handle::{ClientConnection, ConnectionId};
use crate::connection::registry::ConnectionRegistry;
use crate::error::ArenaError;
use crate::types::ServerEvent;
use serde_json::Value;
use tracing::debug;

/// Forwarding primitive between two identified connections
pub struct Relay;

impl Relay {
    /// Forward a payload from `sender` to the connection bound to `target_id`.
    ///
    /// The delivered event carries the sender's bound id (omitted when the
    /// sender never bound one), never the sender's full profile. Fails with
    /// [`ArenaError::TargetOffline`] when the target id is unbound or its
    /// connection is no longer open; nothing is delivered in that case.
    pub fn forward(
        registry: &ConnectionRegistry,
        sender: ConnectionId,
        target_id: &str,
        session_id: Value,
        kind: Value,
        data: Value,
    ) -> Result<(), ArenaError> {
        let target = registry
            .lookup(target_id)
            .filter(|connection| connection.is_open())
            .ok_or_else(|| ArenaError::TargetOffline {
                target: target_id.to_string(),
            })?;

        let from = registry
            .entry_for(sender)
            .and_then(|entry| entry.bound_id.clone());

        debug!(
            "Relaying payload from {} ({:?}) to '{}'",
            sender, from, target_id
        );

        target.send(ServerEvent::PvpRelay {
            from,
            session_id,
            kind,
            data,
        });
        Ok(())
    }
}
