//! Connection handle abstraction
//!
//! The core never touches sockets directly. The transport hands it a handle
//! with a stable identity, a non-blocking send, and a close signal; everything
//! else about the underlying channel stays on the transport's side of the
//! seam.

use crate::types::ServerEvent;
use crate::utils::generate_connection_token;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Stable, comparable identity for a live connection.
///
/// Assigned once at accept time; map keys throughout the core use this token
/// rather than the handle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh connection identity
    pub fn new() -> Self {
        ConnectionId(generate_connection_token())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a single live client channel.
///
/// `send` and `close` must not block: implementations buffer into the
/// transport's outbound queue and return immediately. A slow or dead peer is
/// surfaced through the transport's own close/error signaling, never by a
/// blocking send.
pub trait ClientConnection: Send + Sync {
    /// Stable identity assigned at accept time
    fn id(&self) -> ConnectionId;

    /// Queue an event for delivery to the remote client
    fn send(&self, event: ServerEvent);

    /// Ask the transport to close the channel with the given code and reason
    fn close(&self, code: u16, reason: &str);

    /// Whether the channel is still believed to be open
    fn is_open(&self) -> bool;
}

/// Shared, type-erased connection handle as stored by the core
pub type SharedConnection = Arc<dyn ClientConnection>;

/// Mock connection for testing
///
/// Records every event and close signal so tests can assert on exactly what
/// a client would have received.
#[derive(Debug)]
pub struct MockConnection {
    id: ConnectionId,
    sent: Mutex<Vec<ServerEvent>>,
    closed: Mutex<Option<(u16, String)>>,
    open: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
            open: AtomicBool::new(true),
        })
    }

    /// All events sent to this connection, in delivery order
    pub fn sent_events(&self) -> Vec<ServerEvent> {
        self.sent.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// The most recently sent event, if any
    pub fn last_event(&self) -> Option<ServerEvent> {
        self.sent.lock().ok().and_then(|events| events.last().cloned())
    }

    /// The close code and reason, if the connection was closed
    pub fn close_signal(&self) -> Option<(u16, String)> {
        self.closed.lock().map(|closed| closed.clone()).unwrap_or(None)
    }

    /// Drop all recorded events (for multi-step tests)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.sent.lock() {
            events.clear();
        }
    }

    /// Simulate the remote side going away without a close frame
    pub fn drop_remote(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl ClientConnection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, event: ServerEvent) {
        if let Ok(mut events) = self.sent.lock() {
            events.push(event);
        }
    }

    fn close(&self, code: u16, reason: &str) {
        self.open.store(false, Ordering::SeqCst);
        if let Ok(mut closed) = self.closed.lock() {
            closed.get_or_insert((code, reason.to_string()));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::notice;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = MockConnection::new();
        let b = MockConnection::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_mock_records_events_in_order() {
        let conn = MockConnection::new();
        conn.send(ServerEvent::welcome());
        conn.send(ServerEvent::info(notice::FINDING_OPPONENT));

        let events = conn.sent_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ServerEvent::welcome());
        assert_eq!(events[1], ServerEvent::info(notice::FINDING_OPPONENT));
    }

    #[test]
    fn test_mock_close_is_sticky() {
        let conn = MockConnection::new();
        assert!(conn.is_open());

        conn.close(1000, "Duplicate login");
        conn.close(1006, "later signal");

        assert!(!conn.is_open());
        assert_eq!(
            conn.close_signal(),
            Some((1000, "Duplicate login".to_string()))
        );
    }
}
