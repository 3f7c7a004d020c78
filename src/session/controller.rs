//! Connection lifecycle controller and message dispatcher
//!
//! Every inbound event for a connection is processed to completion before the
//! next one touches shared state: the registry and the waiting pool live
//! together behind a single mutex, and no handler awaits while holding it.
//! That keeps the matchmaking state linearizable even with one task per
//! socket. Outbound sends are fire-and-forget; pairing never waits on a
//! remote peer draining its queue.

use crate::connection::handle::{ClientConnection, ConnectionId, SharedConnection};
use crate::connection::registry::ConnectionRegistry;
use crate::error::{ArenaError, Result};
use crate::matchmaking::matcher::{Matchmaker, MatchingConfig};
use crate::matchmaking::pool::{WaitingEntry, WaitingPool};
use crate::metrics::MetricsCollector;
use crate::relay::Relay;
use crate::types::{notice, ClientCommand, Profile, ServerEvent, KNOWN_COMMANDS};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Trait the transport drives with decoded connection events
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// A new connection was accepted
    async fn handle_connect(&self, connection: SharedConnection) -> Result<()>;

    /// A text frame arrived on a connection
    async fn handle_message(&self, connection: &SharedConnection, raw: &str) -> Result<()>;

    /// The connection closed (remote disconnect or local eviction)
    async fn handle_disconnect(&self, connection_id: ConnectionId) -> Result<()>;

    /// The transport signaled an error on the connection
    async fn handle_error(&self, connection_id: ConnectionId) -> Result<()>;
}

/// Statistics about controller operations
#[derive(Debug, Clone, Default)]
pub struct ArenaStats {
    /// Total connections accepted
    pub connections_opened: u64,
    /// Total pairings made
    pub matches_made: u64,
    /// Total relay payloads forwarded
    pub relays_forwarded: u64,
    /// Total connections evicted by duplicate logins
    pub duplicate_evictions: u64,
    /// Current number of live connections
    pub active_connections: usize,
    /// Current number of bound identities
    pub registered_players: usize,
    /// Current number of clients waiting for an opponent
    pub players_waiting: usize,
}

/// All shared mutable state, owned by exactly one lock.
///
/// Pool removal and clearing an entry's `searching` flag always happen under
/// the same guard, so no other handler can observe one without the other.
struct ArenaState {
    registry: ConnectionRegistry,
    pool: WaitingPool,
    connections_opened: u64,
    matches_made: u64,
    relays_forwarded: u64,
    duplicate_evictions: u64,
}

impl ArenaState {
    fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            pool: WaitingPool::new(),
            connections_opened: 0,
            matches_made: 0,
            relays_forwarded: 0,
            duplicate_evictions: 0,
        }
    }
}

/// Result of a find_match request, computed under the state lock
enum FindOutcome {
    Matched {
        opponent: WaitingEntry,
        waiting_now: usize,
    },
    Queued {
        waiting_now: usize,
    },
}

/// The main connection lifecycle controller
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<ArenaState>>,
    matchmaker: Matchmaker,
    metrics: Arc<MetricsCollector>,
}

impl SessionController {
    /// Create a new controller
    pub fn new(config: MatchingConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ArenaState::new())),
            matchmaker: Matchmaker::new(config),
            metrics,
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, ArenaState>> {
        self.state.lock().map_err(|_| {
            ArenaError::InternalError {
                message: "Failed to acquire arena state lock".to_string(),
            }
            .into()
        })
    }

    /// Get current controller statistics
    pub fn get_stats(&self) -> Result<ArenaStats> {
        let state = self.state()?;
        Ok(ArenaStats {
            connections_opened: state.connections_opened,
            matches_made: state.matches_made,
            relays_forwarded: state.relays_forwarded,
            duplicate_evictions: state.duplicate_evictions,
            active_connections: state.registry.len(),
            registered_players: state.registry.bound_count(),
            players_waiting: state.pool.len(),
        })
    }

    fn on_connect(&self, connection: SharedConnection) -> Result<()> {
        let connection_id = connection.id();
        let newly_tracked = {
            let mut state = self.state()?;
            let newly_tracked = state.registry.track(connection.clone());
            if newly_tracked {
                state.connections_opened += 1;
            }
            newly_tracked
        };

        if newly_tracked {
            self.metrics.record_connection_opened();
            info!("Client connected - connection: {}", connection_id);
        }

        connection.send(ServerEvent::welcome());
        Ok(())
    }

    fn on_message(&self, connection: &SharedConnection, raw: &str) -> Result<()> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(
                    "Undecodable frame from {}: {} ({} bytes)",
                    connection.id(),
                    e,
                    raw.len()
                );
                self.metrics.record_malformed_message();
                connection.send(ServerEvent::info(notice::INVALID_JSON));
                return Ok(());
            }
        };

        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) if KNOWN_COMMANDS.contains(&kind) => kind.to_string(),
            _ => {
                connection.send(ServerEvent::info(notice::UNKNOWN_COMMAND));
                return Ok(());
            }
        };

        let command: ClientCommand = match serde_json::from_value(value) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    "Malformed '{}' payload from {}: {}",
                    kind,
                    connection.id(),
                    e
                );
                self.metrics.record_malformed_message();
                connection.send(ServerEvent::info(notice::INVALID_JSON));
                return Ok(());
            }
        };

        match command {
            ClientCommand::Register { profile } => self.on_register(connection, profile),
            ClientCommand::FindMatch { profile } => self.on_find_match(connection, profile),
            ClientCommand::CancelFind => self.on_cancel_find(connection),
            ClientCommand::PvpRelay {
                to,
                session_id,
                kind,
                data,
            } => self.on_relay(connection, to, session_id, kind, data),
        }
    }

    fn on_register(&self, connection: &SharedConnection, profile: Option<Profile>) -> Result<()> {
        let Some(profile) = profile.filter(|profile| !profile.id.is_empty()) else {
            connection.send(ServerEvent::info(notice::MISSING_PROFILE_ID));
            return Ok(());
        };
        let id = profile.id.clone();

        let evicted = {
            let mut state = self.state()?;
            let evicted = state.registry.bind(connection.clone(), &id, profile);
            if evicted.is_some() {
                state.duplicate_evictions += 1;
            }
            evicted
        };

        if evicted.is_some() {
            self.metrics.record_duplicate_eviction();
        }

        info!(
            "Profile '{}' registered on connection {}",
            id,
            connection.id()
        );
        connection.send(ServerEvent::info(notice::PROFILE_REGISTERED));
        Ok(())
    }

    fn on_find_match(&self, connection: &SharedConnection, profile: Option<Profile>) -> Result<()> {
        let Some(profile) = profile.filter(|profile| !profile.id.is_empty()) else {
            connection.send(ServerEvent::info(notice::MISSING_PROFILE_ID));
            return Ok(());
        };
        let id = profile.id.clone();
        let connection_id = connection.id();

        self.metrics.record_find_request();

        let (outcome, evicted) = {
            let mut state = self.state()?;

            // find_match binds identity with the same eviction semantics as
            // register: one live connection per id, always.
            let evicted = state
                .registry
                .bind(connection.clone(), &id, profile.clone());
            if evicted.is_some() {
                state.duplicate_evictions += 1;
            }

            if let Some(entry) = state.registry.entry_mut(connection_id) {
                entry.searching = true;
            }

            let outcome = match self
                .matchmaker
                .find_opponent(&mut state.pool, connection_id, &profile)
            {
                Some(opponent) => {
                    if let Some(entry) = state.registry.entry_mut(opponent.connection_id) {
                        entry.searching = false;
                    }
                    if let Some(entry) = state.registry.entry_mut(connection_id) {
                        entry.searching = false;
                    }
                    state.matches_made += 1;
                    FindOutcome::Matched {
                        opponent,
                        waiting_now: state.pool.len(),
                    }
                }
                None => {
                    state.pool.enqueue(connection.clone(), profile.clone());
                    FindOutcome::Queued {
                        waiting_now: state.pool.len(),
                    }
                }
            };
            (outcome, evicted)
        };

        if evicted.is_some() {
            self.metrics.record_duplicate_eviction();
        }

        match outcome {
            FindOutcome::Matched {
                opponent,
                waiting_now,
            } => {
                info!(
                    "Matched '{}' (realm {}) with '{}' (realm {})",
                    id,
                    profile.realm_index(),
                    opponent.profile.id,
                    opponent.profile.realm_index()
                );
                self.metrics.record_match();
                self.metrics.set_players_waiting(waiting_now);

                opponent.connection.send(ServerEvent::MatchFound {
                    opponent: profile,
                });
                connection.send(ServerEvent::MatchFound {
                    opponent: opponent.profile,
                });
            }
            FindOutcome::Queued { waiting_now } => {
                debug!(
                    "No opponent for '{}' (realm {}), queued at depth {}",
                    id,
                    profile.realm_index(),
                    waiting_now
                );
                self.metrics.set_players_waiting(waiting_now);
                connection.send(ServerEvent::info(notice::FINDING_OPPONENT));
            }
        }
        Ok(())
    }

    fn on_cancel_find(&self, connection: &SharedConnection) -> Result<()> {
        let connection_id = connection.id();

        let waiting_now = {
            let mut state = self.state()?;
            let removed = state.pool.remove(connection_id).is_some();
            if let Some(entry) = state.registry.entry_mut(connection_id) {
                entry.searching = false;
            }
            if removed {
                debug!("Search canceled for connection {}", connection_id);
            }
            state.pool.len()
        };

        self.metrics.record_cancel();
        self.metrics.set_players_waiting(waiting_now);
        connection.send(ServerEvent::info(notice::MATCHMAKING_CANCELED));
        Ok(())
    }

    fn on_relay(
        &self,
        connection: &SharedConnection,
        to: Option<Value>,
        session_id: Value,
        kind: Value,
        data: Value,
    ) -> Result<()> {
        // No target at all is not a relay request; mirror the dispatcher's
        // fall-through for unrecognized input.
        let Some(to) = to else {
            connection.send(ServerEvent::info(notice::UNKNOWN_COMMAND));
            return Ok(());
        };

        let delivery = {
            let mut state = self.state()?;
            let result = match to.as_str() {
                // Identities are strings; anything else never resolves.
                Some(target_id) => Relay::forward(
                    &state.registry,
                    connection.id(),
                    target_id,
                    session_id,
                    kind,
                    data,
                ),
                None => Err(ArenaError::TargetOffline {
                    target: to.to_string(),
                }),
            };
            if result.is_ok() {
                state.relays_forwarded += 1;
            }
            result
        };

        match delivery {
            Ok(()) => {
                self.metrics.record_relay_forwarded();
            }
            Err(ArenaError::TargetOffline { target }) => {
                debug!(
                    "Relay from {} to '{}' dropped: target offline",
                    connection.id(),
                    target
                );
                self.metrics.record_relay_offline();
                connection.send(ServerEvent::info(notice::TARGET_OFFLINE));
            }
            Err(other) => return Err(other.into()),
        }
        Ok(())
    }

    fn on_disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        let (removed, waiting_now) = {
            let mut state = self.state()?;
            state.pool.remove(connection_id);
            let removed = state.registry.remove(connection_id);
            (removed, state.pool.len())
        };

        match removed {
            Some(entry) => {
                info!(
                    "Connection {} torn down (bound id: {:?})",
                    connection_id, entry.bound_id
                );
                self.metrics.record_connection_closed();
                self.metrics.set_players_waiting(waiting_now);
            }
            None => {
                // Close and error can both fire for the same connection;
                // the second signal finds nothing to do.
                debug!("Teardown for unknown connection {} ignored", connection_id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ClientEventHandler for SessionController {
    async fn handle_connect(&self, connection: SharedConnection) -> Result<()> {
        self.on_connect(connection)
    }

    async fn handle_message(&self, connection: &SharedConnection, raw: &str) -> Result<()> {
        self.on_message(connection, raw)
    }

    async fn handle_disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        self.on_disconnect(connection_id)
    }

    async fn handle_error(&self, connection_id: ConnectionId) -> Result<()> {
        self.on_disconnect(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::MockConnection;
    use crate::types::{DUPLICATE_LOGIN_CLOSE_CODE, DUPLICATE_LOGIN_REASON};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn create_test_controller() -> SessionController {
        SessionController::new(
            MatchingConfig::default(),
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    async fn connect(controller: &SessionController) -> Arc<MockConnection> {
        let conn = MockConnection::new();
        let shared: SharedConnection = conn.clone();
        controller.handle_connect(shared).await.unwrap();
        conn
    }

    async fn send(controller: &SessionController, conn: &Arc<MockConnection>, value: Value) {
        let shared: SharedConnection = conn.clone();
        controller
            .handle_message(&shared, &value.to_string())
            .await
            .unwrap();
    }

    fn find_match(id: &str, realm_index: i64) -> Value {
        json!({"type": "find_match", "profile": {"id": id, "realmIndex": realm_index}})
    }

    #[tokio::test]
    async fn test_welcome_on_connect() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;
        assert_eq!(conn.sent_events(), vec![ServerEvent::welcome()]);
    }

    #[tokio::test]
    async fn test_register_binds_identity() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;

        send(
            &controller,
            &conn,
            json!({"type": "register", "profile": {"id": "p1", "realmIndex": 5}}),
        )
        .await;

        assert_eq!(
            conn.last_event().unwrap(),
            ServerEvent::info(notice::PROFILE_REGISTERED)
        );
        let stats = controller.get_stats().unwrap();
        assert_eq!(stats.registered_players, 1);
    }

    #[tokio::test]
    async fn test_register_without_id_changes_nothing() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;

        send(
            &controller,
            &conn,
            json!({"type": "register", "profile": {"realmIndex": 5}}),
        )
        .await;
        send(&controller, &conn, json!({"type": "register"})).await;
        send(
            &controller,
            &conn,
            json!({"type": "register", "profile": {"id": ""}}),
        )
        .await;

        let events = conn.sent_events();
        assert_eq!(events.len(), 4); // welcome + three notices
        for event in &events[1..] {
            assert_eq!(*event, ServerEvent::info(notice::MISSING_PROFILE_ID));
        }
        assert_eq!(controller.get_stats().unwrap().registered_players, 0);
    }

    #[tokio::test]
    async fn test_invalid_json_notice() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;
        let shared: SharedConnection = conn.clone();

        controller
            .handle_message(&shared, "{not json")
            .await
            .unwrap();

        assert_eq!(
            conn.last_event().unwrap(),
            ServerEvent::info(notice::INVALID_JSON)
        );
    }

    #[tokio::test]
    async fn test_unknown_command_notice() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;

        send(&controller, &conn, json!({"type": "dance"})).await;
        send(&controller, &conn, json!({"no_type": true})).await;
        send(&controller, &conn, json!("just a string")).await;

        let events = conn.sent_events();
        for event in &events[1..] {
            assert_eq!(*event, ServerEvent::info(notice::UNKNOWN_COMMAND));
        }
    }

    #[tokio::test]
    async fn test_compatible_profiles_match_in_request_order() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(&controller, &x, find_match("p1", 5)).await;
        send(&controller, &y, find_match("p2", 6)).await;

        // X: welcome, then the queue notice, then the pairing.
        let x_events = x.sent_events();
        assert_eq!(x_events[1], ServerEvent::info(notice::FINDING_OPPONENT));
        match &x_events[2] {
            ServerEvent::MatchFound { opponent } => {
                assert_eq!(opponent.id, "p2");
                assert_eq!(opponent.realm_index(), 6);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // Y pairs synchronously: welcome then match_found, no queue notice.
        let y_events = y.sent_events();
        assert_eq!(y_events.len(), 2);
        match &y_events[1] {
            ServerEvent::MatchFound { opponent } => {
                assert_eq!(opponent.id, "p1");
                assert_eq!(opponent.realm_index(), 5);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let stats = controller.get_stats().unwrap();
        assert_eq!(stats.matches_made, 1);
        assert_eq!(stats.players_waiting, 0);
    }

    #[tokio::test]
    async fn test_incompatible_profiles_both_stay_queued() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(&controller, &x, find_match("p1", 1)).await;
        send(&controller, &y, find_match("p2", 9)).await;

        assert_eq!(
            x.last_event().unwrap(),
            ServerEvent::info(notice::FINDING_OPPONENT)
        );
        assert_eq!(
            y.last_event().unwrap(),
            ServerEvent::info(notice::FINDING_OPPONENT)
        );

        let stats = controller.get_stats().unwrap();
        assert_eq!(stats.matches_made, 0);
        assert_eq!(stats.players_waiting, 2);
    }

    #[tokio::test]
    async fn test_cancel_find_prevents_later_match() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(&controller, &x, find_match("p1", 5)).await;
        send(&controller, &x, json!({"type": "cancel_find"})).await;
        assert_eq!(
            x.last_event().unwrap(),
            ServerEvent::info(notice::MATCHMAKING_CANCELED)
        );

        send(&controller, &y, find_match("p2", 5)).await;
        assert_eq!(
            y.last_event().unwrap(),
            ServerEvent::info(notice::FINDING_OPPONENT)
        );
        assert_eq!(controller.get_stats().unwrap().players_waiting, 1);
    }

    #[tokio::test]
    async fn test_cancel_find_when_not_searching_is_harmless() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;

        send(&controller, &conn, json!({"type": "cancel_find"})).await;
        assert_eq!(
            conn.last_event().unwrap(),
            ServerEvent::info(notice::MATCHMAKING_CANCELED)
        );
    }

    #[tokio::test]
    async fn test_duplicate_login_evicts_and_retargets_relay() {
        let controller = create_test_controller();
        let first = connect(&controller).await;
        let second = connect(&controller).await;
        let sender = connect(&controller).await;

        send(
            &controller,
            &first,
            json!({"type": "register", "profile": {"id": "p1"}}),
        )
        .await;
        send(
            &controller,
            &second,
            json!({"type": "register", "profile": {"id": "p1"}}),
        )
        .await;

        assert_eq!(
            first.close_signal(),
            Some((DUPLICATE_LOGIN_CLOSE_CODE, DUPLICATE_LOGIN_REASON.to_string()))
        );

        send(
            &controller,
            &sender,
            json!({"type": "register", "profile": {"id": "p3"}}),
        )
        .await;
        send(
            &controller,
            &sender,
            json!({"type": "pvp_relay", "to": "p1", "sessionId": "s1", "kind": "hello", "data": null}),
        )
        .await;

        // Only the newer binding receives the payload.
        assert!(matches!(
            second.last_event().unwrap(),
            ServerEvent::PvpRelay { .. }
        ));
        assert!(!first
            .sent_events()
            .iter()
            .any(|event| matches!(event, ServerEvent::PvpRelay { .. })));
    }

    #[tokio::test]
    async fn test_relay_passes_data_through_unmodified() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(
            &controller,
            &x,
            json!({"type": "register", "profile": {"id": "p1"}}),
        )
        .await;
        send(
            &controller,
            &y,
            json!({"type": "register", "profile": {"id": "p2"}}),
        )
        .await;

        let data = json!({"zeta": 1, "alpha": {"nested": [1, 2, 3]}, "mid": "x"});
        send(
            &controller,
            &x,
            json!({"type": "pvp_relay", "to": "p2", "sessionId": "s1", "kind": "move", "data": data}),
        )
        .await;

        match y.last_event().unwrap() {
            ServerEvent::PvpRelay {
                from,
                session_id,
                kind,
                data: delivered,
            } => {
                assert_eq!(from, Some("p1".to_string()));
                assert_eq!(session_id, json!("s1"));
                assert_eq!(kind, json!("move"));
                assert_eq!(
                    serde_json::to_string(&delivered).unwrap(),
                    serde_json::to_string(&data).unwrap()
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relay_to_offline_target_notifies_sender_only() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;

        send(
            &controller,
            &conn,
            json!({"type": "pvp_relay", "to": "ghost", "sessionId": 1, "kind": "k", "data": {}}),
        )
        .await;

        assert_eq!(
            conn.last_event().unwrap(),
            ServerEvent::info(notice::TARGET_OFFLINE)
        );
        assert_eq!(controller.get_stats().unwrap().relays_forwarded, 0);
    }

    #[tokio::test]
    async fn test_relay_without_target_field_is_unknown_command() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;

        send(&controller, &conn, json!({"type": "pvp_relay"})).await;
        assert_eq!(
            conn.last_event().unwrap(),
            ServerEvent::info(notice::UNKNOWN_COMMAND)
        );
    }

    #[tokio::test]
    async fn test_relay_from_unregistered_sender_omits_from() {
        let controller = create_test_controller();
        let sender = connect(&controller).await;
        let target = connect(&controller).await;

        send(
            &controller,
            &target,
            json!({"type": "register", "profile": {"id": "p2"}}),
        )
        .await;
        send(
            &controller,
            &sender,
            json!({"type": "pvp_relay", "to": "p2", "sessionId": null, "kind": null, "data": null}),
        )
        .await;

        match target.last_event().unwrap() {
            ServerEvent::PvpRelay { from, .. } => assert!(from.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let controller = create_test_controller();
        let conn = connect(&controller).await;
        send(&controller, &conn, find_match("p1", 5)).await;

        controller.handle_disconnect(conn.id()).await.unwrap();
        let after_first = controller.get_stats().unwrap();
        assert_eq!(after_first.active_connections, 0);
        assert_eq!(after_first.players_waiting, 0);
        assert_eq!(after_first.registered_players, 0);

        // A late error signal for the same connection finds nothing to do.
        assert_ok!(controller.handle_error(conn.id()).await);
        let after_second = controller.get_stats().unwrap();
        assert_eq!(after_second.active_connections, 0);
        assert_eq!(after_second.players_waiting, 0);
        assert_eq!(after_second.registered_players, 0);
    }

    #[tokio::test]
    async fn test_evicted_teardown_preserves_new_binding() {
        let controller = create_test_controller();
        let old = connect(&controller).await;
        let new = connect(&controller).await;
        let sender = connect(&controller).await;

        send(
            &controller,
            &old,
            json!({"type": "register", "profile": {"id": "p1"}}),
        )
        .await;
        send(
            &controller,
            &new,
            json!({"type": "register", "profile": {"id": "p1"}}),
        )
        .await;

        // The evicted connection's close handler races the rebind; its
        // teardown must leave the new binding alone.
        controller.handle_disconnect(old.id()).await.unwrap();

        send(
            &controller,
            &sender,
            json!({"type": "pvp_relay", "to": "p1", "sessionId": null, "kind": null, "data": null}),
        )
        .await;
        assert!(matches!(
            new.last_event().unwrap(),
            ServerEvent::PvpRelay { .. }
        ));
    }

    #[tokio::test]
    async fn test_register_while_searching_keeps_pool_entry() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(&controller, &x, find_match("p1", 5)).await;
        send(
            &controller,
            &x,
            json!({"type": "register", "profile": {"id": "p1", "realmIndex": 5, "title": "renamed"}}),
        )
        .await;
        assert_eq!(controller.get_stats().unwrap().players_waiting, 1);

        send(&controller, &y, find_match("p2", 6)).await;

        // The search survives the re-register; the pairing uses the profile
        // captured when the search started.
        match y.last_event().unwrap() {
            ServerEvent::MatchFound { opponent } => {
                assert_eq!(opponent.id, "p1");
                assert!(opponent.extra.get("title").is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeat_find_match_refreshes_profile() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(&controller, &x, find_match("p1", 1)).await;
        send(&controller, &x, find_match("p1", 9)).await;
        assert_eq!(controller.get_stats().unwrap().players_waiting, 1);

        send(&controller, &y, find_match("p2", 9)).await;
        match y.last_event().unwrap() {
            ServerEvent::MatchFound { opponent } => assert_eq!(opponent.realm_index(), 9),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_tracking() {
        let controller = create_test_controller();
        let x = connect(&controller).await;
        let y = connect(&controller).await;

        send(&controller, &x, find_match("p1", 5)).await;
        send(&controller, &y, find_match("p2", 5)).await;
        send(
            &controller,
            &x,
            json!({"type": "pvp_relay", "to": "p2", "sessionId": null, "kind": null, "data": null}),
        )
        .await;

        let stats = controller.get_stats().unwrap();
        assert_eq!(stats.connections_opened, 2);
        assert_eq!(stats.matches_made, 1);
        assert_eq!(stats.relays_forwarded, 1);
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.registered_players, 2);
    }
}
