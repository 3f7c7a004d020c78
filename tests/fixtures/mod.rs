//! Test fixtures and helpers for integration testing

use realm_arena::connection::{MockConnection, SharedConnection};
use realm_arena::matchmaking::MatchingConfig;
use realm_arena::metrics::MetricsCollector;
use realm_arena::session::{ClientEventHandler, SessionController};
use realm_arena::types::{Profile, ServerEvent};
use serde_json::{json, Value};
use std::sync::Arc;

/// Create a controller with the reference realm tolerance of 1
pub fn create_test_controller() -> SessionController {
    SessionController::new(
        MatchingConfig::default(),
        Arc::new(MetricsCollector::new().unwrap()),
    )
}

/// Connect a fresh client and return its recording connection
pub async fn connect(controller: &SessionController) -> Arc<MockConnection> {
    let conn = MockConnection::new();
    let shared: SharedConnection = conn.clone();
    controller.handle_connect(shared).await.unwrap();
    conn
}

/// Feed one JSON message from a client into the controller
pub async fn send_json(controller: &SessionController, conn: &Arc<MockConnection>, value: Value) {
    let shared: SharedConnection = conn.clone();
    controller
        .handle_message(&shared, &value.to_string())
        .await
        .unwrap();
}

/// Build a find_match command for a profile
pub fn find_match(id: &str, realm_index: i64) -> Value {
    json!({"type": "find_match", "profile": {"id": id, "realmIndex": realm_index}})
}

/// Build a register command for a profile
pub fn register(id: &str) -> Value {
    json!({"type": "register", "profile": {"id": id}})
}

/// All `info` notice texts a client received, in order
pub fn info_messages(conn: &Arc<MockConnection>) -> Vec<String> {
    conn.sent_events()
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::Info { message } => Some(message),
            _ => None,
        })
        .collect()
}

/// All opponents a client was paired with, in order
pub fn match_found_opponents(conn: &Arc<MockConnection>) -> Vec<Profile> {
    conn.sent_events()
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::MatchFound { opponent } => Some(opponent),
            _ => None,
        })
        .collect()
}

/// All relayed payloads a client received, in order
pub fn received_relays(conn: &Arc<MockConnection>) -> Vec<ServerEvent> {
    conn.sent_events()
        .into_iter()
        .filter(|event| matches!(event, ServerEvent::PvpRelay { .. }))
        .collect()
}
