//! Common types used throughout the arena service

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier a client binds to its connection
pub type PlayerId = String;

/// Close code sent when a newer connection claims an already-bound id
pub const DUPLICATE_LOGIN_CLOSE_CODE: u16 = 1000;

/// Close reason sent alongside [`DUPLICATE_LOGIN_CLOSE_CODE`]
pub const DUPLICATE_LOGIN_REASON: &str = "Duplicate login";

/// Notice strings delivered to clients via `welcome`/`info` events
pub mod notice {
    pub const WELCOME: &str = "Connected to matchmaking server.";
    pub const INVALID_JSON: &str = "Invalid JSON.";
    pub const MISSING_PROFILE_ID: &str = "Missing profile id.";
    pub const PROFILE_REGISTERED: &str = "Profile registered.";
    pub const FINDING_OPPONENT: &str = "Finding opponent...";
    pub const MATCHMAKING_CANCELED: &str = "Matchmaking canceled.";
    pub const TARGET_OFFLINE: &str = "Target offline.";
    pub const UNKNOWN_COMMAND: &str = "Unknown command.";
}

/// Identity and attribute bundle a client presents on register/find_match.
///
/// Only `id` and `realmIndex` are interpreted; everything else rides along
/// untouched so clients can attach display names, cosmetics, and so on
/// without the server dropping them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable client-chosen identifier. Empty means "not provided".
    #[serde(default)]
    pub id: PlayerId,

    /// Compatibility coordinate; two profiles are matchable iff their
    /// realm indices are within the configured tolerance.
    #[serde(
        rename = "realmIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub realm_index: Option<i64>,

    /// Uninterpreted extra fields, preserved verbatim when echoed back.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Profile {
    /// Effective realm index, treating an absent value as 0.
    pub fn realm_index(&self) -> i64 {
        self.realm_index.unwrap_or(0)
    }
}

/// Inbound client commands, dispatched by the `type` discriminator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Bind an identity to this connection
    Register {
        #[serde(default)]
        profile: Option<Profile>,
    },
    /// Enter the waiting pool (or match immediately)
    FindMatch {
        #[serde(default)]
        profile: Option<Profile>,
    },
    /// Leave the waiting pool
    CancelFind,
    /// Forward an opaque payload to another bound identity
    PvpRelay {
        /// Target identity; a non-string value never resolves
        #[serde(default)]
        to: Option<Value>,
        #[serde(rename = "sessionId", default)]
        session_id: Value,
        #[serde(default)]
        kind: Value,
        #[serde(default)]
        data: Value,
    },
}

/// Command `type` values the dispatcher recognizes
pub const KNOWN_COMMANDS: [&str; 4] = ["register", "find_match", "cancel_find", "pvp_relay"];

/// Outbound server events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Greeting sent once per connection
    Welcome { message: String },
    /// Acknowledgements and error notices
    Info { message: String },
    /// Pairing succeeded; carries the other party's profile
    MatchFound { opponent: Profile },
    /// Relayed payload from another client
    PvpRelay {
        /// Sender's bound id; omitted when the sender never bound one
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<PlayerId>,
        #[serde(rename = "sessionId")]
        session_id: Value,
        kind: Value,
        data: Value,
    },
}

impl ServerEvent {
    /// Shorthand for an `info` notice
    pub fn info(message: &str) -> Self {
        ServerEvent::Info {
            message: message.to_string(),
        }
    }

    /// Shorthand for the connect greeting
    pub fn welcome() -> Self {
        ServerEvent::Welcome {
            message: notice::WELCOME.to_string(),
        }
    }
}
