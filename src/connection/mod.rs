//! Client connection handles and the identity registry
//!
//! This module owns the seam between the transport layer and the core:
//! the opaque connection handle handed in at accept time, and the
//! bidirectional identity-to-connection registry.

pub mod handle;
pub mod registry;

// Re-export commonly used types
pub use handle::{ClientConnection, ConnectionId, MockConnection, SharedConnection};
pub use registry::{ConnectionEntry, ConnectionRegistry};
