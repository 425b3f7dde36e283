//! Viera Bridge Shared Types
//!
//! This crate provides the declarative pieces of the bridge: the remote key
//! table, the wake-packet codec, the session connection state machine and
//! the entity payloads exchanged with the host framework.

pub mod entity;
pub mod keys;
pub mod state_machine;
pub mod wol;

// Re-export commonly used types at crate root
pub use entity::{
    media_player_entity_id, remote_entity_id, AttributeMap, EntityUpdate, PlayerAttributes,
    PowerState, RemoteAttributes, StatusCode, UpdateKind,
};
pub use state_machine::{ConnectionEvent, ConnectionState, SessionStateMachine, TransitionResult};

/// Timing and limit parameters for device sessions
pub mod timing {
    /// Default vendor control port
    pub const DEFAULT_PORT: u16 = 55000;

    /// Poll interval in seconds
    pub const POLL_INTERVAL_SECS: u64 = 30;

    /// Settle delay after sending a wake packet
    pub const WAKE_SETTLE_SECS: u64 = 8;

    /// Settle delay after a protocol power-on call
    pub const POWER_ON_SETTLE_SECS: u64 = 2;

    /// Per-request timeout for vendor protocol calls
    pub const REQUEST_TIMEOUT_SECS: u64 = 5;

    /// Local volume estimate step for relative volume keys
    pub const VOLUME_STEP: u8 = 2;

    /// Maximum volume level
    pub const VOLUME_MAX: u8 = 100;
}
