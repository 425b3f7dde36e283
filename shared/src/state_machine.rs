//! Session Connection State Machine
//!
//! Tracks whether the bridge can currently reach a TV. The power flag is
//! kept by the session itself; this machine only models connectivity.

use serde::Serialize;

/// Connectivity state of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No live connection (initial state and after teardown)
    #[default]
    Disconnected,
    /// A connection attempt and status probe are in flight
    Connecting,
    /// Last status probe returned a defined value
    Connected,
    /// Probe returned nothing or the device could not be reached
    Unreachable,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Host asked the session to connect
    ConnectRequested,
    /// Status probe returned a defined value
    ProbeSucceeded,
    /// Status probe completed but returned no value
    ProbeEmpty,
    /// Timeout, refused or reset connection
    NetworkFailure,
    /// Device demands pairing credentials
    CredentialRequired,
    /// Any other failure while polling
    PollFailed,
    /// A command against the device failed
    CommandFailed,
    /// Session is being torn down
    Teardown,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid; carries the new state (may equal the old one)
    Success(ConnectionState),
    /// Transition was invalid from current state
    Invalid {
        from: ConnectionState,
        event: ConnectionEvent,
    },
}

/// The connectivity state machine for one device session
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    current_state: ConnectionState,
    consecutive_failures: u32,
}

impl SessionStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    /// Number of failed probes/commands since the last successful probe
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the session holds a live connection handle
    pub fn is_live(&self) -> bool {
        self.current_state != ConnectionState::Disconnected
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: ConnectionEvent) -> TransitionResult {
        match self.next_state(event) {
            Some(state) => {
                match event {
                    ConnectionEvent::ProbeSucceeded | ConnectionEvent::Teardown => {
                        self.consecutive_failures = 0;
                    }
                    ConnectionEvent::ConnectRequested => {}
                    _ => self.consecutive_failures = self.consecutive_failures.saturating_add(1),
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn next_state(&self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self.current_state, event) {
            // Teardown is valid from anywhere
            (_, Teardown) => Some(Disconnected),

            // (Re)connect
            (_, ConnectRequested) => Some(Connecting),

            // Nothing to observe without a live connection
            (Disconnected, _) => None,

            (_, ProbeSucceeded) => Some(Connected),

            (_, ProbeEmpty | NetworkFailure | CredentialRequired | PollFailed | CommandFailed) => {
                Some(Unreachable)
            }
        }
    }
}
