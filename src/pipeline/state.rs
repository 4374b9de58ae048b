//! Connection state management

/// Connection state machine
///
/// Transitions only move forward. `Closed` is absorbing and can be entered
/// from any state, on error or on an explicit close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing started yet
    Idle,

    /// Listening for the sender's broadcast
    Discovering,

    /// Opening the stream socket
    Connecting,

    /// Frames are flowing
    Streaming,

    /// Session over; sockets and timers torn down
    Closed,
}

impl ConnectionState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, target) {
            (Closed, _) => false,
            (_, Closed) => true,

            (Idle, Discovering) => true,
            // a configured address skips discovery
            (Idle, Connecting) => true,
            (Discovering, Connecting) => true,
            (Connecting, Streaming) => true,

            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Discovering => "Discovering",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Streaming => "Streaming",
            ConnectionState::Closed => "Closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
