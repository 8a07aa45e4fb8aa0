// ============================================================================
// Connection State
// ============================================================================
//
// Transitions:
//
//   Disconnected --dial ok--> Connected --transport error--> Reconnecting
//        ^                        ^                              |
//        |                        +--------- re-dial ok ---------+
//        +-- transport dropped (no supervisor) -- Connected
//
//   Any state --close()--> Closed (terminal)
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a connection owned by a broker or dedup store client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No live connection and nobody is trying to restore one
    Disconnected,
    /// Connection confirmed live
    Connected,
    /// A background supervisor is re-dialing
    Reconnecting,
    /// Explicitly shut down; terminal
    Closed,
}

impl ConnectionState {
    /// Whether requests may be issued in this state
    pub fn is_live(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Closed is only reachable through explicit shutdown and is never left.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connected) => true,
            (Connected, Reconnecting) | (Connected, Disconnected) => true,
            (Reconnecting, Connected) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
