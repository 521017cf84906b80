//! ConnectionStatus enum tracking the lifecycle of a connected client.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::StateMachine;

/// Lifecycle of one client connection.
///
/// ```text
/// Connecting ──► Active ──► Closing ──► Closed
///      │                       ▲
///      └───────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Upgraded but not yet registered with the hub.
    #[default]
    Connecting,
    /// Registered and receiving broadcasts.
    Active,
    /// A pump has exited; teardown in progress.
    Closing,
    /// Both pumps have exited and the transport is released.
    Closed,
}

impl ConnectionStatus {
    /// Returns true while the client may still receive broadcasts.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Active)
    }
}

impl StateMachine for ConnectionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, target),
            (Connecting, Active) | (Connecting, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionStatus::*;
        match self {
            Connecting => vec![Active, Closing],
            Active => vec![Closing],
            Closing => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Active => "active",
            ConnectionStatus::Closing => "closing",
            ConnectionStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}
