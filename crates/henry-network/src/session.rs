//! Lifecycle of a single device connection.
//!
//! ```text
//! AwaitingFrame ──> Decoding ──> Resolving ──> Responding
//!      │               │             │
//!      ├─> DenyTimeout │             │
//!      ├─> DenyMalformed <┘          │
//!      └─> DenyFault <───────────────┘   (from any live state)
//! ```
//!
//! Every terminal state ends with exactly one verdict byte on the wire.
//! Only `Responding` can carry a grant.

use std::fmt;
use std::net::SocketAddr;
use tokio::time::Instant;
use tracing::trace;

use crate::error::BridgeError;

/// State of one device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Buffering bytes until a full line arrives.
    AwaitingFrame,
    /// Line received, being parsed.
    Decoding,
    /// Waiting for the decider.
    Resolving,
    /// Decision taken, writing its verdict.
    Responding,
    /// No full line within the frame timeout.
    DenyTimeout,
    /// Line rejected by the codec or the parser.
    DenyMalformed,
    /// Unexpected failure inside the pipeline.
    DenyFault,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ConnectionState::AwaitingFrame => "AwaitingFrame",
            ConnectionState::Decoding => "Decoding",
            ConnectionState::Resolving => "Resolving",
            ConnectionState::Responding => "Responding",
            ConnectionState::DenyTimeout => "DenyTimeout",
            ConnectionState::DenyMalformed => "DenyMalformed",
            ConnectionState::DenyFault => "DenyFault",
        };
        write!(f, "{}", state_str)
    }
}

impl ConnectionState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use henry_network::ConnectionState;
    ///
    /// assert!(ConnectionState::AwaitingFrame.can_transition_to(&ConnectionState::Decoding));
    /// assert!(!ConnectionState::AwaitingFrame.can_transition_to(&ConnectionState::Responding));
    /// ```
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        matches!(
            (self, target),
            // From AwaitingFrame
            (
                ConnectionState::AwaitingFrame,
                ConnectionState::Decoding
                    | ConnectionState::DenyTimeout
                    | ConnectionState::DenyMalformed
                    | ConnectionState::DenyFault
            )
            // From Decoding
            | (
                ConnectionState::Decoding,
                ConnectionState::Resolving | ConnectionState::DenyMalformed | ConnectionState::DenyFault
            )
            // From Resolving
            | (
                ConnectionState::Resolving,
                ConnectionState::Responding | ConnectionState::DenyFault
            )
        )
    }

    /// Returns `true` for states that end the connection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Responding
                | ConnectionState::DenyTimeout
                | ConnectionState::DenyMalformed
                | ConnectionState::DenyFault
        )
    }

    /// Returns `true` for the failure terminals, which always answer deny.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ConnectionState::DenyTimeout | ConnectionState::DenyMalformed | ConnectionState::DenyFault
        )
    }
}

/// Per-connection bookkeeping: peer, current state and timing marks.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    state: ConnectionState,
    accepted_at: Instant,
    frame_received_at: Option<Instant>,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            state: ConnectionState::AwaitingFrame,
            accepted_at: Instant::now(),
            frame_received_at: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    /// When the full line arrived, once it has.
    pub fn frame_received_at(&self) -> Option<Instant> {
        self.frame_received_at
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidTransition` if the table forbids it; the
    /// state is left unchanged.
    pub fn enter(&mut self, next: ConnectionState) -> Result<(), BridgeError> {
        if !self.state.can_transition_to(&next) {
            return Err(BridgeError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        trace!(peer = %self.peer, from = %self.state, to = %next, "Connection state change");
        if next == ConnectionState::Decoding {
            self.frame_received_at = Some(Instant::now());
        }
        self.state = next;
        Ok(())
    }

    /// Force the fault terminal after a panic or a lifecycle bug.
    pub fn fault(&mut self) {
        trace!(peer = %self.peer, from = %self.state, "Connection faulted");
        self.state = ConnectionState::DenyFault;
    }
}
