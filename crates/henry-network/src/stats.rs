use henry_core::Verdict;
use henry_decision::{Decision, DecisionError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::session::ConnectionState;

/// Process-wide connection counters.
///
/// Updated with relaxed atomics from every connection task; the bridge holds
/// no other shared mutable state.
#[derive(Debug, Default)]
pub struct BridgeStats {
    accepted: AtomicU64,
    active: AtomicU64,
    granted: AtomicU64,
    denied: AtomicU64,
    malformed: AtomicU64,
    frame_timeouts: AtomicU64,
    decision_timeouts: AtomicU64,
    backend_failures: AtomicU64,
    faults: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub active: u64,
    pub granted: u64,
    pub denied: u64,
    pub malformed: u64,
    pub frame_timeouts: u64,
    pub decision_timeouts: u64,
    pub backend_failures: u64,
    pub faults: u64,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a connection by its terminal state and the byte
    /// that was sent.
    pub(crate) fn connection_closed(&self, state: ConnectionState, verdict: Verdict) {
        self.active.fetch_sub(1, Ordering::Relaxed);

        match verdict {
            Verdict::Grant => self.granted.fetch_add(1, Ordering::Relaxed),
            Verdict::Deny => self.denied.fetch_add(1, Ordering::Relaxed),
        };

        let counter = match state {
            ConnectionState::DenyMalformed => &self.malformed,
            ConnectionState::DenyTimeout => &self.frame_timeouts,
            ConnectionState::DenyFault => &self.faults,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record backend trouble behind a decision.
    pub(crate) fn decision_made(&self, decision: &Decision) {
        if let Decision::Failed { error } = decision {
            self.backend_failures.fetch_add(1, Ordering::Relaxed);
            if matches!(error, DecisionError::Timeout { .. }) {
                self.decision_timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            granted: self.granted.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            frame_timeouts: self.frame_timeouts.load(Ordering::Relaxed),
            decision_timeouts: self.decision_timeouts.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}
