use thiserror::Error;

/// Why the backend could not produce a decision.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("backend did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("backend response unreadable: {0}")]
    Payload(String),

    #[error("invalid decision client configuration: {0}")]
    Config(String),
}

impl DecisionError {
    /// Returns `true` when the backend is down or unreachable, as opposed to
    /// answering with something the bridge does not understand.
    #[must_use]
    pub fn is_outage(&self) -> bool {
        match self {
            DecisionError::Timeout { .. } | DecisionError::Network(_) => true,
            DecisionError::Status { status } => *status >= 500,
            DecisionError::Payload(_) | DecisionError::Config(_) => false,
        }
    }

    /// Short label used as a structured log field.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            DecisionError::Timeout { .. } => "timeout",
            DecisionError::Network(_) => "network",
            DecisionError::Status { .. } => "status",
            DecisionError::Payload(_) => "payload",
            DecisionError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for DecisionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Payload(value.to_string())
    }
}
