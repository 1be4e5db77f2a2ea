use henry_core::constants::{DEFAULT_DECISION_TIMEOUT_MS, DEFAULT_WEBHOOK_ENDPOINT};
use secrecy::SecretString;
use std::time::Duration;

/// Settings of the backend check-in call.
#[derive(Debug, Clone)]
pub struct DecisionClientConfig {
    /// Scheme, host and optional port of the backend (`https://host:8443`).
    pub base_url: String,
    /// Path of the check-in webhook.
    pub endpoint: String,
    /// Sent as bearer token and as `api_key` on every request.
    pub token: SecretString,
    /// Upper bound for the whole HTTP exchange.
    pub timeout: Duration,
}

impl DecisionClientConfig {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: DEFAULT_WEBHOOK_ENDPOINT.to_string(),
            token,
            timeout: Duration::from_millis(DEFAULT_DECISION_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full webhook URL, tolerating a trailing slash on the base and a
    /// missing leading slash on the endpoint.
    ///
    /// ```
    /// use henry_decision::DecisionClientConfig;
    ///
    /// let config = DecisionClientConfig::new(
    ///     "http://10.0.0.5:3001/",
    ///     "t".to_string().into(),
    /// )
    /// .with_endpoint("api/catraca/webhook");
    ///
    /// assert_eq!(config.webhook_url(), "http://10.0.0.5:3001/api/catraca/webhook");
    /// ```
    #[must_use]
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}
