use henry_core::Verdict;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    config::DecisionClientConfig,
    error::DecisionError,
    payload::{CheckInRequest, CheckInResponse, WireRequest},
};

/// Outcome of resolving one access attempt.
#[derive(Debug)]
pub enum Decision {
    /// The backend explicitly released the turnstile.
    Granted { response: CheckInResponse },
    /// The backend answered and refused passage.
    Denied { response: CheckInResponse },
    /// The backend was not consulted.
    Skipped { reason: &'static str },
    /// No usable answer.
    Failed { error: DecisionError },
}

impl Decision {
    /// Byte to send to the turnstile. Only [`Decision::Granted`] grants.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self {
            Decision::Granted { .. } => Verdict::Grant,
            Decision::Denied { .. } | Decision::Skipped { .. } | Decision::Failed { .. } => {
                Verdict::Deny
            }
        }
    }

    /// Short label used as a structured log field.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Granted { .. } => "granted",
            Decision::Denied { .. } => "denied",
            Decision::Skipped { .. } => "skipped",
            Decision::Failed { .. } => "failed",
        }
    }
}

/// Resolves access attempts.
///
/// Implementations never fail: errors are reported as
/// [`Decision::Failed`]. The bridge bounds every call with its own deadline,
/// so an implementation that hangs costs a deny, not a stuck turnstile.
pub trait Decider: Send + Sync {
    fn decide(&self, request: &CheckInRequest) -> impl Future<Output = Decision> + Send;
}

/// Decider backed by the academy check-in webhook.
#[derive(Debug, Clone)]
pub struct HttpDecisionClient {
    http: reqwest::Client,
    url: reqwest::Url,
    token: SecretString,
    timeout: Duration,
}

impl HttpDecisionClient {
    /// Build the client. The underlying connection pool is shared by all
    /// clones.
    ///
    /// # Errors
    ///
    /// Returns `DecisionError::Config` if the webhook URL is not an
    /// `http`/`https` URL or the HTTP client cannot be built.
    pub fn new(config: DecisionClientConfig) -> Result<Self, DecisionError> {
        let url = reqwest::Url::parse(&config.webhook_url())
            .map_err(|e| DecisionError::Config(format!("invalid backend URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DecisionError::Config(format!(
                "unsupported backend URL scheme '{}'",
                url.scheme()
            )));
        }
        if config.token.expose_secret().trim().is_empty() {
            return Err(DecisionError::Config(
                "backend token must not be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .user_agent(concat!("henry-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DecisionError::Config(e.to_string()))?;

        Ok(Self {
            http,
            url,
            token: config.token,
            timeout: config.timeout,
        })
    }

    #[must_use]
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit one check-in and read the backend's answer.
    ///
    /// # Errors
    ///
    /// - `DecisionError::Timeout` if the exchange exceeds the client timeout
    /// - `DecisionError::Network` on connection failures
    /// - `DecisionError::Status` for non-2xx answers
    /// - `DecisionError::Payload` when the body is not a check-in response
    pub async fn check_in(
        &self,
        request: &CheckInRequest,
    ) -> Result<CheckInResponse, DecisionError> {
        let body = WireRequest {
            request,
            api_key: self.token.expose_secret(),
        };

        let response = self
            .http
            .post(self.url.clone())
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecisionError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn transport_error(&self, error: reqwest::Error) -> DecisionError {
        if error.is_timeout() {
            DecisionError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            DecisionError::Network(error.to_string())
        }
    }
}

impl Decider for HttpDecisionClient {
    async fn decide(&self, request: &CheckInRequest) -> Decision {
        debug!(
            credential = %request.matricula,
            direction = %request.direcao,
            url = %self.url,
            "Submitting check-in"
        );

        match self.check_in(request).await {
            Ok(response) if response.liberar_catraca => {
                info!(
                    credential = %request.matricula,
                    student = response.nome_aluno.as_deref().unwrap_or("-"),
                    "Backend granted access"
                );
                Decision::Granted { response }
            }
            Ok(response) => {
                info!(
                    credential = %request.matricula,
                    reason = response.reason().unwrap_or("-"),
                    "Backend denied access"
                );
                Decision::Denied { response }
            }
            Err(error) if error.is_outage() => {
                error!(
                    credential = %request.matricula,
                    class = error.class(),
                    error = %error,
                    "Backend unavailable, denying access"
                );
                Decision::Failed { error }
            }
            Err(error) => {
                warn!(
                    credential = %request.matricula,
                    class = error.class(),
                    error = %error,
                    "Backend answer rejected, denying access"
                );
                Decision::Failed { error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> DecisionClientConfig {
        DecisionClientConfig::new(
            base_url,
            SecretString::from("token".to_string()),
        )
    }

    #[test]
    fn test_only_granted_grants() {
        let response = CheckInResponse {
            liberar_catraca: true,
            success: Some(true),
            message: None,
            mensagem_display: None,
            nome_aluno: None,
            tempo_liberacao_segundos: None,
        };

        assert_eq!(
            Decision::Granted {
                response: response.clone()
            }
            .verdict(),
            Verdict::Grant
        );
        // A deny decision wins even if the body claims liberar_catraca.
        assert_eq!(Decision::Denied { response }.verdict(), Verdict::Deny);
        assert_eq!(
            Decision::Skipped {
                reason: "blank credential"
            }
            .verdict(),
            Verdict::Deny
        );
        assert_eq!(
            Decision::Failed {
                error: DecisionError::Status { status: 500 }
            }
            .verdict(),
            Verdict::Deny
        );
    }

    #[test]
    fn test_new_rejects_bad_urls() {
        assert!(matches!(
            HttpDecisionClient::new(config("not a url")),
            Err(DecisionError::Config(_))
        ));
        assert!(matches!(
            HttpDecisionClient::new(config("ftp://backend")),
            Err(DecisionError::Config(_))
        ));
    }

    #[test]
    fn test_new_rejects_empty_token() {
        let mut config = config("http://127.0.0.1:3001");
        config.token = SecretString::from("  ".to_string());
        assert!(HttpDecisionClient::new(config).is_err());
    }

    #[test]
    fn test_url_joins_endpoint() {
        let client = HttpDecisionClient::new(config("http://127.0.0.1:3001/")).unwrap();
        assert_eq!(
            client.url().as_str(),
            "http://127.0.0.1:3001/api/catraca/webhook"
        );
    }
}
