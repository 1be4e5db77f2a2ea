//! JSON bodies exchanged with the check-in webhook.
//!
//! Field names follow the backend's Portuguese API (`matricula`,
//! `unidade_id`, `liberar_catraca`, ...).

use chrono::{DateTime, FixedOffset};
use henry_core::{CredentialCode, UnitId};
use henry_protocol::AccessEvent;
use serde::{Deserialize, Deserializer, Serialize, de};

/// One access attempt as submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInRequest {
    /// Trimmed credential.
    pub matricula: CredentialCode,
    pub unidade_id: UnitId,
    pub dispositivo_id: String,
    /// Device time with its offset resolved (RFC 3339).
    pub timestamp: DateTime<FixedOffset>,
    /// `ENTRADA`, `SAIDA`, `INDEFINIDO` or the raw device code.
    pub direcao: String,
    /// Device sequence index, verbatim.
    pub indice_evento: String,
}

impl CheckInRequest {
    /// Build the request for a decoded event whose timestamp has already
    /// been resolved to an absolute instant.
    #[must_use]
    pub fn from_event(
        event: &AccessEvent,
        timestamp: DateTime<FixedOffset>,
        unit_id: UnitId,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            matricula: event.credential.clone(),
            unidade_id: unit_id,
            dispositivo_id: device_id.into(),
            timestamp,
            direcao: event.direction.backend_label(),
            indice_evento: event.sequence_index.clone(),
        }
    }
}

/// Request body as sent on the wire: the request plus the API key.
#[derive(Serialize)]
pub(crate) struct WireRequest<'a> {
    #[serde(flatten)]
    pub request: &'a CheckInRequest,
    pub api_key: &'a str,
}

/// Webhook answer. Only `liberar_catraca` is required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckInResponse {
    #[serde(deserialize_with = "lenient_bool")]
    pub liberar_catraca: bool,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub mensagem_display: Option<String>,
    #[serde(default)]
    pub nome_aluno: Option<String>,
    #[serde(default)]
    pub tempo_liberacao_segundos: Option<f64>,
}

impl CheckInResponse {
    /// Best human readable reason the backend gave, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.mensagem_display
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Number(i64),
    Text(String),
}

/// Accepts `true`/`false`, `1`/`0` and their string forms.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(value) => Ok(value),
        BoolLike::Number(1) => Ok(true),
        BoolLike::Number(0) => Ok(false),
        BoolLike::Number(other) => Err(de::Error::custom(format!(
            "expected 0 or 1, found {other}"
        ))),
        BoolLike::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(de::Error::custom(format!(
                "expected a boolean, found \"{text}\""
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use henry_protocol::FrameLayout;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"liberar_catraca": true}"#, true)]
    #[case(r#"{"liberar_catraca": false}"#, false)]
    #[case(r#"{"liberar_catraca": 1}"#, true)]
    #[case(r#"{"liberar_catraca": 0}"#, false)]
    #[case(r#"{"liberar_catraca": "true"}"#, true)]
    #[case(r#"{"liberar_catraca": " FALSE "}"#, false)]
    #[case(r#"{"liberar_catraca": "1"}"#, true)]
    fn test_lenient_grant_flag(#[case] body: &str, #[case] expected: bool) {
        let response: CheckInResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.liberar_catraca, expected);
    }

    #[rstest]
    #[case::missing(r#"{"success": true}"#)]
    #[case::null(r#"{"liberar_catraca": null}"#)]
    #[case::two(r#"{"liberar_catraca": 2}"#)]
    #[case::word(r#"{"liberar_catraca": "sim"}"#)]
    #[case::not_json("<html>502 Bad Gateway</html>")]
    fn test_unreadable_response(#[case] body: &str) {
        assert!(serde_json::from_str::<CheckInResponse>(body).is_err());
    }

    #[test]
    fn test_full_backend_response() {
        let body = r#"{
            "success": true,
            "message": "Check-in realizado",
            "liberar_catraca": true,
            "nome_aluno": "Ana Souza",
            "foto_aluno": null,
            "mensagem_display": "Bem-vinda, Ana!",
            "tempo_liberacao_segundos": 5
        }"#;
        let response: CheckInResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.nome_aluno.as_deref(), Some("Ana Souza"));
        assert_eq!(response.tempo_liberacao_segundos, Some(5.0));
        assert_eq!(response.reason(), Some("Bem-vinda, Ana!"));
    }

    #[test]
    fn test_request_serialization() {
        let event = AccessEvent::parse(
            "000001597[000[      000001        [05/01/2026 08:15:30[2[1}000[03[0",
            &FrameLayout::henry(),
        )
        .unwrap();
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let timestamp = event.timestamp.and_local_timezone(offset).unwrap();
        let unit_id: UnitId = "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10".parse().unwrap();

        let request = CheckInRequest::from_event(&event, timestamp, unit_id, "HENRY_10.0.0.7");
        let body = serde_json::to_value(WireRequest {
            request: &request,
            api_key: "secret",
        })
        .unwrap();

        assert_eq!(body["matricula"], "000001");
        assert_eq!(body["unidade_id"], "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10");
        assert_eq!(body["dispositivo_id"], "HENRY_10.0.0.7");
        assert_eq!(body["timestamp"], "2026-01-05T08:15:30-03:00");
        assert_eq!(body["direcao"], "SAIDA");
        assert_eq!(body["indice_evento"], "000001597");
        assert_eq!(body["api_key"], "secret");
    }
}
