use anyhow::{Context, Result};
use clap::Args;
use henry_core::{DeviceTimeZone, UnitId, constants::*};
use henry_decision::{DecisionClientConfig, HttpDecisionClient};
use henry_network::{BridgeConfig, BridgeServer};
use henry_protocol::FrameLayout;
use secrecy::SecretString;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::signal::shutdown_signal;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "HENRY_BRIDGE_HOST", default_value = DEFAULT_HOST)]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "HENRY_BRIDGE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Base URL of the academy backend
    #[arg(long, env = "HENRY_BACKEND_URL")]
    backend_url: String,

    /// Check-in webhook path on the backend
    #[arg(long, env = "HENRY_BACKEND_ENDPOINT", default_value = DEFAULT_WEBHOOK_ENDPOINT)]
    backend_endpoint: String,

    /// Token sent as bearer and `api_key`
    #[arg(long, env = "HENRY_BACKEND_TOKEN", hide_env_values = true)]
    backend_token: String,

    /// Academy unit (UUID)
    #[arg(long, env = "HENRY_UNIT_ID")]
    unit_id: UnitId,

    /// Device identifier reported to the backend [default: HENRY_<peer ip>]
    #[arg(long, env = "HENRY_DEVICE_ID")]
    device_id: Option<String>,

    /// Time allowed for the device line after accept
    #[arg(long, env = "HENRY_FRAME_TIMEOUT_MS", default_value_t = DEFAULT_FRAME_TIMEOUT_MS)]
    frame_timeout_ms: u64,

    /// Time allowed for the backend decision after the line
    #[arg(long, env = "HENRY_DECISION_TIMEOUT_MS", default_value_t = DEFAULT_DECISION_TIMEOUT_MS)]
    decision_timeout_ms: u64,

    /// How long the turnstile waits for the verdict byte
    #[arg(long, env = "HENRY_DEVICE_WINDOW_MS", default_value_t = DEFAULT_DEVICE_WINDOW_MS)]
    device_window_ms: u64,

    /// Offset of the device clock (`-03:00`, `UTC`, `local`) [default: host local time]
    #[arg(long, env = "HENRY_DEVICE_UTC_OFFSET", allow_hyphen_values = true)]
    device_utc_offset: Option<DeviceTimeZone>,

    /// Width of the credential field in the device firmware
    #[arg(long, env = "HENRY_CREDENTIAL_WIDTH", default_value_t = DEFAULT_CREDENTIAL_WIDTH)]
    credential_width: usize,

    /// Longest line accepted before the connection is denied
    #[arg(long, env = "HENRY_MAX_FRAME_LEN", default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,
}

impl ServeArgs {
    fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::new(SocketAddr::new(self.host, self.port), self.unit_id)
            .with_frame_timeout(Duration::from_millis(self.frame_timeout_ms))
            .with_decision_timeout(Duration::from_millis(self.decision_timeout_ms))
            .with_device_window(Duration::from_millis(self.device_window_ms))
            .with_layout(FrameLayout::henry().with_credential_width(self.credential_width))
            .with_time_zone(self.device_utc_offset.unwrap_or(DeviceTimeZone::HostLocal))
            .with_max_frame_len(self.max_frame_len);
        if let Some(device_id) = &self.device_id {
            config = config.with_device_id(device_id.clone());
        }
        config
    }

    fn client_config(&self) -> DecisionClientConfig {
        DecisionClientConfig::new(
            self.backend_url.clone(),
            SecretString::from(self.backend_token.clone()),
        )
        .with_endpoint(self.backend_endpoint.clone())
        .with_timeout(Duration::from_millis(self.decision_timeout_ms))
    }
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = args.bridge_config();
    config.validate().context("invalid bridge configuration")?;

    let client = HttpDecisionClient::new(args.client_config())
        .context("failed to build backend client")?;
    info!(url = %client.url(), timeout_ms = args.decision_timeout_ms, "Backend configured");

    let server = BridgeServer::bind(config, Arc::new(client))
        .await
        .context("failed to start bridge")?;

    server
        .run_until(shutdown_signal())
        .await
        .context("bridge stopped with an error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ServeArgs,
    }

    const REQUIRED: [&str; 7] = [
        "henry-bridge",
        "--backend-url",
        "http://127.0.0.1:3001",
        "--backend-token",
        "secret",
        "--unit-id",
        "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10",
    ];

    fn parse(extra: &[&str]) -> ServeArgs {
        let argv = REQUIRED.iter().chain(extra).copied();
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).bridge_config();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.frame_timeout, Duration::from_millis(2000));
        assert_eq!(config.decision_timeout, Duration::from_millis(2000));
        assert_eq!(config.time_zone, DeviceTimeZone::HostLocal);
        assert_eq!(config.layout.credential_width(), 20);
        assert!(config.device_id.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--port",
            "4000",
            "--device-id",
            "CATRACA_01",
            "--device-utc-offset",
            "-03:00",
            "--credential-width",
            "16",
            "--decision-timeout-ms",
            "1500",
        ]);
        let config = args.bridge_config();
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.device_id.as_deref(), Some("CATRACA_01"));
        assert_eq!(config.time_zone, "-03:00".parse::<DeviceTimeZone>().unwrap());
        assert_eq!(config.layout.credential_width(), 16);

        let client = args.client_config();
        assert_eq!(
            client.webhook_url(),
            "http://127.0.0.1:3001/api/catraca/webhook"
        );
        assert_eq!(client.timeout, Duration::from_millis(1500));
    }

    #[rstest]
    #[case::missing_unit(&["henry-bridge", "--backend-url", "http://x", "--backend-token", "t"])]
    #[case::bad_unit(&[
        "henry-bridge",
        "--backend-url",
        "http://x",
        "--backend-token",
        "t",
        "--unit-id",
        "not-a-uuid",
    ])]
    fn test_rejects_bad_arguments(#[case] argv: &[&str]) {
        assert!(Harness::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_decision_timeout_outside_window_is_rejected() {
        let config = parse(&["--decision-timeout-ms", "2900"]).bridge_config();
        assert!(config.validate().is_err());
    }
}
