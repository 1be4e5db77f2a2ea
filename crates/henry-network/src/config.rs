use henry_core::{DeviceTimeZone, UnitId, constants::*};
use henry_protocol::FrameLayout;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::BridgeError;

/// Configuration of the bridge server.
///
/// # Timing budget
///
/// ```text
/// accept ── frame_timeout ──> line received ── decision_timeout ──> verdict
///                             └──────────── device_window ────────────────┘
/// ```
///
/// The decision deadline starts when the line is received and must leave
/// [`WRITE_MARGIN_MS`] inside the device window for the verdict write.
///
/// # Example
///
/// ```
/// use henry_network::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::new(
///     "0.0.0.0:3000".parse().unwrap(),
///     "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10".parse().unwrap(),
/// )
/// .with_decision_timeout(Duration::from_millis(1500));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.connection_deadline(), Duration::from_millis(3500));
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address to bind the listener to
    pub bind_addr: SocketAddr,

    /// Time allowed between accept and a complete line
    pub frame_timeout: Duration,

    /// Time allowed for the decision once the line is in
    pub decision_timeout: Duration,

    /// How long the device waits for the verdict byte after sending
    pub device_window: Duration,

    /// Upper bound for writing and flushing the verdict byte
    pub write_timeout: Duration,

    /// Longest line accepted without terminator
    pub max_frame_len: usize,

    /// Field table of the device firmware
    pub layout: FrameLayout,

    /// Time zone of the device clock
    pub time_zone: DeviceTimeZone,

    /// Academy unit reported to the backend
    pub unit_id: UnitId,

    /// Device identifier reported to the backend; `HENRY_<peer ip>` if unset
    pub device_id: Option<String>,
}

impl BridgeConfig {
    /// Configuration with default timings and the stock field layout.
    pub fn new(bind_addr: SocketAddr, unit_id: UnitId) -> Self {
        Self {
            bind_addr,
            frame_timeout: Duration::from_millis(DEFAULT_FRAME_TIMEOUT_MS),
            decision_timeout: Duration::from_millis(DEFAULT_DECISION_TIMEOUT_MS),
            device_window: Duration::from_millis(DEFAULT_DEVICE_WINDOW_MS),
            write_timeout: Duration::from_millis(WRITE_TIMEOUT_MS),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            layout: FrameLayout::henry(),
            time_zone: DeviceTimeZone::HostLocal,
            unit_id,
            device_id: None,
        }
    }

    #[must_use]
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_device_window(mut self, window: Duration) -> Self {
        self.device_window = window;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_time_zone(mut self, time_zone: DeviceTimeZone) -> Self {
        self.time_zone = time_zone;
        self
    }

    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Longest a connection can stay open before its verdict is due.
    #[must_use]
    pub fn connection_deadline(&self) -> Duration {
        self.frame_timeout + self.decision_timeout
    }

    /// Identifier reported to the backend for a device at `peer`.
    #[must_use]
    pub fn device_id_for(&self, peer: SocketAddr) -> String {
        self.device_id
            .clone()
            .unwrap_or_else(|| format!("HENRY_{}", peer.ip()))
    }

    /// Check the timing budget and limits.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` when:
    /// - the frame timeout is below [`MIN_FRAME_TIMEOUT_MS`]
    /// - the decision timeout is below [`MIN_DECISION_TIMEOUT_MS`]
    /// - the decision timeout plus [`WRITE_MARGIN_MS`] exceeds the device
    ///   window
    /// - the decision timeout plus the write timeout exceeds the device
    ///   window
    /// - the maximum line length is zero
    pub fn validate(&self) -> Result<(), BridgeError> {
        let min_frame = Duration::from_millis(MIN_FRAME_TIMEOUT_MS);
        if self.frame_timeout < min_frame {
            return Err(BridgeError::InvalidConfig(format!(
                "frame timeout {}ms is below the minimum of {MIN_FRAME_TIMEOUT_MS}ms",
                self.frame_timeout.as_millis()
            )));
        }

        let min_decision = Duration::from_millis(MIN_DECISION_TIMEOUT_MS);
        if self.decision_timeout < min_decision {
            return Err(BridgeError::InvalidConfig(format!(
                "decision timeout {}ms is below the minimum of {MIN_DECISION_TIMEOUT_MS}ms",
                self.decision_timeout.as_millis()
            )));
        }

        let margin = Duration::from_millis(WRITE_MARGIN_MS);
        if self.decision_timeout + margin > self.device_window {
            return Err(BridgeError::InvalidConfig(format!(
                "decision timeout {}ms leaves less than {WRITE_MARGIN_MS}ms of the {}ms device window",
                self.decision_timeout.as_millis(),
                self.device_window.as_millis()
            )));
        }

        if self.decision_timeout + self.write_timeout > self.device_window {
            return Err(BridgeError::InvalidConfig(format!(
                "decision timeout {}ms plus write timeout {}ms exceeds the {}ms device window",
                self.decision_timeout.as_millis(),
                self.write_timeout.as_millis(),
                self.device_window.as_millis()
            )));
        }

        if self.max_frame_len == 0 {
            return Err(BridgeError::InvalidConfig(
                "maximum frame length must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Whole milliseconds of `duration` for log fields and error values,
/// saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
