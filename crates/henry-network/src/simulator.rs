//! Turnstile simulator.
//!
//! Plays the device side of the online validation exchange: connect, send
//! one event line, wait for the verdict byte. Operators use it to check an
//! installation end to end without a turnstile at hand.
//!
//! # Example Usage
//!
//! ```no_run
//! use henry_core::CredentialCode;
//! use henry_network::{DeviceSimulator, SimulatorConfig};
//! use henry_protocol::EventBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let simulator = DeviceSimulator::new(SimulatorConfig {
//!     bridge_addr: "127.0.0.1:3000".parse()?,
//!     ..SimulatorConfig::default()
//! });
//!
//! let event = EventBuilder::new(CredentialCode::new("000001")?).build();
//! let verdict = simulator.send_event(event).await?;
//! println!("bridge answered {verdict}");
//! # Ok(())
//! # }
//! ```
//!
//! # Timeout Handling
//!
//! Connect, write and read are each bounded by the configured timeout,
//! which defaults to the device window. A bridge that answers later than
//! that would have been ignored by a real turnstile.

use futures::{SinkExt, StreamExt};
use henry_core::{
    Verdict,
    constants::{DEFAULT_DEVICE_WINDOW_MS, DEFAULT_PORT},
};
use henry_protocol::{AccessEvent, FrameLayout, TurnstileCodec};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::millis;
use crate::error::SimulatorError;

/// Configuration for the device simulator
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Bridge address to connect to
    pub bridge_addr: SocketAddr,

    /// Timeout for each I/O step (connect, send, receive)
    pub timeout: Duration,

    /// Field layout used to format event lines
    pub layout: FrameLayout,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bridge_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            timeout: Duration::from_millis(DEFAULT_DEVICE_WINDOW_MS),
            layout: FrameLayout::henry(),
        }
    }
}

/// Simulated turnstile.
///
/// Every call opens a fresh connection, as the device does.
#[derive(Debug, Clone)]
pub struct DeviceSimulator {
    config: SimulatorConfig,
}

impl DeviceSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Send one access event and return the bridge's verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - connecting, writing or reading times out
    /// - the bridge closes the connection without answering
    /// - the answer byte is neither `0x00` nor `0x01`
    pub async fn send_event(&self, event: AccessEvent) -> Result<Verdict, SimulatorError> {
        let stream = self.connect().await?;
        let mut framed = Framed::new(stream, TurnstileCodec::new(self.config.layout));

        debug!(
            credential = %event.credential,
            sequence = %event.sequence_index,
            "Sending access event"
        );
        match tokio::time::timeout(self.config.timeout, framed.send(event)).await {
            Ok(result) => result?,
            Err(_) => return Err(SimulatorError::WriteTimeout(self.timeout_ms())),
        }

        match tokio::time::timeout(self.config.timeout, framed.next()).await {
            Ok(Some(Ok(verdict))) => {
                info!(verdict = %verdict, "Bridge answered");
                Ok(verdict)
            }
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => Err(SimulatorError::ConnectionLost(
                "bridge closed the connection without a verdict".to_string(),
            )),
            Err(_) => {
                warn!("No verdict after {}ms", self.timeout_ms());
                Err(SimulatorError::ReadTimeout(self.timeout_ms()))
            }
        }
    }

    /// Send raw bytes as-is and return the verdict.
    ///
    /// Used to replay captured or deliberately broken lines; no terminator
    /// is appended.
    ///
    /// # Errors
    /// Same as [`DeviceSimulator::send_event`].
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<Verdict, SimulatorError> {
        let mut stream = self.connect().await?;

        match tokio::time::timeout(self.config.timeout, stream.write_all(bytes)).await {
            Ok(result) => result?,
            Err(_) => return Err(SimulatorError::WriteTimeout(self.timeout_ms())),
        }

        match tokio::time::timeout(self.config.timeout, stream.read_u8()).await {
            Ok(Ok(byte)) => Ok(Verdict::from_byte(byte)?),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
                SimulatorError::ConnectionLost("bridge closed the connection without a verdict".to_string()),
            ),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(SimulatorError::ReadTimeout(self.timeout_ms())),
        }
    }

    async fn connect(&self) -> Result<TcpStream, SimulatorError> {
        let addr = self.config.bridge_addr;
        let stream = match tokio::time::timeout(self.config.timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(SimulatorError::ConnectionTimeout(self.timeout_ms())),
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        debug!("Connected to bridge at {}", addr);
        Ok(stream)
    }

    fn timeout_ms(&self) -> u64 {
        millis(self.config.timeout)
    }
}
