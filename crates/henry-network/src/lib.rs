//! TCP side of the Henry bridge.
//!
//! This crate owns the listening socket the turnstiles connect to and the
//! per-connection pipeline that turns one event line into one verdict byte.
//!
//! # Components
//!
//! - **BridgeServer**: accepts device connections and answers each one
//!   within the device window
//! - **ConnectionState**: lifecycle of a single connection
//! - **BridgeStats**: process-wide counters
//! - **DeviceSimulator**: plays the turnstile, for installation checks and
//!   tests
//!
//! # Example
//!
//! ```no_run
//! use henry_decision::{DecisionClientConfig, HttpDecisionClient};
//! use henry_network::{BridgeConfig, BridgeServer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let unit_id = "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10".parse()?;
//! let decider = HttpDecisionClient::new(DecisionClientConfig::new(
//!     "http://127.0.0.1:3001",
//!     "secret".to_string().into(),
//! ))?;
//!
//! let config = BridgeConfig::new("0.0.0.0:3000".parse()?, unit_id);
//! let server = BridgeServer::bind(config, Arc::new(decider)).await?;
//!
//! let stats = server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! println!("served {} connections", stats.accepted);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod server;
mod session;
mod simulator;
mod stats;

pub use config::BridgeConfig;
pub use error::{BridgeError, SimulatorError};
pub use server::BridgeServer;
pub use session::{ConnectionState, Session};
pub use simulator::{DeviceSimulator, SimulatorConfig};
pub use stats::{BridgeStats, StatsSnapshot};
