//! Access decisions for the Henry bridge.
//!
//! This crate resolves whether a credential read at the turnstile should be
//! granted passage by asking the academy backend's check-in webhook.
//!
//! # Components
//!
//! - **Decider**: the seam the bridge depends on; any implementation answers
//!   a [`CheckInRequest`] with a [`Decision`]
//! - **HttpDecisionClient**: the production decider, one `POST` per access
//!   attempt with a strict timeout and no retries
//!
//! Every failure (timeout, transport error, non-2xx status, unreadable body)
//! becomes [`Decision::Failed`], whose verdict is a deny.
//!
//! # Example
//!
//! ```no_run
//! use henry_decision::{Decider, DecisionClientConfig, HttpDecisionClient};
//! # use henry_decision::CheckInRequest;
//! use std::time::Duration;
//!
//! # async fn example(request: CheckInRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let config = DecisionClientConfig::new(
//!     "https://academia.example.com",
//!     "secret-token".to_string().into(),
//! )
//! .with_timeout(Duration::from_millis(2000));
//!
//! let client = HttpDecisionClient::new(config)?;
//! let decision = client.decide(&request).await;
//! println!("verdict: {}", decision.verdict());
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod client;
mod config;
mod error;
mod payload;

pub use client::{Decider, Decision, HttpDecisionClient};
pub use config::DecisionClientConfig;
pub use error::DecisionError;
pub use payload::{CheckInRequest, CheckInResponse};
