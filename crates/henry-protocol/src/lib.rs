//! Wire format of the Henry turnstile online event line.
//!
//! - [`FrameLayout`]: declarative field table (delimiters, widths, kinds)
//! - [`AccessEvent`]: one decoded access attempt
//! - [`RawFrame`]: an unparsed line as received from the socket
//! - [`BridgeCodec`] / [`TurnstileCodec`]: `tokio_util` codecs for the bridge
//!   side and the device side of a connection
//! - [`EventBuilder`]: builds events the way the device would, for simulators

pub mod builder;
pub mod codec;
pub mod event;
pub mod frame;
pub mod layout;
pub mod validation;

pub use builder::EventBuilder;
pub use codec::{BridgeCodec, TurnstileCodec};
pub use event::AccessEvent;
pub use frame::RawFrame;
pub use layout::{Field, FieldKind, FieldSpec, FieldValues, FrameLayout, HENRY_ONLINE_EVENT};
pub use validation::validate_field;
