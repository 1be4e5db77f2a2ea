//! Decoded access event.
//!
//! An [`AccessEvent`] is what the turnstile reports for one access attempt:
//! who presented themselves (credential), when (device-local time) and in
//! which direction the arm would turn. The remaining fields are device
//! metadata the bridge only logs.
//!
//! # Example
//!
//! ```
//! use henry_core::AccessDirection;
//! use henry_protocol::{AccessEvent, FrameLayout};
//!
//! let layout = FrameLayout::henry();
//! let event = AccessEvent::parse(
//!     "000001597[000[      000001        [05/01/2026 08:15:30[1[1}000[03[0",
//!     &layout,
//! )
//! .unwrap();
//!
//! assert_eq!(event.credential.as_str(), "000001");
//! assert_eq!(event.direction, AccessDirection::Entry);
//! assert_eq!(event.sequence_number(), Some(1597));
//! ```

use chrono::NaiveDateTime;
use henry_core::{
    AccessDirection, CredentialCode, Error, Result,
    constants::{LINE_TERMINATOR, TIMESTAMP_FORMAT},
};
use std::borrow::Cow;

use crate::layout::{Field, FrameLayout};

/// One access attempt reported by the turnstile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    /// Device counter, digits kept verbatim (leading zeros included).
    pub sequence_index: String,
    pub access_code: String,
    /// Trimmed credential.
    pub credential: CredentialCode,
    /// Device-local time, no offset attached.
    pub timestamp: NaiveDateTime,
    pub direction: AccessDirection,
    pub access_flag: String,
    pub function_code: String,
    pub type_code: String,
    pub online_flag: String,
}

impl AccessEvent {
    /// Parse one line (terminator already removed).
    ///
    /// # Errors
    ///
    /// - `Error::MalformedFrame` when a delimiter is missing or a numeric
    ///   field is not numeric
    /// - `Error::InvalidTimestamp` when the timestamp is not a valid
    ///   `dd/mm/yyyy hh:mm:ss` date
    /// - `Error::InvalidCredential` when the credential holds non-ASCII text
    pub fn parse(line: &str, layout: &FrameLayout) -> Result<Self> {
        let values = layout.split(line)?;

        let raw_timestamp = values.get(Field::Timestamp)?.trim();
        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT).map_err(
            |e| Error::InvalidTimestamp {
                value: raw_timestamp.to_string(),
                reason: e.to_string(),
            },
        )?;

        let verbatim = |field| values.get(field).map(|v| v.trim().to_string());

        Ok(Self {
            sequence_index: verbatim(Field::SequenceIndex)?,
            access_code: verbatim(Field::AccessCode)?,
            credential: CredentialCode::new(values.get(Field::Credential)?)?,
            timestamp,
            direction: AccessDirection::parse(values.get(Field::Direction)?)?,
            access_flag: verbatim(Field::AccessFlag)?,
            function_code: verbatim(Field::FunctionCode)?,
            type_code: verbatim(Field::TypeCode)?,
            online_flag: verbatim(Field::OnlineFlag)?,
        })
    }

    /// Format the event as the device would send it, including the trailing
    /// newline.
    #[must_use]
    pub fn to_line(&self, layout: &FrameLayout) -> String {
        let mut line = layout.render(|field| match field {
            Field::SequenceIndex => Cow::Borrowed(self.sequence_index.as_str()),
            Field::AccessCode => Cow::Borrowed(self.access_code.as_str()),
            Field::Credential => Cow::Borrowed(self.credential.as_str()),
            Field::Timestamp => Cow::Owned(self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            Field::Direction => Cow::Owned(self.direction.to_u8().to_string()),
            Field::AccessFlag => Cow::Borrowed(self.access_flag.as_str()),
            Field::FunctionCode => Cow::Borrowed(self.function_code.as_str()),
            Field::TypeCode => Cow::Borrowed(self.type_code.as_str()),
            Field::OnlineFlag => Cow::Borrowed(self.online_flag.as_str()),
        });
        line.push(char::from(LINE_TERMINATOR));
        line
    }

    /// Sequence index as a number, leading zeros dropped.
    #[must_use]
    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_index.parse().ok()
    }
}
