use chrono::{Local, NaiveDateTime, SubsecRound};
use henry_core::{AccessDirection, CredentialCode, Result, constants::*};

use crate::{
    event::AccessEvent,
    validation::{validate_digits, validate_field},
};

/// Builder for access events as the device would emit them.
///
/// Starts from the values the stock firmware sends for an online biometric
/// read (`000001597`, access code `000`, entry, `1}000`, type `03`, online
/// flag `0`) stamped with the current local time.
///
/// # Example
/// ```
/// use henry_core::{AccessDirection, CredentialCode};
/// use henry_protocol::{EventBuilder, FrameLayout};
///
/// let event = EventBuilder::new(CredentialCode::new("000001").unwrap())
///     .direction(AccessDirection::Exit)
///     .sequence_index("42").unwrap()
///     .build();
///
/// let line = event.to_line(&FrameLayout::henry());
/// assert!(line.starts_with("42[000[              000001["));
/// assert!(line.ends_with("[2[1}000[03[0\n"));
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: AccessEvent,
}

impl EventBuilder {
    /// Create a builder for `credential`.
    pub fn new(credential: CredentialCode) -> Self {
        Self {
            event: AccessEvent {
                sequence_index: SIMULATOR_SEQUENCE_INDEX.to_string(),
                access_code: SIMULATOR_ACCESS_CODE.to_string(),
                credential,
                timestamp: Local::now().naive_local().trunc_subsecs(0),
                direction: AccessDirection::Entry,
                access_flag: SIMULATOR_ACCESS_FLAG.to_string(),
                function_code: SIMULATOR_FUNCTION_CODE.to_string(),
                type_code: SIMULATOR_TYPE_CODE.to_string(),
                online_flag: SIMULATOR_ONLINE_FLAG.to_string(),
            },
        }
    }

    /// Set the sequence index.
    ///
    /// # Errors
    /// Returns error if the value is not a run of digits.
    pub fn sequence_index(mut self, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_digits("sequence index", &value)?;
        self.event.sequence_index = value;
        Ok(self)
    }

    /// Set the access code.
    ///
    /// # Errors
    /// Returns error if the value contains a delimiter or control character.
    pub fn access_code(mut self, value: impl Into<String>) -> Result<Self> {
        self.event.access_code = verbatim(value)?;
        Ok(self)
    }

    /// Set the device timestamp. Sub-second precision is dropped, the wire
    /// carries whole seconds.
    pub fn timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.event.timestamp = timestamp.trunc_subsecs(0);
        self
    }

    pub fn direction(mut self, direction: AccessDirection) -> Self {
        self.event.direction = direction;
        self
    }

    /// # Errors
    /// Returns error if the value contains a delimiter or control character.
    pub fn access_flag(mut self, value: impl Into<String>) -> Result<Self> {
        self.event.access_flag = verbatim(value)?;
        Ok(self)
    }

    /// # Errors
    /// Returns error if the value contains a delimiter or control character.
    pub fn function_code(mut self, value: impl Into<String>) -> Result<Self> {
        self.event.function_code = verbatim(value)?;
        Ok(self)
    }

    /// # Errors
    /// Returns error if the value contains a delimiter or control character.
    pub fn type_code(mut self, value: impl Into<String>) -> Result<Self> {
        self.event.type_code = verbatim(value)?;
        Ok(self)
    }

    /// # Errors
    /// Returns error if the value contains a delimiter or control character.
    pub fn online_flag(mut self, value: impl Into<String>) -> Result<Self> {
        self.event.online_flag = verbatim(value)?;
        Ok(self)
    }

    pub fn build(self) -> AccessEvent {
        self.event
    }
}

fn verbatim(value: impl Into<String>) -> Result<String> {
    let value = value.into();
    validate_field(&value)?;
    Ok(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameLayout;
    use chrono::{NaiveDate, Timelike};

    fn credential() -> CredentialCode {
        CredentialCode::new("000001").unwrap()
    }

    #[test]
    fn test_defaults_match_device() {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(8, 15, 30)
            .unwrap();
        let line = EventBuilder::new(credential())
            .timestamp(ts)
            .build()
            .to_line(&FrameLayout::henry());

        assert_eq!(
            line,
            "000001597[000[              000001[05/01/2026 08:15:30[1[1}000[03[0\n"
        );
    }

    #[test]
    fn test_now_has_whole_seconds() {
        let event = EventBuilder::new(credential()).build();
        assert_eq!(event.timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_rejects_delimiters() {
        assert!(EventBuilder::new(credential()).type_code("0[3").is_err());
        assert!(EventBuilder::new(credential()).access_flag("1}").is_err());
        assert!(EventBuilder::new(credential()).sequence_index("12a").is_err());
    }

    #[test]
    fn test_builder_output_parses_back() {
        let layout = FrameLayout::henry().with_credential_width(12);
        let event = EventBuilder::new(CredentialCode::new("98765").unwrap())
            .direction(AccessDirection::Exit)
            .online_flag("1")
            .unwrap()
            .build();

        let line = event.to_line(&layout);
        let parsed = AccessEvent::parse(line.trim_end(), &layout).unwrap();
        assert_eq!(parsed, event);
    }
}
