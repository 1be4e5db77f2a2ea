use crate::{
    Result,
    constants::{DELIMITER_FIELD, DELIMITER_FLAGS, DENY_BYTE, GRANT_BYTE},
    error::Error,
};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Credential (enrollment number) presented at the turnstile.
///
/// The device pads this field with spaces to a fixed width; the value held
/// here is always trimmed.
///
/// # Security
/// This type implements constant-time comparison to prevent timing attacks
/// when comparing credentials.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialCode(String);

impl CredentialCode {
    /// Create a credential code, trimming surrounding whitespace.
    ///
    /// An empty value is accepted: the device emits blank credentials for
    /// some events and the bridge must still answer them.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` if the value contains a wire
    /// delimiter, a control character or non-ASCII characters.
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();

        if !code.is_ascii() {
            return Err(Error::InvalidCredential {
                reason: "credential must be ASCII".to_string(),
            });
        }

        if code
            .chars()
            .any(|c| c == DELIMITER_FIELD || c == DELIMITER_FLAGS || c.is_ascii_control())
        {
            return Err(Error::InvalidCredential {
                reason: format!("credential '{code}' contains reserved characters"),
            });
        }

        Ok(CredentialCode(code.to_string()))
    }

    /// Get the credential as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the credential carries no identity.
    ///
    /// The device reports unidentified reads as an empty field or as a run
    /// of zeros.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }
}

impl fmt::Display for CredentialCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CredentialCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CredentialCode::new(s)
    }
}

/// Constant-time comparison implementation for CredentialCode
impl PartialEq for CredentialCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for CredentialCode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Direction of the turnstile arm reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessDirection {
    Undefined,
    Entry,
    Exit,
    /// Firmware-specific code outside the documented set.
    Device(u8),
}

impl AccessDirection {
    /// Create a direction from its numeric wire code.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => AccessDirection::Undefined,
            1 => AccessDirection::Entry,
            2 => AccessDirection::Exit,
            other => AccessDirection::Device(other),
        }
    }

    /// Parse the direction field of an event line.
    ///
    /// # Errors
    /// Returns `Error::InvalidDirection` if the field is empty, contains
    /// anything but ASCII digits or does not fit in a byte.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDirection {
                code: code.to_string(),
            });
        }
        code.parse::<u8>()
            .map(AccessDirection::from_u8)
            .map_err(|_| Error::InvalidDirection {
                code: code.to_string(),
            })
    }

    /// Numeric wire code.
    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            AccessDirection::Undefined => 0,
            AccessDirection::Entry => 1,
            AccessDirection::Exit => 2,
            AccessDirection::Device(code) => code,
        }
    }

    /// Label understood by the academy backend.
    #[must_use]
    pub fn backend_label(self) -> String {
        match self {
            AccessDirection::Undefined => "INDEFINIDO".to_string(),
            AccessDirection::Entry => "ENTRADA".to_string(),
            AccessDirection::Exit => "SAIDA".to_string(),
            AccessDirection::Device(code) => code.to_string(),
        }
    }
}

impl fmt::Display for AccessDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessDirection::Undefined => write!(f, "Undefined"),
            AccessDirection::Entry => write!(f, "Entry"),
            AccessDirection::Exit => write!(f, "Exit"),
            AccessDirection::Device(code) => write!(f, "Device({code})"),
        }
    }
}

/// Binary answer returned to the turnstile.
///
/// The default is [`Verdict::Deny`]: anything that is not an explicit grant
/// keeps the arm locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Verdict {
    Grant,
    #[default]
    Deny,
}

impl Verdict {
    /// Wire byte for this verdict.
    #[inline]
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Verdict::Grant => GRANT_BYTE,
            Verdict::Deny => DENY_BYTE,
        }
    }

    /// Decode a response byte.
    ///
    /// # Errors
    /// Returns `Error::InvalidVerdictByte` for any byte other than `0x00`
    /// or `0x01`.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            GRANT_BYTE => Ok(Verdict::Grant),
            DENY_BYTE => Ok(Verdict::Deny),
            other => Err(Error::InvalidVerdictByte { byte: other }),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Grant => write!(f, "GRANT"),
            Verdict::Deny => write!(f, "DENY"),
        }
    }
}

/// Academy unit (site) the bridge instance serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(Uuid);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UnitId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(UnitId)
            .map_err(|_| Error::InvalidUnitId {
                value: s.to_string(),
            })
    }
}

/// Time zone the device clock is assumed to run in.
///
/// The event line carries a naive local time. Unless configured otherwise
/// it is interpreted in the bridge host's local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceTimeZone {
    #[default]
    HostLocal,
    Fixed(FixedOffset),
}

impl DeviceTimeZone {
    /// Attach an offset to a device timestamp.
    ///
    /// # DST Handling
    ///
    /// With [`DeviceTimeZone::HostLocal`], ambiguous times (fall back) take
    /// the earlier occurrence and non-existent times (spring forward gap)
    /// are rejected.
    ///
    /// # Errors
    /// Returns `Error::InvalidTimestamp` if the local time does not exist.
    pub fn resolve(&self, naive: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
        match self {
            DeviceTimeZone::HostLocal => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&dt.offset().fix()))
                .ok_or_else(|| Error::InvalidTimestamp {
                    value: naive.to_string(),
                    reason: "local time does not exist (DST transition)".to_string(),
                }),
            DeviceTimeZone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| Error::InvalidTimestamp {
                    value: naive.to_string(),
                    reason: format!("cannot apply offset {offset}"),
                }),
        }
    }
}

impl fmt::Display for DeviceTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceTimeZone::HostLocal => write!(f, "local"),
            DeviceTimeZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl std::str::FromStr for DeviceTimeZone {
    type Err = Error;

    /// Accepts `local`, `Z`, `UTC` or a `±HH:MM` offset.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(DeviceTimeZone::HostLocal);
        }
        if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
            return Ok(DeviceTimeZone::Fixed(FixedOffset::east_opt(0).ok_or_else(
                || Error::Config("invalid UTC offset".to_string()),
            )?));
        }

        let invalid = || Error::Config(format!("invalid UTC offset '{s}', expected ±HH:MM"));

        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(DeviceTimeZone::Fixed)
            .ok_or_else(invalid)
    }
}
