//! Core constants for the Henry online-event bridge.
//!
//! This module defines the wire-level constants of the Henry turnstile
//! online event line and the timing defaults used by the bridge.
//!
//! # Event Line Structure
//!
//! When online biometric validation is enabled, the turnstile opens a TCP
//! connection and emits one newline-terminated line per access attempt:
//!
//! ```text
//! 000001597[000[      000001        [05/01/2026 08:15:30[1[1}000[03[0\n
//! ```
//!
//! Fields, left to right:
//! - sequence index (device counter, digits)
//! - access code
//! - credential code (space padded to a fixed width, usually 20)
//! - date and time `dd/mm/yyyy hh:mm:ss`
//! - direction (`1` entry, `2` exit)
//! - access flag, then `}` instead of `[`
//! - function code
//! - entry type
//! - online flag
//!
//! # Delimiter Semantics
//!
//! | Delimiter | Name | Purpose |
//! |-----------|------|---------|
//! | `[` | DELIMITER_FIELD | Separates most fields |
//! | `}` | DELIMITER_FLAGS | Separates access flag from function code |
//! | `\n` | LINE_TERMINATOR | Ends the event line |
//!
//! The bridge answers with exactly one byte: [`GRANT_BYTE`] or [`DENY_BYTE`].

// ============================================================================
// Wire Delimiters
// ============================================================================

/// Main field separator of the event line.
///
/// # Examples
///
/// ```
/// use henry_core::constants::DELIMITER_FIELD;
///
/// let line = "000001597[000[000001";
/// let parts: Vec<&str> = line.split(DELIMITER_FIELD).collect();
/// assert_eq!(parts, vec!["000001597", "000", "000001"]);
/// ```
pub const DELIMITER_FIELD: char = '[';

/// Separator between the access flag and the function code.
///
/// # Examples
///
/// ```
/// use henry_core::constants::DELIMITER_FLAGS;
///
/// let segment = "1}000";
/// assert_eq!(segment.split_once(DELIMITER_FLAGS), Some(("1", "000")));
/// ```
pub const DELIMITER_FLAGS: char = '}';

/// Line terminator closing every event.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Optional carriage return some firmware revisions emit before `\n`.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Timestamp layout used on the wire (`dd/mm/yyyy hh:mm:ss`).
///
/// # Examples
///
/// ```
/// use chrono::NaiveDateTime;
/// use henry_core::constants::TIMESTAMP_FORMAT;
///
/// let ts = NaiveDateTime::parse_from_str("05/01/2026 08:15:30", TIMESTAMP_FORMAT).unwrap();
/// assert_eq!(ts.format(TIMESTAMP_FORMAT).to_string(), "05/01/2026 08:15:30");
/// ```
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

// ============================================================================
// Verdict Bytes
// ============================================================================

/// Response byte releasing the turnstile arm.
pub const GRANT_BYTE: u8 = 0x01;

/// Response byte keeping the turnstile locked.
pub const DENY_BYTE: u8 = 0x00;

// ============================================================================
// Frame Limits
// ============================================================================

/// Default width the device pads the credential field to.
///
/// # Value: 20 characters
pub const DEFAULT_CREDENTIAL_WIDTH: usize = 20;

/// Default maximum length of a buffered line without terminator.
///
/// A well-formed event is about 70 bytes. Anything growing past this limit
/// without a newline is treated as a misbehaving device.
///
/// # Value: 512 bytes
pub const DEFAULT_MAX_FRAME_LEN: usize = 512;

/// Number of characters of a raw payload kept in log records.
pub const RAW_PREVIEW_LEN: usize = 64;

// ============================================================================
// Network Defaults
// ============================================================================

/// Port the turnstile is configured to reach in server mode.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Webhook path of the academy backend check-in endpoint.
pub const DEFAULT_WEBHOOK_ENDPOINT: &str = "/api/catraca/webhook";

// ============================================================================
// Timing
// ============================================================================

/// Time allowed between accepting a connection and receiving a full line.
///
/// # Value: 2000ms
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 2000;

/// Time allowed for the backend decision once the line has been received.
///
/// # Value: 2000ms
///
/// # Examples
///
/// ```
/// use henry_core::constants::*;
///
/// assert!(DEFAULT_DECISION_TIMEOUT_MS + WRITE_MARGIN_MS <= DEFAULT_DEVICE_WINDOW_MS);
/// ```
pub const DEFAULT_DECISION_TIMEOUT_MS: u64 = 2000;

/// How long the turnstile waits for the verdict byte after sending a line.
///
/// # Value: 3000ms
pub const DEFAULT_DEVICE_WINDOW_MS: u64 = 3000;

/// Lowest accepted decision timeout.
///
/// Values below this threshold cause spurious denies even on a fast LAN.
///
/// # Value: 500ms
pub const MIN_DECISION_TIMEOUT_MS: u64 = 500;

/// Lowest accepted frame read timeout.
///
/// # Value: 100ms
pub const MIN_FRAME_TIMEOUT_MS: u64 = 100;

/// Slack kept between the decision deadline and the device window for the
/// verdict write itself.
///
/// # Value: 250ms
pub const WRITE_MARGIN_MS: u64 = 250;

/// Upper bound for writing and flushing the verdict byte.
///
/// Equal to [`WRITE_MARGIN_MS`] so a write that runs to its timeout still
/// ends inside the device window.
///
/// # Value: 250ms
pub const WRITE_TIMEOUT_MS: u64 = WRITE_MARGIN_MS;

// ============================================================================
// Simulator Defaults
// ============================================================================

/// Sequence index sent by the bundled device simulator.
pub const SIMULATOR_SEQUENCE_INDEX: &str = "000001597";

/// Access code sent by the bundled device simulator.
pub const SIMULATOR_ACCESS_CODE: &str = "000";

/// Access flag the device reports for an online request.
pub const SIMULATOR_ACCESS_FLAG: &str = "1";

/// Function code sent by the bundled device simulator.
pub const SIMULATOR_FUNCTION_CODE: &str = "000";

/// Entry type sent by the bundled device simulator (biometric).
pub const SIMULATOR_TYPE_CODE: &str = "03";

/// Online flag sent by the bundled device simulator.
pub const SIMULATOR_ONLINE_FLAG: &str = "0";
