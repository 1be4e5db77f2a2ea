//! Field validation utilities for the event line.
//!
//! The event line has no escaping: a field value that contains `[`, `}` or a
//! line break would shift every following field. Values produced locally
//! (simulator, tests) go through [`validate_field`] before being written, and
//! values read from the wire are checked by kind in
//! [`FrameLayout::split`](crate::FrameLayout::split).
//!
//! # Examples
//!
//! ```
//! use henry_protocol::validate_field;
//!
//! assert!(validate_field("000").is_ok());
//! assert!(validate_field("03").is_ok());
//!
//! assert!(validate_field("1[2").is_err());
//! assert!(validate_field("1}2").is_err());
//! assert!(validate_field("1\n").is_err());
//! ```

use henry_core::{Error, Result, constants::*};

/// Validate a field value for wire safety.
///
/// # Errors
///
/// Returns `Error::MalformedFrame` if the value contains a delimiter or an
/// ASCII control character.
pub fn validate_field(field: &str) -> Result<()> {
    if let Some(c) = field
        .chars()
        .find(|&c| c == DELIMITER_FIELD || c == DELIMITER_FLAGS || c.is_ascii_control())
    {
        return Err(Error::malformed(format!(
            "field '{}' contains reserved character {:?}",
            field.escape_debug(),
            c
        )));
    }
    Ok(())
}

/// Validate a field that must be a non-empty run of ASCII digits.
///
/// # Errors
///
/// Returns `Error::MalformedFrame` naming the field.
pub fn validate_digits(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::malformed(format!("{name} field is empty")));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed(format!(
            "{name} field '{}' is not numeric",
            value.escape_debug()
        )));
    }
    Ok(())
}

/// Validate the shape `dd/mm/yyyy hh:mm:ss` before handing the value to
/// `chrono`, which would also accept unpadded components.
///
/// # Errors
///
/// Returns `Error::InvalidTimestamp` if any position does not match.
///
/// # Examples
///
/// ```
/// use henry_protocol::validation::validate_timestamp_shape;
///
/// assert!(validate_timestamp_shape("05/01/2026 08:15:30").is_ok());
/// assert!(validate_timestamp_shape("5/1/2026 8:15:30").is_err());
/// assert!(validate_timestamp_shape("2026-01-05 08:15:30").is_err());
/// ```
pub fn validate_timestamp_shape(value: &str) -> Result<()> {
    const SHAPE: &[u8; 19] = b"dd/dd/dddd dd:dd:dd";

    let bytes = value.as_bytes();
    let matches = bytes.len() == SHAPE.len()
        && bytes.iter().zip(SHAPE).all(|(b, s)| match s {
            b'd' => b.is_ascii_digit(),
            other => b == other,
        });

    if !matches {
        return Err(Error::InvalidTimestamp {
            value: value.escape_debug().to_string(),
            reason: "expected dd/mm/yyyy hh:mm:ss".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("000001597")]
    #[case("")]
    #[case("      000001        ")]
    #[case("05/01/2026 08:15:30")]
    fn test_validate_field_ok(#[case] value: &str) {
        assert!(validate_field(value).is_ok());
    }

    #[rstest]
    #[case("a[b")]
    #[case("a}b")]
    #[case("a\rb")]
    #[case("a\nb")]
    #[case("\0")]
    fn test_validate_field_rejects(#[case] value: &str) {
        assert!(matches!(
            validate_field(value),
            Err(Error::MalformedFrame { .. })
        ));
    }

    #[rstest]
    #[case("0")]
    #[case("000001597")]
    fn test_validate_digits_ok(#[case] value: &str) {
        assert!(validate_digits("sequence index", value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("12a")]
    #[case(" 12")]
    #[case("-1")]
    fn test_validate_digits_rejects(#[case] value: &str) {
        let err = validate_digits("sequence index", value).unwrap_err();
        assert!(err.to_string().contains("sequence index"));
    }

    #[rstest]
    #[case("05/01/2026 08:15:30")]
    #[case("31/12/1999 23:59:59")]
    #[case("99/99/9999 99:99:99")] // shape only; calendar checked by chrono
    fn test_timestamp_shape_ok(#[case] value: &str) {
        assert!(validate_timestamp_shape(value).is_ok());
    }

    #[rstest]
    #[case("05/01/2026 08:15")]
    #[case("05/01/2026T08:15:30")]
    #[case("05-01-2026 08:15:30")]
    #[case(" 05/01/2026 08:15:30")]
    #[case("")]
    fn test_timestamp_shape_rejects(#[case] value: &str) {
        assert!(matches!(
            validate_timestamp_shape(value),
            Err(Error::InvalidTimestamp { .. })
        ));
    }
}
