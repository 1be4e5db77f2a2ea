//! Declarative field table of the event line.
//!
//! The Henry online event is a flat list of fields, each closed by a
//! delimiter. Rather than hard-coding split positions, the grammar is a
//! table of [`FieldSpec`] entries walked left to right. A firmware revision
//! that changes a delimiter, a width or the field order is a change to this
//! table, not to the parser.
//!
//! ```text
//! 000001597[000[      000001        [05/01/2026 08:15:30[1[1}000[03[0
//! └──seq──┘ └┬┘ └────credential────┘ └────timestamp────┘ │ │ └┬┘ └┤ │
//!        access code                          direction ─┘ │  │   │ └─ online
//!                                           access flag ───┘  │   └─ type
//!                                                 function ───┘
//! ```

use henry_core::{
    Error, Result,
    constants::{DEFAULT_CREDENTIAL_WIDTH, DELIMITER_FIELD, DELIMITER_FLAGS},
};
use std::borrow::Cow;
use std::fmt;

use crate::validation::{validate_digits, validate_timestamp_shape};

/// Logical fields of an access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SequenceIndex,
    AccessCode,
    Credential,
    Timestamp,
    Direction,
    AccessFlag,
    FunctionCode,
    TypeCode,
    OnlineFlag,
}

impl Field {
    /// Human readable name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Field::SequenceIndex => "sequence index",
            Field::AccessCode => "access code",
            Field::Credential => "credential",
            Field::Timestamp => "timestamp",
            Field::Direction => "direction",
            Field::AccessFlag => "access flag",
            Field::FunctionCode => "function code",
            Field::TypeCode => "type code",
            Field::OnlineFlag => "online flag",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a field's raw text is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty ASCII digits.
    Digits,
    /// Padded with spaces to the layout's credential width.
    Padded,
    /// `dd/mm/yyyy hh:mm:ss`.
    Timestamp,
    /// Passed through without interpretation.
    Verbatim,
}

/// One entry of the field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    pub kind: FieldKind,
    /// Delimiter closing this field; `None` for the last field of the line.
    pub terminator: Option<char>,
}

impl FieldSpec {
    const fn new(field: Field, kind: FieldKind, terminator: Option<char>) -> Self {
        Self {
            field,
            kind,
            terminator,
        }
    }
}

/// Field table of the Henry online event (Primme SF / Henry8X firmware).
pub const HENRY_ONLINE_EVENT: [FieldSpec; 9] = [
    FieldSpec::new(Field::SequenceIndex, FieldKind::Digits, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::AccessCode, FieldKind::Verbatim, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::Credential, FieldKind::Padded, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::Timestamp, FieldKind::Timestamp, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::Direction, FieldKind::Digits, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::AccessFlag, FieldKind::Verbatim, Some(DELIMITER_FLAGS)),
    FieldSpec::new(Field::FunctionCode, FieldKind::Verbatim, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::TypeCode, FieldKind::Verbatim, Some(DELIMITER_FIELD)),
    FieldSpec::new(Field::OnlineFlag, FieldKind::Verbatim, None),
];

/// Raw field values of one line, in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValues<'a> {
    values: Vec<(Field, &'a str)>,
}

impl<'a> FieldValues<'a> {
    /// Raw text of a field as it appeared on the wire.
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if the layout has no such field.
    pub fn get(&self, field: Field) -> Result<&'a str> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| *value)
            .ok_or_else(|| Error::malformed(format!("layout has no {field} field")))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Layout of an event line: the field table plus the credential width.
///
/// # Example
///
/// ```
/// use henry_protocol::{Field, FrameLayout};
///
/// let layout = FrameLayout::henry();
/// let values = layout
///     .split("000001597[000[      000001        [05/01/2026 08:15:30[1[1}000[03[0")
///     .unwrap();
///
/// assert_eq!(values.get(Field::SequenceIndex).unwrap(), "000001597");
/// assert_eq!(values.get(Field::AccessFlag).unwrap(), "1");
/// assert_eq!(values.get(Field::FunctionCode).unwrap(), "000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    fields: &'static [FieldSpec],
    credential_width: usize,
}

impl FrameLayout {
    /// Layout of the stock Henry firmware.
    #[must_use]
    pub const fn henry() -> Self {
        Self {
            fields: &HENRY_ONLINE_EVENT,
            credential_width: DEFAULT_CREDENTIAL_WIDTH,
        }
    }

    /// Build a layout from a custom field table.
    ///
    /// # Errors
    /// Returns `Error::Config` unless exactly the last entry has no
    /// terminator.
    pub fn custom(fields: &'static [FieldSpec], credential_width: usize) -> Result<Self> {
        let open_fields = fields.iter().filter(|s| s.terminator.is_none()).count();
        let last_is_open = fields.last().is_some_and(|s| s.terminator.is_none());
        if open_fields != 1 || !last_is_open {
            return Err(Error::Config(
                "field table must end with exactly one unterminated field".to_string(),
            ));
        }
        Ok(Self {
            fields,
            credential_width,
        })
    }

    /// Use a different padding width for the credential field.
    #[must_use]
    pub fn with_credential_width(mut self, width: usize) -> Self {
        self.credential_width = width;
        self
    }

    #[must_use]
    pub fn credential_width(&self) -> usize {
        self.credential_width
    }

    #[must_use]
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Split a line (without its terminator) into raw field values.
    ///
    /// Each field runs up to its terminator. The last field runs up to the
    /// next delimiter, if any: fields appended by newer firmware are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedFrame` when a terminator is missing, a field
    /// swallows another field's delimiter, or a `Digits` field is not
    /// numeric, and `Error::InvalidTimestamp` when the timestamp field does
    /// not have the `dd/mm/yyyy hh:mm:ss` shape.
    pub fn split<'a>(&self, line: &'a str) -> Result<FieldValues<'a>> {
        let mut rest = line;
        let mut values = Vec::with_capacity(self.fields.len());

        for spec in self.fields {
            let value = match spec.terminator {
                Some(delimiter) => {
                    let (value, tail) = rest.split_once(delimiter).ok_or_else(|| {
                        Error::malformed(format!(
                            "missing '{delimiter}' after {} field",
                            spec.field
                        ))
                    })?;
                    rest = tail;
                    value
                }
                None => {
                    let end = rest
                        .find([DELIMITER_FIELD, DELIMITER_FLAGS])
                        .unwrap_or(rest.len());
                    let value = &rest[..end];
                    rest = "";
                    value
                }
            };

            if value.contains([DELIMITER_FIELD, DELIMITER_FLAGS]) {
                return Err(Error::malformed(format!(
                    "unexpected delimiter inside {} field",
                    spec.field
                )));
            }

            Self::check_kind(spec, value)?;
            values.push((spec.field, value));
        }

        Ok(FieldValues { values })
    }

    /// Render field values into a line (without terminator).
    ///
    /// `value_of` supplies the text of each field; `Padded` fields are
    /// right-aligned to the credential width.
    pub fn render<'b>(&self, value_of: impl Fn(Field) -> Cow<'b, str>) -> String {
        let mut line = String::with_capacity(80);
        for spec in self.fields {
            let value = value_of(spec.field);
            match spec.kind {
                FieldKind::Padded => {
                    line.push_str(&format!("{:>width$}", value, width = self.credential_width))
                }
                _ => line.push_str(&value),
            }
            if let Some(delimiter) = spec.terminator {
                line.push(delimiter);
            }
        }
        line
    }

    fn check_kind(spec: &FieldSpec, value: &str) -> Result<()> {
        match spec.kind {
            FieldKind::Digits => validate_digits(spec.field.name(), value.trim()),
            FieldKind::Timestamp => validate_timestamp_shape(value.trim()),
            FieldKind::Padded | FieldKind::Verbatim => Ok(()),
        }
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::henry()
    }
}
