use bytes::Bytes;
use henry_core::{Error, Result, constants::RAW_PREVIEW_LEN};
use std::fmt;

use crate::{event::AccessEvent, layout::FrameLayout};

/// One line as received from the socket, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Bytes,
}

impl RawFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// View the line as text.
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if the line is not valid UTF-8.
    pub fn as_text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| Error::malformed(format!("line is not valid UTF-8: {e}")))
    }

    /// Escaped and truncated rendering for log records.
    ///
    /// # Example
    ///
    /// ```
    /// use henry_protocol::RawFrame;
    ///
    /// let frame = RawFrame::new(&b"1[2\x07"[..]);
    /// assert_eq!(frame.preview(), "1[2\\u{7}");
    /// ```
    #[must_use]
    pub fn preview(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        let mut preview: String = text
            .chars()
            .take(RAW_PREVIEW_LEN)
            .flat_map(char::escape_debug)
            .collect();
        if text.chars().count() > RAW_PREVIEW_LEN {
            preview.push_str("...");
        }
        preview
    }

    /// Decode the line into an [`AccessEvent`].
    ///
    /// # Errors
    /// See [`AccessEvent::parse`].
    pub fn parse(&self, layout: &FrameLayout) -> Result<AccessEvent> {
        AccessEvent::parse(self.as_text()?, layout)
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.preview())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates() {
        let frame = RawFrame::new(vec![b'9'; 200]);
        let preview = frame.preview();
        assert_eq!(preview.len(), RAW_PREVIEW_LEN + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_preview_short_line_untouched() {
        let frame = RawFrame::new(&b"000001597[000"[..]);
        assert_eq!(frame.preview(), "000001597[000");
        assert_eq!(frame.to_string(), "000001597[000");
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let frame = RawFrame::new(&[0xff, 0xfe, b'['][..]);
        assert!(matches!(
            frame.parse(&FrameLayout::henry()),
            Err(Error::MalformedFrame { .. })
        ));
        assert_eq!(frame.size(), 3);
    }
}
