use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Frame errors
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Frame too long: {size} bytes without terminator (max {max_size})")]
    FrameTooLong { size: usize, max_size: usize },

    #[error("No complete frame received within {timeout_ms}ms")]
    FrameTimeout { timeout_ms: u64 },

    // Field errors
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Invalid direction code: '{code}'")]
    InvalidDirection { code: String },

    #[error("Invalid credential code: {reason}")]
    InvalidCredential { reason: String },

    #[error("Invalid unit identifier '{value}'")]
    InvalidUnitId { value: String },

    // Response errors
    #[error("Unexpected verdict byte 0x{byte:02x}")]
    InvalidVerdictByte { byte: u8 },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for [`Error::MalformedFrame`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Returns `true` when the device payload itself was at fault.
    ///
    /// Oversized buffers and bad field values count as malformed input;
    /// timeouts and socket failures do not.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::MalformedFrame { .. }
                | Error::FrameTooLong { .. }
                | Error::InvalidTimestamp { .. }
                | Error::InvalidDirection { .. }
                | Error::InvalidCredential { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_classification() {
        assert!(Error::malformed("missing delimiter").is_malformed());
        assert!(
            Error::FrameTooLong {
                size: 600,
                max_size: 512
            }
            .is_malformed()
        );
        assert!(!Error::FrameTimeout { timeout_ms: 2000 }.is_malformed());
        assert!(!Error::Io(std::io::Error::other("reset")).is_malformed());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidVerdictByte { byte: 0x7f };
        assert_eq!(err.to_string(), "Unexpected verdict byte 0x7f");
    }
}
