//! Tokio codecs for the event line.
//!
//! Two codecs cover the two ends of a device connection:
//!
//! - [`BridgeCodec`]: the bridge side. Decodes newline-terminated lines into
//!   [`RawFrame`]s and encodes the single [`Verdict`] byte.
//! - [`TurnstileCodec`]: the device side. Encodes [`AccessEvent`] lines and
//!   decodes the verdict byte. Used by the simulator and tests.
//!
//! ```text
//! Turnstile ── "000001597[...[0\n" ──> BridgeCodec::decode -> RawFrame
//! Turnstile <────────── 0x01 ───────── BridgeCodec::encode(Verdict::Grant)
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use henry_core::Verdict;
//! use henry_protocol::{BridgeCodec, FrameLayout};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn example(stream: TcpStream) -> henry_core::Result<()> {
//! let mut framed = Framed::new(stream, BridgeCodec::new());
//!
//! if let Some(frame) = framed.next().await.transpose()? {
//!     let event = frame.parse(&FrameLayout::henry())?;
//!     println!("credential {}", event.credential);
//!     framed.send(Verdict::Deny).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # DoS Protection
//!
//! A device that keeps sending bytes without a line terminator is cut off
//! once the buffer exceeds the configured maximum
//! ([`DEFAULT_MAX_FRAME_LEN`] by default) with `Error::FrameTooLong`.

use bytes::{Buf, BufMut, BytesMut};
use henry_core::{
    Error, Result, Verdict,
    constants::{CARRIAGE_RETURN, DEFAULT_MAX_FRAME_LEN, LINE_TERMINATOR},
};
use tokio_util::codec::{Decoder, Encoder};

use crate::{event::AccessEvent, frame::RawFrame, layout::FrameLayout};

/// Bridge-side codec: lines in, verdict byte out.
#[derive(Debug, Clone)]
pub struct BridgeCodec {
    max_frame_len: usize,
    /// Offset up to which the buffer has already been scanned for `\n`.
    next_index: usize,
}

impl BridgeCodec {
    /// Codec with the default line length limit.
    ///
    /// # Example
    ///
    /// ```
    /// use henry_protocol::BridgeCodec;
    ///
    /// let codec = BridgeCodec::new();
    /// assert_eq!(codec.max_frame_len(), 512);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            next_index: 0,
        }
    }

    #[must_use]
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn too_long(&self, size: usize) -> Error {
        Error::FrameTooLong {
            size,
            max_size: self.max_frame_len,
        }
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = RawFrame;
    type Error = Error;

    /// Extract the next non-blank line.
    ///
    /// A trailing `\r` is removed. Lines holding only whitespace are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLong` when the line, or the unterminated
    /// buffer, exceeds the configured maximum.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>> {
        loop {
            let Some(offset) = src[self.next_index..]
                .iter()
                .position(|&b| b == LINE_TERMINATOR)
            else {
                if src.len() > self.max_frame_len {
                    return Err(self.too_long(src.len()));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;

            let mut line = src.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&CARRIAGE_RETURN) {
                line.truncate(line.len() - 1);
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if line.len() > self.max_frame_len {
                return Err(self.too_long(line.len()));
            }

            return Ok(Some(RawFrame::new(line.freeze())));
        }
    }

    /// # Errors
    ///
    /// Returns `Error::MalformedFrame` when the peer closed the connection
    /// with a partial line still buffered.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.iter().all(u8::is_ascii_whitespace) {
            src.clear();
            self.next_index = 0;
            return Ok(None);
        }
        Err(Error::malformed(format!(
            "connection closed before line terminator ({} bytes buffered)",
            src.len()
        )))
    }
}

impl Encoder<Verdict> for BridgeCodec {
    type Error = Error;

    fn encode(&mut self, verdict: Verdict, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(1);
        dst.put_u8(verdict.as_byte());
        Ok(())
    }
}

/// Device-side codec: event lines out, verdict byte in.
#[derive(Debug, Clone, Default)]
pub struct TurnstileCodec {
    layout: FrameLayout,
}

impl TurnstileCodec {
    #[must_use]
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }
}

impl Encoder<AccessEvent> for TurnstileCodec {
    type Error = Error;

    fn encode(&mut self, event: AccessEvent, dst: &mut BytesMut) -> Result<()> {
        let line = event.to_line(&self.layout);
        dst.reserve(line.len());
        dst.put_slice(line.as_bytes());
        Ok(())
    }
}

impl Decoder for TurnstileCodec {
    type Item = Verdict;
    type Error = Error;

    /// # Errors
    /// Returns `Error::InvalidVerdictByte` for anything but `0x00`/`0x01`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Verdict>> {
        if src.is_empty() {
            return Ok(None);
        }
        Verdict::from_byte(src.get_u8()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const LINE: &[u8] = b"000001597[000[      000001        [05/01/2026 08:15:30[1[1}000[03[0";

    fn decode_all(codec: &mut BridgeCodec, input: &[u8]) -> Vec<RawFrame> {
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_decode_complete_line() {
        let mut input = LINE.to_vec();
        input.push(b'\n');

        let frames = decode_all(&mut BridgeCodec::new(), &input);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), LINE);
    }

    #[test]
    fn test_decode_partial_then_rest() {
        let mut codec = BridgeCodec::new();
        let mut buf = BytesMut::from(&LINE[..20]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.next_index, 20);

        buf.extend_from_slice(&LINE[20..]);
        buf.extend_from_slice(b"\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.as_bytes(), LINE);
        assert!(buf.is_empty());
    }

    #[rstest]
    #[case::crlf(b"abc\r\n", b"abc")]
    #[case::leading_blank_lines(b"\n\r\n  \nabc\n", b"abc")]
    #[case::bare_cr_kept_inside(b"a\rb\n", b"a\rb")]
    fn test_decode_line_endings(#[case] input: &[u8], #[case] expected: &[u8]) {
        let frames = decode_all(&mut BridgeCodec::new(), input);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), expected);
    }

    #[test]
    fn test_decode_rejects_unterminated_overflow() {
        let mut codec = BridgeCodec::with_max_frame_len(16);
        let mut buf = BytesMut::from(&[b'1'; 17][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::FrameTooLong {
                size: 17,
                max_size: 16
            })
        ));
    }

    #[test]
    fn test_decode_rejects_long_terminated_line() {
        let mut codec = BridgeCodec::with_max_frame_len(4);
        let mut buf = BytesMut::from(&b"12345\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::FrameTooLong { size: 5, .. })
        ));
    }

    #[test]
    fn test_decode_eof_with_partial_line_is_malformed() {
        let mut codec = BridgeCodec::new();
        let mut buf = BytesMut::from(&LINE[..30]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_decode_eof_on_empty_buffer() {
        let mut codec = BridgeCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[rstest]
    #[case(Verdict::Grant, 0x01)]
    #[case(Verdict::Deny, 0x00)]
    fn test_encode_verdict(#[case] verdict: Verdict, #[case] byte: u8) {
        let mut buf = BytesMut::new();
        BridgeCodec::new().encode(verdict, &mut buf).unwrap();
        assert_eq!(&buf[..], &[byte]);
    }

    #[test]
    fn test_turnstile_codec_encodes_line() {
        let layout = FrameLayout::henry();
        let event = AccessEvent::parse(std::str::from_utf8(LINE).unwrap(), &layout).unwrap();

        let mut buf = BytesMut::new();
        TurnstileCodec::new(layout)
            .encode(event.clone(), &mut buf)
            .unwrap();

        assert_eq!(buf.last(), Some(&b'\n'));
        let frame = decode_all(&mut BridgeCodec::new(), &buf).remove(0);
        assert_eq!(frame.parse(&layout).unwrap(), event);
    }

    #[rstest]
    #[case(&[0x01], Verdict::Grant)]
    #[case(&[0x00, 0x01], Verdict::Deny)]
    fn test_turnstile_codec_decodes_verdict(#[case] input: &[u8], #[case] expected: Verdict) {
        let mut buf = BytesMut::from(input);
        let verdict = TurnstileCodec::default().decode(&mut buf).unwrap();
        assert_eq!(verdict, Some(expected));
    }

    #[test]
    fn test_turnstile_codec_rejects_unknown_byte() {
        let mut buf = BytesMut::from(&[0x7f][..]);
        assert!(matches!(
            TurnstileCodec::default().decode(&mut buf),
            Err(Error::InvalidVerdictByte { byte: 0x7f })
        ));
    }
}
