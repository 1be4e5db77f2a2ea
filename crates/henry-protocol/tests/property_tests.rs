//! Property-based tests for the event line.
//!
//! Any event the device could produce must survive `to_line` followed by
//! `parse` unchanged, for every credential width the device can be
//! configured with.

use chrono::{NaiveDate, NaiveDateTime};
use henry_core::{AccessDirection, CredentialCode};
use henry_protocol::{AccessEvent, BridgeCodec, FrameLayout};
use proptest::prelude::*;
use tokio_util::codec::Decoder;

/// Credentials are enrollment numbers, optionally alphanumeric.
fn valid_credential() -> impl Strategy<Value = CredentialCode> {
    prop::string::string_regex("[0-9A-Za-z]{1,20}")
        .expect("Failed to create credential regex strategy")
        .prop_map(|s| CredentialCode::new(&s).expect("generated credential is valid"))
}

/// Whole-second timestamps the four-digit year format can carry.
fn valid_timestamp() -> impl Strategy<Value = NaiveDateTime> {
    (1000i32..=9999, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .and_then(|date| date.and_hms_opt(h, mi, s))
                .expect("generated date is valid")
        },
    )
}

fn valid_direction() -> impl Strategy<Value = AccessDirection> {
    any::<u8>().prop_map(AccessDirection::from_u8)
}

fn digits(max: usize) -> impl Strategy<Value = String> {
    prop::string::string_regex(&format!("[0-9]{{1,{max}}}"))
        .expect("Failed to create digits regex strategy")
}

prop_compose! {
    fn valid_event()(
        sequence_index in digits(9),
        access_code in digits(3),
        credential in valid_credential(),
        timestamp in valid_timestamp(),
        direction in valid_direction(),
        access_flag in digits(1),
        function_code in digits(3),
        type_code in digits(2),
        online_flag in digits(1),
    ) -> AccessEvent {
        AccessEvent {
            sequence_index,
            access_code,
            credential,
            timestamp,
            direction,
            access_flag,
            function_code,
            type_code,
            online_flag,
        }
    }
}

proptest! {
    /// Property: parse(to_line(event)) == event.
    #[test]
    fn prop_event_line_roundtrip(event in valid_event(), width in 0usize..=32) {
        let layout = FrameLayout::henry().with_credential_width(width);
        let line = event.to_line(&layout);

        prop_assert!(line.ends_with('\n'));
        let parsed = AccessEvent::parse(line.trim_end_matches('\n'), &layout).unwrap();
        prop_assert_eq!(parsed, event);
    }

    /// Property: splitting the byte stream at any point yields the same frame.
    #[test]
    fn prop_codec_split_anywhere(event in valid_event(), split in 0usize..200) {
        let layout = FrameLayout::henry();
        let line = event.to_line(&layout);
        let split = split.min(line.len());

        let mut codec = BridgeCodec::new();
        let mut buf = bytes::BytesMut::from(&line.as_bytes()[..split]);
        let early = codec.decode(&mut buf).unwrap();
        prop_assert!(early.is_none() || split == line.len());

        buf.extend_from_slice(&line.as_bytes()[split..]);
        let frame = match early {
            Some(frame) => frame,
            None => codec.decode(&mut buf).unwrap().unwrap(),
        };
        prop_assert_eq!(frame.parse(&layout).unwrap(), event);
    }

    /// Property: arbitrary bytes never panic the decoder.
    #[test]
    fn prop_codec_never_panics(input in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut codec = BridgeCodec::new();
        let mut buf = bytes::BytesMut::from(&input[..]);
        while let Ok(Some(frame)) = codec.decode(&mut buf) {
            let _ = frame.parse(&FrameLayout::henry());
        }
    }
}
