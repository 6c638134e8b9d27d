//! Tests for decrypted frame parsing.

use super::*;

#[test]
fn test_parse_extracts_payload_and_checks_corp_id() {
    let payload = parse(b"0004pongww-corp", "ww-corp").unwrap();

    assert_eq!(payload, "pong");
}

#[test]
fn test_parse_accepts_uppercase_hex_prefix() {
    let frame = format!("001A{}corp", "a".repeat(26));

    let payload = parse(frame.as_bytes(), "corp").unwrap();

    assert_eq!(payload.len(), 26);
}

#[test]
fn test_parse_accepts_empty_payload() {
    let payload = parse(b"0000corp", "corp").unwrap();

    assert_eq!(payload, "");
}

#[test]
fn test_parse_counts_payload_in_bytes() {
    // "你好" is six UTF-8 bytes.
    let frame = build("你好", "corp").unwrap();
    assert_eq!(&frame[..4], b"0006");

    let payload = parse(&frame, "corp").unwrap();

    assert_eq!(payload, "你好");
}

#[test]
fn test_parse_round_trips_built_frame() {
    let xml = "<xml><Content><![CDATA[hi]]></Content></xml>";
    let frame = build(xml, "ww1234").unwrap();

    assert_eq!(parse(&frame, "ww1234").unwrap(), xml);
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_parse_rejects_length_exceeding_available_bytes() {
    let result = parse(b"0010pong", "");

    assert!(matches!(result, Err(CallbackError::MalformedFrame { .. })));
}

#[test]
fn test_parse_rejects_length_one_past_end() {
    // Declared 9 bytes; "pongcorp" is only 8.
    let result = parse(b"0009pongcorp", "corp");

    assert!(matches!(result, Err(CallbackError::MalformedFrame { .. })));
}

#[test]
fn test_parse_rejects_non_hex_prefix() {
    for frame in [&b"00g4pongcorp"[..], b"+004pongcorp", b" 004pongcorp"] {
        let result = parse(frame, "corp");

        assert!(
            matches!(result, Err(CallbackError::MalformedFrame { .. })),
            "frame {:?} should be rejected",
            String::from_utf8_lossy(frame)
        );
    }
}

#[test]
fn test_parse_rejects_short_frame() {
    let result = parse(b"00", "corp");

    assert!(matches!(result, Err(CallbackError::MalformedFrame { .. })));
}

#[test]
fn test_parse_rejects_invalid_utf8() {
    let result = parse(&[b'0', b'0', b'0', b'1', 0xff, b'c'], "c");

    assert!(matches!(result, Err(CallbackError::MalformedFrame { .. })));
}

#[test]
fn test_parse_rejects_length_splitting_a_character() {
    // "你" is three bytes; a declared length of 2 lands inside it.
    let mut frame = b"0002".to_vec();
    frame.extend_from_slice("你corp".as_bytes());

    let result = parse(&frame, "corp");

    assert!(matches!(result, Err(CallbackError::MalformedFrame { .. })));
}

#[test]
fn test_parse_rejects_corp_id_differing_by_one_byte() {
    let frame = build("pong", "ww-corp").unwrap();

    assert_eq!(parse(&frame, "ww-corq"), Err(CallbackError::TenantMismatch));
    assert_eq!(parse(&frame, "ww-cor"), Err(CallbackError::TenantMismatch));
    assert_eq!(parse(&frame, "ww-corpx"), Err(CallbackError::TenantMismatch));
    assert_eq!(parse(&frame, "WW-CORP"), Err(CallbackError::TenantMismatch));
}

#[test]
fn test_parse_rejects_missing_corp_id() {
    assert_eq!(parse(b"0004pong", "corp"), Err(CallbackError::TenantMismatch));
}

#[test]
fn test_build_rejects_oversized_payload() {
    let payload = "x".repeat(MAX_PAYLOAD_LEN + 1);

    assert!(matches!(
        build(&payload, "corp"),
        Err(CallbackError::MalformedFrame { .. })
    ));
}
