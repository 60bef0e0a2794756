//! Integration tests for the keg-core pipeline.
//!
//! These tests push bytes through the public API the same way the gateway's
//! listener does: decode frames, interpret them into pin events, and map the
//! events to telemetry fields.

use keg_core::protocol::interpreter::{self, EventPayload};
use keg_core::protocol::{
    decode, encode_command, encode_ok_response, CorrelationCounter, Frame, MessageKind,
    ResponseStatus,
};
use keg_core::telemetry::{validate_and_pad_1_and_2, TelemetryMapper, TelemetryValue};

fn text(value: &str) -> TelemetryValue {
    TelemetryValue::Text(value.to_string())
}

#[test]
fn test_roundtrip_data_frame_preserves_kind_correlation_and_body() {
    let counter = CorrelationCounter::new();
    for (kind, body) in [
        (MessageKind::Hardware, b"vw\x0048\x0075.5".as_slice()),
        (MessageKind::Property, b"51\x00max\x00100".as_slice()),
        (MessageKind::Internal, b"ver\x000.6.0".as_slice()),
        (MessageKind::GetSharedDash, b"device-42".as_slice()),
        (MessageKind::Ping, b"".as_slice()),
        (MessageKind::Unknown(250), b"??".as_slice()),
    ] {
        let id = counter.next();
        let bytes = encode_command(kind, id, body).expect("encode must succeed");
        let frames = decode(&bytes);
        assert_eq!(frames, vec![Frame::data(kind, id, body.to_vec())]);
    }
}

#[test]
fn test_response_frame_carries_status_only() {
    let frames = decode(&encode_ok_response(42));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].status(), Some(ResponseStatus::Success));
    assert_eq!(frames[0].correlation_id, 42);
    assert!(frames[0].body().is_empty());
}

#[test]
fn test_n_concatenated_frames_decode_in_order() {
    let mut buf = Vec::new();
    for i in 1..=10u16 {
        let body = format!("vw\u{0}48\u{0}{i}");
        buf.extend(encode_command(MessageKind::Hardware, i, body.as_bytes()).unwrap());
    }

    let events = interpreter::decode_list(&decode(&buf));

    assert_eq!(events.len(), 10);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.correlation_id as usize, i + 1);
        assert_eq!(event.payload, EventPayload::Text((i + 1).to_string()));
    }
}

/// Scenario: a single HARDWARE frame reporting the percentage of beer left.
#[test]
fn test_hardware_frame_maps_to_percent_of_beer_left() {
    // Arrange
    let bytes = encode_command(MessageKind::Hardware, 1, b"vw\x0048\x0075.5").unwrap();

    // Act
    let frames = decode(&bytes);
    let event = interpreter::interpret(&frames[0]);
    let field = TelemetryMapper::new().map(&event);

    // Assert
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].kind, MessageKind::Hardware);
    assert_eq!(frames[0].correlation_id, 1);
    assert_eq!(event.kind.as_deref(), Some("vw"));
    assert_eq!(event.pin.as_deref(), Some("48"));
    assert_eq!(event.payload, EventPayload::Text("75.5".to_string()));
    let field = field.expect("pin 48 must map");
    assert_eq!(field.name, "percent_of_beer_left");
    assert_eq!(field.value, text("75.5"));
}

/// Scenario: a HARDWARE and a PROPERTY frame arriving in one read.
#[test]
fn test_two_concatenated_frames_map_to_two_fields() {
    let mut buf = encode_command(MessageKind::Hardware, 1, b"vw\x0048\x0075").unwrap();
    buf.extend(encode_command(MessageKind::Property, 2, b"51\x00max\x00100").unwrap());

    let events = interpreter::decode_list(&decode(&buf));
    let fields = TelemetryMapper::new().decode_list(&events);

    let pairs: Vec<(&str, &TelemetryValue)> =
        fields.iter().map(|f| (f.name.as_str(), &f.value)).collect();
    assert_eq!(
        pairs,
        vec![
            ("percent_of_beer_left", &text("75")),
            ("max_keg_volume", &text("100")),
        ]
    );
}

#[test]
fn test_unknown_pin_only_survives_in_include_unknown_mode() {
    let bytes = encode_command(MessageKind::Hardware, 3, b"vw\x00120\x00on").unwrap();
    let events = interpreter::decode_list(&decode(&bytes));

    assert!(TelemetryMapper::new().decode_list(&events).is_empty());
    let kept = TelemetryMapper::including_unknown().decode_list(&events);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].name, "_hardware_vw_120");
}

/// Scenario: validating operator-settable two-choice values.
#[test]
fn test_validate_and_pad_scenario() {
    assert_eq!(validate_and_pad_1_and_2(Some("1")).as_deref(), Some("01"));
    assert_eq!(validate_and_pad_1_and_2(Some("3")), None);
}
