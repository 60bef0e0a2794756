//! Turns decoded frames into pin events.
//!
//! Frame bodies are ASCII tokens joined by NUL bytes.  The number of tokens
//! tells the interpreter what it is looking at:
//!
//! ```text
//! "vw\048\075.5"              3 tokens: event kind, pin, payload
//! "device-42"                 1 token:  identification payload
//! "ver\00.6\0h-beat\010"      INTERNAL: alternating key/value pairs
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::frame::{Frame, MessageKind, TOKEN_SEPARATOR};

/// Event kind and pin reported for one-token bodies.
pub const NOT_RELEVANT: &str = "not-relevant";

/// Event kind reported for INTERNAL frames.
pub const INTERNAL: &str = "internal";

/// Payload of a [`PinEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Frames without a body (PING, NOTIFY, responses).
    Empty,
    /// A single string value.
    Text(String),
    /// Key/value pairs from an INTERNAL frame.
    Map(BTreeMap<String, String>),
}

impl EventPayload {
    /// The single token of a `Text` payload (for example a device id).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The key/value pairs of an `INTERNAL` body, or `None` for any other payload.
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            EventPayload::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// One interpreted frame: what happened on which pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinEvent {
    /// Kind of the frame the event came from.
    pub message_kind: MessageKind,
    /// Correlation id of that frame.
    pub correlation_id: u16,
    /// Event kind token (e.g. `"vw"`), `"internal"`, `"not-relevant"`, or
    /// `None` when the frame carried nothing to interpret.
    pub kind: Option<String>,
    /// Pin token, or `None` alongside `kind`.
    pub pin: Option<String>,
    pub payload: EventPayload,
}

/// Interprets a single frame.
pub fn interpret(frame: &Frame) -> PinEvent {
    let passthrough = |payload| PinEvent {
        message_kind: frame.kind,
        correlation_id: frame.correlation_id,
        kind: None,
        pin: None,
        payload,
    };

    let body = frame.body();
    match frame.kind {
        MessageKind::Response | MessageKind::Ping | MessageKind::Notify => {
            return passthrough(EventPayload::Empty)
        }
        _ if body.is_empty() => return passthrough(EventPayload::Empty),
        MessageKind::Internal => {
            return PinEvent {
                message_kind: frame.kind,
                correlation_id: frame.correlation_id,
                kind: Some(INTERNAL.to_string()),
                pin: None,
                payload: EventPayload::Map(parse_key_values(body)),
            }
        }
        _ => {}
    }

    let mut tokens = split_tokens(body);
    match tokens.len() {
        3 => {
            let payload = tokens.pop().unwrap_or_default();
            let pin = tokens.pop().unwrap_or_default();
            let kind = tokens.pop().unwrap_or_default();
            PinEvent {
                message_kind: frame.kind,
                correlation_id: frame.correlation_id,
                kind: Some(kind),
                pin: Some(pin),
                payload: EventPayload::Text(payload),
            }
        }
        1 => PinEvent {
            message_kind: frame.kind,
            correlation_id: frame.correlation_id,
            kind: Some(NOT_RELEVANT.to_string()),
            pin: Some(NOT_RELEVANT.to_string()),
            payload: EventPayload::Text(tokens.pop().unwrap_or_default()),
        },
        count => {
            tracing::debug!(
                kind = ?frame.kind,
                tokens = count,
                "frame body has an unexpected token count; passing through"
            );
            passthrough(EventPayload::Text(String::from_utf8_lossy(body).into_owned()))
        }
    }
}

/// Interprets every frame, preserving order.
pub fn decode_list(frames: &[Frame]) -> Vec<PinEvent> {
    frames.iter().map(interpret).collect()
}

/// Splits a body on NUL into lossily-decoded UTF-8 tokens.
fn split_tokens(body: &[u8]) -> Vec<String> {
    body.split(|b| *b == TOKEN_SEPARATOR)
        .map(|token| String::from_utf8_lossy(token).into_owned())
        .collect()
}

/// Pairs up alternating key/value tokens; a trailing key without a value is dropped.
fn parse_key_values(body: &[u8]) -> BTreeMap<String, String> {
    split_tokens(body)
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hardware(body: &[u8]) -> Frame {
        Frame::data(MessageKind::Hardware, 1, body.to_vec())
    }

    #[test]
    fn test_three_tokens_become_kind_pin_payload() {
        let event = interpret(&hardware(b"vw\x0048\x0075.5"));
        assert_eq!(event.kind.as_deref(), Some("vw"));
        assert_eq!(event.pin.as_deref(), Some("48"));
        assert_eq!(event.payload, EventPayload::Text("75.5".to_string()));
        assert_eq!(event.message_kind, MessageKind::Hardware);
    }

    #[test]
    fn test_single_token_is_not_relevant() {
        let frame = Frame::data(MessageKind::GetSharedDash, 2, b"device-42".to_vec());
        let event = interpret(&frame);
        assert_eq!(event.kind.as_deref(), Some(NOT_RELEVANT));
        assert_eq!(event.pin.as_deref(), Some(NOT_RELEVANT));
        assert_eq!(event.payload.as_text(), Some("device-42"));
    }

    #[test]
    fn test_internal_pairs_keys_and_values() {
        let frame = Frame::data(
            MessageKind::Internal,
            3,
            b"ver\x000.6.0\x00h-beat\x0010".to_vec(),
        );
        let event = interpret(&frame);
        let map = event.payload.as_map().expect("internal payload is a map");
        assert_eq!(event.kind.as_deref(), Some(INTERNAL));
        assert_eq!(map.len(), 2);
        assert_eq!(map["ver"], "0.6.0");
        assert_eq!(map["h-beat"], "10");
    }

    #[test]
    fn test_internal_drops_dangling_key() {
        let frame = Frame::data(MessageKind::Internal, 3, b"ver\x000.6.0\x00dev".to_vec());
        let event = interpret(&frame);
        let map = event.payload.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key("dev"));
    }

    #[test]
    fn test_ping_passes_through_without_kind_or_pin() {
        let frame = Frame::data(MessageKind::Ping, 4, Vec::new());
        let event = interpret(&frame);
        assert_eq!(event.kind, None);
        assert_eq!(event.pin, None);
        assert_eq!(event.payload, EventPayload::Empty);
    }

    #[test]
    fn test_empty_hardware_body_passes_through() {
        let event = interpret(&hardware(b""));
        assert_eq!(event.kind, None);
        assert_eq!(event.payload, EventPayload::Empty);
    }

    #[test]
    fn test_two_tokens_pass_through_as_raw_text() {
        let event = interpret(&hardware(b"vw\x0048"));
        assert_eq!(event.kind, None);
        assert_eq!(event.pin, None);
        assert_eq!(event.payload, EventPayload::Text("vw\u{0}48".to_string()));
    }

    #[test]
    fn test_unknown_kind_is_still_interpreted() {
        let frame = Frame::data(MessageKind::Unknown(77), 5, b"vw\x001\x00x".to_vec());
        let event = interpret(&frame);
        assert_eq!(event.message_kind, MessageKind::Unknown(77));
        assert_eq!(event.pin.as_deref(), Some("1"));
    }

    #[test]
    fn test_decode_list_preserves_order() {
        let frames = vec![hardware(b"vw\x0048\x0075"), hardware(b"vw\x0049\x001")];
        let events = decode_list(&frames);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].pin.as_deref(), Some("48"));
        assert_eq!(events[1].pin.as_deref(), Some("49"));
    }
}
