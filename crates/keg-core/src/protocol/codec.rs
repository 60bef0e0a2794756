//! Binary codec for keg device protocol frames.
//!
//! Wire format:
//! ```text
//! data frame:     [kind:1][correlation:2][length:2][body:length]
//! response frame: [kind=0:1][correlation:2][status:2]
//! ```
//! All multi-byte integers are big-endian.
//!
//! Responses the gateway *sends* may optionally carry a length and body
//! (see [`encode_response`]); responses it *receives* are always the 5-byte
//! form and are decoded as such.

use thiserror::Error;

use crate::protocol::frame::{
    Frame, FrameContent, MessageKind, ResponseStatus, HEADER_SIZE,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// Not enough bytes for a whole frame yet.  Callers reading from a stream
    /// should keep the bytes and wait for more; this is not a fault.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The body does not fit in the 16-bit length field.
    #[error("body of {0} bytes exceeds the 65535-byte frame limit")]
    BodyTooLong(usize),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a data frame: `[kind][correlation][length][body]`.
///
/// # Errors
///
/// Returns [`ProtocolError::BodyTooLong`] if `body` is longer than 65535 bytes.
///
/// # Examples
///
/// ```rust
/// use keg_core::protocol::{decode, encode_command, MessageKind};
///
/// let bytes = encode_command(MessageKind::Hardware, 1, b"vw\x0048\x0075.5").unwrap();
/// let frames = decode(&bytes);
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].body(), b"vw\x0048\x0075.5");
/// ```
pub fn encode_command(
    kind: MessageKind,
    correlation_id: u16,
    body: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let length = body_length(body)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.push(kind.code());
    buf.extend_from_slice(&correlation_id.to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Encodes a response carrying a status *and* a length-prefixed body:
/// `[0][correlation][status][length][body]`.
///
/// # Errors
///
/// Returns [`ProtocolError::BodyTooLong`] if `body` is longer than 65535 bytes.
pub fn encode_response(
    correlation_id: u16,
    status: ResponseStatus,
    body: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let length = body_length(body)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + 2 + body.len());
    buf.push(MessageKind::Response.code());
    buf.extend_from_slice(&correlation_id.to_be_bytes());
    buf.extend_from_slice(&status.code().to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Encodes the minimal 5-byte success response `[0][correlation][200]`.
pub fn encode_ok_response(correlation_id: u16) -> Vec<u8> {
    status_frame(correlation_id, ResponseStatus::Success)
}

/// Encodes an already-built [`Frame`] exactly as [`decode_frame`] reads it.
///
/// # Errors
///
/// Returns [`ProtocolError::BodyTooLong`] if a data body is longer than 65535
/// bytes.  Status frames always encode.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    match &frame.content {
        FrameContent::Status(status) => Ok(status_frame(frame.correlation_id, *status)),
        FrameContent::Body(body) => encode_command(frame.kind, frame.correlation_id, body),
    }
}

fn status_frame(correlation_id: u16, status: ResponseStatus) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.push(MessageKind::Response.code());
    buf.extend_from_slice(&correlation_id.to_be_bytes());
    buf.extend_from_slice(&status.code().to_be_bytes());
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed so a stream reader can
/// advance its buffer.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when `bytes` holds less than
/// one complete frame.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let kind = MessageKind::from(bytes[0]);
    let correlation_id = u16::from_be_bytes([bytes[1], bytes[2]]);
    let field = u16::from_be_bytes([bytes[3], bytes[4]]);

    if kind == MessageKind::Response {
        return Ok((
            Frame::response(correlation_id, ResponseStatus::from(field)),
            HEADER_SIZE,
        ));
    }

    let total = HEADER_SIZE + field as usize;
    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let body = bytes[HEADER_SIZE..total].to_vec();
    Ok((Frame::data(kind, correlation_id, body), total))
}

/// Decodes every complete frame in `buffer`, in order.
///
/// Stops at the first incomplete frame; those trailing bytes are dropped.
/// Stream readers that must keep partial frames use [`decode_frame`].
pub fn decode(buffer: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while let Ok((frame, consumed)) = decode_frame(&buffer[offset..]) {
        frames.push(frame);
        offset += consumed;
    }
    if offset < buffer.len() {
        tracing::trace!(
            dropped = buffer.len() - offset,
            "trailing bytes do not form a complete frame"
        );
    }
    frames
}

fn body_length(body: &[u8]) -> Result<u16, ProtocolError> {
    u16::try_from(body.len()).map_err(|_| ProtocolError::BodyTooLong(body.len()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
