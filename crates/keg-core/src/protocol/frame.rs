//! Frame types for the keg device protocol.
//!
//! A frame is one discrete message on the wire.  Every frame starts with a
//! one-byte kind and a two-byte correlation id; what follows depends on the
//! kind:
//!
//! ```text
//! response: [kind=0:1][correlation:2][status:2]
//! data:     [kind:1][correlation:2][length:2][body:length]
//! ```
//!
//! All multi-byte integers are big-endian.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of every frame header (kind + correlation + status/length).
pub const HEADER_SIZE: usize = 5;

/// Largest body a data frame can carry (the length field is 16 bits).
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Separator between body tokens.
pub const TOKEN_SEPARATOR: u8 = 0x00;

// ── Message kinds ─────────────────────────────────────────────────────────────

/// The kind byte at the start of every frame.
///
/// Device firmware drifts, so kind bytes the gateway does not know are kept
/// as [`MessageKind::Unknown`] instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Response,
    Ping,
    Notify,
    Internal,
    Property,
    Hardware,
    GetSharedDash,
    Unknown(u8),
}

impl MessageKind {
    /// Returns the wire byte for this kind.
    pub fn code(self) -> u8 {
        match self {
            MessageKind::Response => 0,
            MessageKind::Ping => 6,
            MessageKind::Notify => 14,
            MessageKind::Internal => 17,
            MessageKind::Property => 19,
            MessageKind::Hardware => 20,
            MessageKind::GetSharedDash => 29,
            MessageKind::Unknown(code) => code,
        }
    }

    /// Lower-case name used as the first key of the telemetry table and in
    /// synthesised field names.
    pub fn name(self) -> String {
        match self {
            MessageKind::Response => "response".to_string(),
            MessageKind::Ping => "ping".to_string(),
            MessageKind::Notify => "notify".to_string(),
            MessageKind::Internal => "internal".to_string(),
            MessageKind::Property => "property".to_string(),
            MessageKind::Hardware => "hardware".to_string(),
            MessageKind::GetSharedDash => "get_shared_dash".to_string(),
            MessageKind::Unknown(code) => format!("unknown_{code}"),
        }
    }

    /// True for kinds whose frames carry a body.
    pub fn is_data(self) -> bool {
        self != MessageKind::Response
    }
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        match value {
            0 => MessageKind::Response,
            6 => MessageKind::Ping,
            14 => MessageKind::Notify,
            17 => MessageKind::Internal,
            19 => MessageKind::Property,
            20 => MessageKind::Hardware,
            29 => MessageKind::GetSharedDash,
            other => MessageKind::Unknown(other),
        }
    }
}

// ── Response statuses ─────────────────────────────────────────────────────────

/// Status carried by a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    IllegalCommand,
    NotAuthenticated,
    Timeout,
    Unknown(u16),
}

impl ResponseStatus {
    /// Wire code, as carried in the 2-byte status field.
    ///
    /// For beginners: `Unknown` keeps the raw code, so a status this crate
    /// has no name for still encodes back to the same bytes.
    pub fn code(self) -> u16 {
        match self {
            ResponseStatus::Success => 200,
            ResponseStatus::IllegalCommand => 2,
            ResponseStatus::NotAuthenticated => 5,
            ResponseStatus::Timeout => 16,
            ResponseStatus::Unknown(code) => code,
        }
    }
}

impl From<u16> for ResponseStatus {
    fn from(value: u16) -> Self {
        match value {
            200 => ResponseStatus::Success,
            2 => ResponseStatus::IllegalCommand,
            5 => ResponseStatus::NotAuthenticated,
            16 => ResponseStatus::Timeout,
            other => ResponseStatus::Unknown(other),
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// What follows the kind and correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameContent {
    /// Response frames: a status and never a body.
    Status(ResponseStatus),
    /// Data frames: the body bytes.  The wire length is `body.len()`.
    Body(Vec<u8>),
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: MessageKind,
    pub correlation_id: u16,
    pub content: FrameContent,
}

impl Frame {
    /// Builds a response frame.
    pub fn response(correlation_id: u16, status: ResponseStatus) -> Self {
        Self {
            kind: MessageKind::Response,
            correlation_id,
            content: FrameContent::Status(status),
        }
    }

    /// Builds a data frame of the given kind.
    pub fn data(kind: MessageKind, correlation_id: u16, body: Vec<u8>) -> Self {
        Self {
            kind,
            correlation_id,
            content: FrameContent::Body(body),
        }
    }

    /// Response status, or `None` for data frames.
    pub fn status(&self) -> Option<ResponseStatus> {
        match &self.content {
            FrameContent::Status(status) => Some(*status),
            FrameContent::Body(_) => None,
        }
    }

    /// Body bytes; empty for response frames.
    pub fn body(&self) -> &[u8] {
        match &self.content {
            FrameContent::Status(_) => &[],
            FrameContent::Body(body) => body,
        }
    }

    /// Declared body length (0 for response frames).
    pub fn length(&self) -> usize {
        self.body().len()
    }
}
