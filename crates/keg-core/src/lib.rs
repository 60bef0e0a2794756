//! # keg-core
//!
//! Shared library for the keg device gateway containing the wire codec, the
//! frame interpreter, the telemetry mapping tables and the command tables.
//!
//! It has no dependency on sockets or an async runtime; the `keg-gateway`
//! crate drives it from its TCP listener.
//!
//! # Pipeline
//!
//! ```text
//! bytes ──decode──► Frame ──interpret──► PinEvent ──map──► TelemetryField
//!
//! Command ──encode──► bytes
//! ```
//!
//! - **`protocol`** – frames, the binary codec, the correlation counter and
//!   the interpreter that splits frame bodies into pin events.
//! - **`telemetry`** – the `(frame kind, event kind, pin) → field` table and
//!   validation for operator-settable values.
//! - **`command`** – canonical command names and their target pins.

pub mod command;
pub mod protocol;
pub mod telemetry;

pub use command::Command;
pub use protocol::codec::{decode, decode_frame, encode_command, ProtocolError};
pub use protocol::frame::{Frame, MessageKind, ResponseStatus};
pub use protocol::interpreter::PinEvent;
pub use telemetry::mapper::{TelemetryField, TelemetryMapper, TelemetryValue};
