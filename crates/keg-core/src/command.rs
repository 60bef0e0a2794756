//! Outbound commands: canonical names, the command-to-pin table, and frame
//! construction.
//!
//! A command writes a value to one of the device's settings pins.  On the wire
//! it is a HARDWARE frame whose body is `"vw\0<pin>\0<value>"`.

use crate::protocol::codec::{encode_command, ProtocolError};
use crate::protocol::frame::{MessageKind, TOKEN_SEPARATOR};
use crate::telemetry::mapper::VIRTUAL_WRITE;
use crate::telemetry::pins;

/// `canonical command name -> target pin`.
pub const COMMAND_TABLE: &[(&str, &str)] = &[
    ("set-mode", pins::KEG_MODE),
    ("set-unit", pins::UNIT),
    ("set-measure-unit", pins::MEASURE_UNIT),
    ("set-empty-keg-weight", pins::EMPTY_KEG_WEIGHT),
    ("set-max-keg-volume", pins::MAX_KEG_VOLUME),
];

/// Lower-cases a command name and replaces `_` with `-`.
///
/// ```rust
/// assert_eq!(keg_core::command::canonicalize("SET_MODE"), "set-mode");
/// ```
pub fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

/// Target pin for a command name (canonicalised first).
pub fn pin_for_command(name: &str) -> Option<&'static str> {
    let canonical = canonicalize(name);
    COMMAND_TABLE
        .iter()
        .find(|(command, _)| *command == canonical)
        .map(|(_, pin)| *pin)
}

/// Canonical command name that targets `pin`.
pub fn command_for_pin(pin: &str) -> Option<&'static str> {
    COMMAND_TABLE
        .iter()
        .find(|(_, p)| *p == pin)
        .map(|(command, _)| *command)
}

/// A command ready to be written to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub device_id: String,
    pub name: String,
    pub pin: String,
    pub value: String,
    pub correlation_id: u16,
}

impl Command {
    /// Resolves `name` against the command table.  Returns `None` for
    /// unrecognised commands.
    pub fn new(device_id: &str, name: &str, value: &str, correlation_id: u16) -> Option<Self> {
        let pin = pin_for_command(name)?;
        Some(Self {
            device_id: device_id.to_string(),
            name: canonicalize(name),
            pin: pin.to_string(),
            value: value.to_string(),
            correlation_id,
        })
    }

    /// The HARDWARE body `"vw\0<pin>\0<value>"`.
    pub fn body(&self) -> Vec<u8> {
        let mut body =
            Vec::with_capacity(VIRTUAL_WRITE.len() + self.pin.len() + self.value.len() + 2);
        body.extend_from_slice(VIRTUAL_WRITE.as_bytes());
        body.push(TOKEN_SEPARATOR);
        body.extend_from_slice(self.pin.as_bytes());
        body.push(TOKEN_SEPARATOR);
        body.extend_from_slice(self.value.as_bytes());
        body
    }

    /// Encodes the command as a complete HARDWARE frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BodyTooLong`] for values that do not fit in a frame.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_command(MessageKind::Hardware, self.correlation_id, &self.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::decode;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("SET_MODE"), "set-mode");
        assert_eq!(canonicalize("set-max_keg_VOLUME"), "set-max-keg-volume");
        assert_eq!(canonicalize(" set_unit "), "set-unit");
    }

    #[test]
    fn test_pin_lookup_both_directions() {
        for (command, pin) in COMMAND_TABLE {
            assert_eq!(pin_for_command(command), Some(*pin));
            assert_eq!(command_for_pin(pin), Some(*command));
        }
        assert_eq!(pin_for_command("SET_MEASURE_UNIT"), Some(pins::MEASURE_UNIT));
        assert_eq!(pin_for_command("explode"), None);
        assert_eq!(command_for_pin(pins::PERCENT_BEER_LEFT), None);
    }

    #[test]
    fn test_command_new_rejects_unknown_name() {
        assert_eq!(Command::new("dev-1", "reboot", "1", 1), None);
    }

    #[test]
    fn test_command_encodes_hardware_frame() {
        let command = Command::new("dev-1", "SET_MODE", "1", 7).unwrap();
        let frames = decode(&command.encode().unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, MessageKind::Hardware);
        assert_eq!(frames[0].correlation_id, 7);
        assert_eq!(frames[0].body(), b"vw\x0088\x001");
    }
}
