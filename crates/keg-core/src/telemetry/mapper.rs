//! Maps pin events to named telemetry fields.
//!
//! The mapping is a static table keyed by `(frame kind, event kind, pin)`.
//! Two frame kinds bypass the table:
//!
//! - `GET_SHARED_DASH` carries the device's own identifier and maps to `"id"`.
//! - `INTERNAL` carries a key/value map and maps to `"internal"`.
//!
//! Events the table does not know are dropped by default.  In
//! include-unknown mode they are kept under a synthesised name
//! `_<frame kind>_<event kind>_<pin>` so undocumented attributes are not lost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::frame::MessageKind;
use crate::protocol::interpreter::{EventPayload, PinEvent};
use crate::telemetry::pins;

/// Field produced by identification frames.
pub const ID_FIELD: &str = "id";

/// Field produced by INTERNAL frames.
pub const INTERNAL_FIELD: &str = "internal";

/// Event kind token devices use for virtual pin writes.
pub const VIRTUAL_WRITE: &str = "vw";

/// `(frame kind, event kind, pin) -> field`.
pub const TELEMETRY_TABLE: &[(&str, &str, &str, &str)] = &[
    ("hardware", VIRTUAL_WRITE, pins::LAST_POUR, "last_pour"),
    ("hardware", VIRTUAL_WRITE, pins::PERCENT_BEER_LEFT, "percent_of_beer_left"),
    ("hardware", VIRTUAL_WRITE, pins::IS_POURING, "is_pouring"),
    ("hardware", VIRTUAL_WRITE, pins::AMOUNT_LEFT, "amount_left"),
    ("hardware", VIRTUAL_WRITE, pins::KEG_TEMPERATURE, "keg_temperature"),
    ("hardware", VIRTUAL_WRITE, pins::EMPTY_KEG_WEIGHT, "empty_keg_weight"),
    ("hardware", VIRTUAL_WRITE, pins::UNIT, "unit"),
    ("hardware", VIRTUAL_WRITE, pins::TEMPERATURE_UNIT, "temperature_unit"),
    ("hardware", VIRTUAL_WRITE, pins::BEER_LEFT_UNIT, "beer_left_unit"),
    ("hardware", VIRTUAL_WRITE, pins::MEASURE_UNIT, "measure_unit"),
    ("hardware", VIRTUAL_WRITE, pins::MAX_KEG_VOLUME, "max_keg_volume"),
    ("hardware", VIRTUAL_WRITE, pins::LEAK_DETECTION, "leak_detection"),
    ("hardware", VIRTUAL_WRITE, pins::KEG_MODE, "keg_mode_co2_beer"),
    ("hardware", VIRTUAL_WRITE, pins::SENSITIVITY, "sensitivity"),
    ("hardware", VIRTUAL_WRITE, pins::FIRMWARE_VERSION, "firmware_version"),
    ("hardware", VIRTUAL_WRITE, pins::WIFI_SIGNAL_STRENGTH, "wifi_signal_strength"),
    ("property", pins::AMOUNT_LEFT, "max", "max_keg_volume"),
];

/// Looks up the table entry for `(frame kind, event kind, pin)`.
pub fn lookup_field(frame_kind: &str, event_kind: &str, pin: &str) -> Option<&'static str> {
    TELEMETRY_TABLE
        .iter()
        .find(|(fk, ek, p, _)| *fk == frame_kind && *ek == event_kind && *p == pin)
        .map(|(_, _, _, field)| *field)
}

/// Where a field name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Found in the static table (or one of the fixed id/internal mappings).
    Mapped,
    /// Synthesised in include-unknown mode.
    UnknownFallback,
}

/// A telemetry value as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryValue {
    Text(String),
    Map(BTreeMap<String, String>),
}

impl TelemetryValue {
    /// The scalar value, or `None` for an `INTERNAL` map.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TelemetryValue::Text(text) => Some(text),
            TelemetryValue::Map(_) => None,
        }
    }
}

/// One named value derived from a pin event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryField {
    pub name: String,
    pub value: TelemetryValue,
    pub provenance: Provenance,
    /// Pin the value arrived on, when there was one.
    pub pin: Option<String>,
}

impl TelemetryField {
    /// True if the field reports an operator-settable pin.
    pub fn is_user_overrideable(&self) -> bool {
        self.provenance == Provenance::Mapped && pins::is_user_overrideable_field(&self.name)
    }
}

/// Maps pin events to telemetry fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryMapper {
    include_unknown: bool,
}

impl TelemetryMapper {
    /// A mapper that drops events missing from the table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapper that keeps unknown events under a synthesised name.
    pub fn including_unknown() -> Self {
        Self {
            include_unknown: true,
        }
    }

    /// Maps a single event, or returns `None` if it carries no telemetry.
    pub fn map(&self, event: &PinEvent) -> Option<TelemetryField> {
        match event.message_kind {
            MessageKind::GetSharedDash => {
                let id = event.payload.as_text()?;
                return Some(TelemetryField {
                    name: ID_FIELD.to_string(),
                    value: TelemetryValue::Text(id.to_string()),
                    provenance: Provenance::Mapped,
                    pin: None,
                });
            }
            MessageKind::Internal => {
                let map = event.payload.as_map()?;
                return Some(TelemetryField {
                    name: INTERNAL_FIELD.to_string(),
                    value: TelemetryValue::Map(map.clone()),
                    provenance: Provenance::Mapped,
                    pin: None,
                });
            }
            MessageKind::Response | MessageKind::Ping | MessageKind::Notify => return None,
            MessageKind::Property | MessageKind::Hardware | MessageKind::Unknown(_) => {}
        }

        let event_kind = event.kind.as_deref()?;
        let pin = event.pin.as_deref()?;
        let value = match &event.payload {
            EventPayload::Text(text) => TelemetryValue::Text(text.clone()),
            EventPayload::Map(map) => TelemetryValue::Map(map.clone()),
            EventPayload::Empty => return None,
        };
        let frame_kind = event.message_kind.name();

        if let Some(field) = lookup_field(&frame_kind, event_kind, pin) {
            return Some(TelemetryField {
                name: field.to_string(),
                value,
                provenance: Provenance::Mapped,
                pin: Some(pin.to_string()),
            });
        }

        if self.include_unknown {
            return Some(TelemetryField {
                name: format!("_{frame_kind}_{event_kind}_{pin}"),
                value,
                provenance: Provenance::UnknownFallback,
                pin: Some(pin.to_string()),
            });
        }

        tracing::trace!(%frame_kind, %event_kind, %pin, "no telemetry mapping; dropping event");
        None
    }

    /// Maps every event, discarding those without telemetry, preserving order.
    pub fn decode_list(&self, events: &[PinEvent]) -> Vec<TelemetryField> {
        events.iter().filter_map(|event| self.map(event)).collect()
    }
}
