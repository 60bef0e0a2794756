//! Telemetry: pin numbers, the pin-event to field mapping, and validation of
//! operator-settable values.

pub mod mapper;
pub mod pins;

pub use mapper::{
    lookup_field, Provenance, TelemetryField, TelemetryMapper, TelemetryValue, ID_FIELD,
    INTERNAL_FIELD,
};
pub use pins::{
    is_user_overrideable_field, is_user_overrideable_pin, validate_and_pad_1_and_2,
    validate_decimal,
};
