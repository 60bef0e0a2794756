//! Virtual pin numbers used by keg devices, and validation of the values the
//! operator may write to them.
//!
//! A virtual pin is a numbered logical channel on the device.  Most pins are
//! pure telemetry (weight left, temperature); a few are settings the operator
//! can change from the host application.  Those are the *user-overrideable*
//! pins: when the operator has just set one, inbound telemetry for the same
//! pin should not silently undo the change before the device confirms it.

pub const LAST_POUR: &str = "47";
pub const PERCENT_BEER_LEFT: &str = "48";
pub const IS_POURING: &str = "49";
pub const AMOUNT_LEFT: &str = "51";
pub const KEG_TEMPERATURE: &str = "56";
pub const EMPTY_KEG_WEIGHT: &str = "62";
pub const UNIT: &str = "71";
pub const TEMPERATURE_UNIT: &str = "73";
pub const BEER_LEFT_UNIT: &str = "74";
pub const MEASURE_UNIT: &str = "75";
pub const MAX_KEG_VOLUME: &str = "76";
pub const LEAK_DETECTION: &str = "83";
pub const KEG_MODE: &str = "88";
pub const SENSITIVITY: &str = "89";
pub const FIRMWARE_VERSION: &str = "93";
pub const WIFI_SIGNAL_STRENGTH: &str = "99";

/// Settings pins the operator may command, with the telemetry field each
/// one reports back as.
pub const USER_OVERRIDEABLE: &[(&str, &str)] = &[
    (UNIT, "unit"),
    (MEASURE_UNIT, "measure_unit"),
    (KEG_MODE, "keg_mode_co2_beer"),
];

/// True if `pin` is an operator-settable pin.
pub fn is_user_overrideable_pin(pin: &str) -> bool {
    USER_OVERRIDEABLE.iter().any(|(p, _)| *p == pin)
}

/// True if `field` is the telemetry field of an operator-settable pin.
pub fn is_user_overrideable_field(field: &str) -> bool {
    USER_OVERRIDEABLE.iter().any(|(_, f)| *f == field)
}

/// Validates a two-choice setting (unit system, measurement mode, keg mode).
///
/// Accepts exactly `"1"`, `"2"`, `"01"` and `"02"` and returns the
/// zero-padded form.  Anything else, including an empty or absent value,
/// is rejected with `None`; callers must treat that as a validation failure
/// and not substitute a default.
///
/// ```rust
/// use keg_core::telemetry::validate_and_pad_1_and_2;
///
/// assert_eq!(validate_and_pad_1_and_2(Some("1")).as_deref(), Some("01"));
/// assert_eq!(validate_and_pad_1_and_2(Some("3")), None);
/// ```
pub fn validate_and_pad_1_and_2(value: Option<&str>) -> Option<String> {
    match value? {
        "1" | "01" => Some("01".to_string()),
        "2" | "02" => Some("02".to_string()),
        _ => None,
    }
}

/// Validates a weight or volume: a finite, non-negative decimal number.
///
/// Returns the trimmed input unchanged so the device receives exactly what
/// the operator typed.
pub fn validate_decimal(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Some(trimmed.to_string()),
        _ => None,
    }
}
