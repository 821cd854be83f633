// Unit normalization into canonical SI magnitudes
//
// The controller reports each channel's value together with a unit string.
// Persisted voltage is always volts and persisted current always milliamps,
// whatever the device chose to report in. An unrecognized unit string passes
// the value through unscaled; callers log it (see the collector) so a silent
// scale drift is at least visible.

use crate::domain::measurement::MeasurementKind;

/// Scale a device-reported voltage into volts.
pub fn normalize_voltage(value: f64, unit: &str) -> f64 {
    match unit {
        "kV" => value * 1e3,
        _ => value,
    }
}

/// Scale a device-reported current into milliamps.
pub fn normalize_current(value: f64, unit: &str) -> f64 {
    match unit {
        "kA" => value * 1e6,
        "A" => value * 1e3,
        "mA" => value,
        "µA" => value * 1e-3,
        "nA" => value * 1e-6,
        _ => value,
    }
}

/// Whether a unit string is one the normalizer actually scales for.
pub fn is_known_unit(kind: MeasurementKind, unit: &str) -> bool {
    match kind {
        MeasurementKind::Voltage => matches!(unit, "V" | "kV"),
        MeasurementKind::Current => matches!(unit, "kA" | "A" | "mA" | "µA" | "nA"),
    }
}
