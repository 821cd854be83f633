// Measurement domain models
use crate::domain::detector::{ChannelAddress, DetectorId};
use serde::Serialize;
use thiserror::Error;

/// A device record field that could not be coerced to a number. The record
/// is dropped; the rest of its batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed measurement field `{field}`: {value:?}")]
pub struct InvalidMeasurement {
    pub field: &'static str,
    pub value: String,
}

/// Which physical quantity a measurement carries. Each kind has its own
/// append-only table and its own canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    Voltage,
    Current,
}

impl std::fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voltage => write!(f, "voltage"),
            Self::Current => write!(f, "current"),
        }
    }
}

/// One sampled reading in canonical units. The channel address is kept
/// denormalized alongside `det_id` so the sample stays auditable even if the
/// detector is later renamed.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub det_id: DetectorId,
    pub address: ChannelAddress,
    /// Canonical value: volts for voltage, milliamps for current.
    pub value: f64,
    /// Device-reported capture time, epoch seconds.
    pub time: f64,
}

impl Measurement {
    pub fn new(det_id: DetectorId, address: ChannelAddress, value: f64, time: f64) -> Self {
        Self {
            det_id,
            address,
            value,
            time,
        }
    }
}

/// Query result: two parallel sequences ordered by ascending time, where
/// `time[i]` pairs with `value[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub value: Vec<f64>,
}

impl TimeSeries {
    pub fn push(&mut self, time: f64, value: f64) {
        self.time.push(time);
        self.value.push(value);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}
