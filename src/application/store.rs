// Storage trait for detector records and measurement time series
use crate::domain::detector::{Detector, DetectorId};
use crate::domain::measurement::{Measurement, MeasurementKind, TimeSeries};
use async_trait::async_trait;
use thiserror::Error;

/// Persistence failure surfaced by a [`TelemetryStore`] implementation.
#[derive(Debug, Error)]
#[error("store operation failed: {0}")]
pub struct StoreError(pub anyhow::Error);

impl StoreError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

/// What a detector registration pass changed, for startup logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub inserted: usize,
    pub renamed: usize,
}

/// Append-only persistence of measurements plus the detector table.
///
/// The collector and registry are the only writers; the query service is
/// read-only. Implementations must let readers proceed while a batch write
/// commits.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn get_detector(&self, id: DetectorId) -> Result<Option<Detector>, StoreError>;

    async fn list_detectors(&self) -> Result<Vec<Detector>, StoreError>;

    /// Name lookup is not unique; returns every match, possibly none.
    async fn find_detectors_by_name(&self, name: &str) -> Result<Vec<Detector>, StoreError>;

    /// Upsert a configured detector set in one all-or-nothing transaction:
    /// insert absent ids, update the name of present ids when it changed,
    /// never delete. Idempotent.
    async fn register_detectors(
        &self,
        detectors: &[Detector],
    ) -> Result<RegistrationSummary, StoreError>;

    /// Persist one cycle's batch for a measurement kind as a single
    /// transaction; either every row lands or none do.
    async fn insert_measurements(
        &self,
        kind: MeasurementKind,
        batch: &[Measurement],
    ) -> Result<(), StoreError>;

    /// Range scan ordered by ascending time. Both bounds are exclusive;
    /// `None` leaves that side unbounded. No matching rows yields an empty
    /// series, not an error.
    async fn query_series(
        &self,
        kind: MeasurementKind,
        det_id: DetectorId,
        after: Option<f64>,
        before: Option<f64>,
    ) -> Result<TimeSeries, StoreError>;
}
