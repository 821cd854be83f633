// Query service - Time-range reads over the store
use crate::application::store::{StoreError, TelemetryStore};
use crate::domain::detector::{Detector, DetectorId};
use crate::domain::measurement::{MeasurementKind, TimeSeries};
use std::sync::Arc;

/// Optional bounds of a time-range query, all in epoch seconds. `start` and
/// `last` are exclusive lower bounds, `stop` an exclusive upper bound; every
/// provided filter narrows the result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeRange {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub last: Option<f64>,
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1e3
}

/// Stateless read side. Independent of the collector; the store is the only
/// shared state between the two.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn TelemetryStore>,
    now: fn() -> f64,
}

impl QueryService {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            store,
            now: unix_now,
        }
    }

    /// Same service with an injected clock, for deterministic `last` bounds.
    pub fn with_clock(store: Arc<dyn TelemetryStore>, now: fn() -> f64) -> Self {
        Self { store, now }
    }

    /// Resolve the range into store bounds and scan. An unknown detector id
    /// simply matches no rows and yields an empty series.
    pub async fn series(
        &self,
        kind: MeasurementKind,
        det_id: DetectorId,
        range: TimeRange,
    ) -> Result<TimeSeries, StoreError> {
        let mut after = range.start;
        if let Some(last) = range.last {
            let cutoff = (self.now)() - last;
            after = Some(after.map_or(cutoff, |start| start.max(cutoff)));
        }
        self.store.query_series(kind, det_id, after, range.stop).await
    }

    pub async fn detector(&self, id: DetectorId) -> Result<Option<Detector>, StoreError> {
        self.store.get_detector(id).await
    }

    pub async fn detectors(&self) -> Result<Vec<Detector>, StoreError> {
        self.store.list_detectors().await
    }

    pub async fn detectors_by_name(&self, name: &str) -> Result<Vec<Detector>, StoreError> {
        self.store.find_detectors_by_name(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detector::ChannelAddress;
    use crate::domain::measurement::Measurement;
    use crate::infrastructure::sqlite_store::SqliteStore;

    async fn seeded_store(times: &[f64]) -> (Arc<SqliteStore>, DetectorId) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let address = ChannelAddress::new(0, 0, 1);
        let det_id = DetectorId::encode(address).unwrap();
        let batch: Vec<Measurement> = times
            .iter()
            .map(|&t| Measurement::new(det_id, address, t / 10.0, t))
            .collect();
        store
            .insert_measurements(MeasurementKind::Voltage, &batch)
            .await
            .unwrap();
        (store, det_id)
    }

    #[tokio::test]
    async fn start_and_stop_bounds_are_exclusive() {
        let (store, det_id) = seeded_store(&[50.0, 150.0, 250.0]).await;
        let service = QueryService::new(store);

        let range = TimeRange {
            start: Some(100.0),
            stop: Some(200.0),
            last: None,
        };
        let series = service
            .series(MeasurementKind::Voltage, det_id, range)
            .await
            .unwrap();
        assert_eq!(series.time, vec![150.0]);
    }

    #[tokio::test]
    async fn last_seconds_bound_uses_the_clock() {
        let (store, det_id) = seeded_store(&[930.0, 950.0, 990.0]).await;
        let service = QueryService::with_clock(store, || 1000.0);

        let range = TimeRange {
            last: Some(60.0),
            ..TimeRange::default()
        };
        let series = service
            .series(MeasurementKind::Voltage, det_id, range)
            .await
            .unwrap();
        assert_eq!(series.time, vec![950.0, 990.0]);
    }

    #[tokio::test]
    async fn last_combined_with_start_takes_the_narrower_bound() {
        let (store, det_id) = seeded_store(&[930.0, 950.0, 990.0]).await;
        let service = QueryService::with_clock(store, || 1000.0);

        let range = TimeRange {
            start: Some(960.0),
            stop: None,
            last: Some(60.0),
        };
        let series = service
            .series(MeasurementKind::Voltage, det_id, range)
            .await
            .unwrap();
        assert_eq!(series.time, vec![990.0]);
    }

    #[tokio::test]
    async fn empty_range_returns_empty_series_not_an_error() {
        let (store, det_id) = seeded_store(&[50.0]).await;
        let service = QueryService::new(store);

        let range = TimeRange {
            start: Some(100.0),
            stop: Some(200.0),
            last: None,
        };
        let series = service
            .series(MeasurementKind::Voltage, det_id, range)
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn unknown_detector_yields_empty_series() {
        let (store, _) = seeded_store(&[50.0]).await;
        let service = QueryService::new(store);

        let other = DetectorId::encode(ChannelAddress::new(9, 9, 9)).unwrap();
        let series = service
            .series(MeasurementKind::Voltage, other, TimeRange::default())
            .await
            .unwrap();
        assert!(series.is_empty());
    }
}
