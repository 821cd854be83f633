// Collection loop - Periodic collect, normalize, persist
use crate::application::device::{DeviceGateway, RawReading, SessionKey};
use crate::application::store::TelemetryStore;
use crate::domain::detector::{ChannelAddress, DetectorId};
use crate::domain::measurement::{Measurement, MeasurementKind};
use crate::domain::units;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The scheduling core. One cycle authenticates, fetches both measurement
/// snapshots, normalizes each reading, and persists per-kind batches; the
/// loop then sleeps for the full configured interval (fixed delay, not fixed
/// rate) before the next cycle. Transient device failures skip the cycle and
/// never terminate the loop.
pub struct Collector {
    device: Arc<dyn DeviceGateway>,
    store: Arc<dyn TelemetryStore>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Collector {
    pub fn new(
        device: Arc<dyn DeviceGateway>,
        store: Arc<dyn TelemetryStore>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            device,
            store,
            interval,
            shutdown,
        }
    }

    /// Run cycles until the shutdown signal fires.
    pub async fn run(mut self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "collector started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("collector stopped");
    }

    /// One collect-normalize-persist pass. Never returns an error: every
    /// failure path degrades to a log line so the loop survives.
    async fn cycle(&self) {
        let key = match self.device.authenticate().await {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(error = %err, "authentication failed, skipping cycle");
                return;
            }
        };

        // Each kind is fetched and persisted independently so a voltage
        // failure cannot block a successful current snapshot.
        self.collect_kind(MeasurementKind::Voltage, &key).await;
        self.collect_kind(MeasurementKind::Current, &key).await;
    }

    async fn collect_kind(&self, kind: MeasurementKind, key: &SessionKey) {
        let readings = match kind {
            MeasurementKind::Voltage => self.device.fetch_voltage(key).await,
            MeasurementKind::Current => self.device.fetch_current(key).await,
        };
        let readings = match readings {
            Ok(readings) => readings,
            Err(err) => {
                tracing::warn!(%kind, error = %err, "snapshot fetch failed, skipping");
                return;
            }
        };

        let batch = build_batch(kind, &readings);
        if batch.is_empty() {
            tracing::debug!(%kind, "snapshot produced no valid readings");
            return;
        }

        match self.store.insert_measurements(kind, &batch).await {
            Ok(()) => tracing::info!(%kind, rows = batch.len(), "batch persisted"),
            Err(err) => tracing::error!(%kind, error = %err, "batch write failed, dropped"),
        }
    }
}

/// Map raw readings to canonical measurements. A reading with an invalid
/// channel triple is dropped with a warning; the rest of the batch continues.
fn build_batch(kind: MeasurementKind, readings: &[RawReading]) -> Vec<Measurement> {
    let mut batch = Vec::with_capacity(readings.len());
    for reading in readings {
        let address = ChannelAddress::new(reading.line, reading.address, reading.channel);
        let det_id = match DetectorId::encode(address) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(%kind, error = %err, "dropping reading");
                continue;
            }
        };

        if !units::is_known_unit(kind, &reading.unit) {
            // Lenient pass-through inherited from the device protocol; the
            // value lands unscaled.
            tracing::warn!(%kind, unit = %reading.unit, %det_id, "unknown unit, value unscaled");
        }
        let value = match kind {
            MeasurementKind::Voltage => units::normalize_voltage(reading.value, &reading.unit),
            MeasurementKind::Current => units::normalize_current(reading.value, &reading.unit),
        };

        batch.push(Measurement::new(det_id, address, value, reading.time));
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device::DeviceError;
    use crate::application::store::{RegistrationSummary, StoreError};
    use crate::domain::detector::Detector;
    use crate::domain::measurement::TimeSeries;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn reading(line: u32, address: u32, channel: u32, value: f64, unit: &str) -> RawReading {
        RawReading {
            line,
            address,
            channel,
            value,
            unit: unit.to_string(),
            time: 1_700_000_000.0,
        }
    }

    struct ScriptedDevice {
        auth: Mutex<VecDeque<Result<SessionKey, DeviceError>>>,
        voltage: Mutex<VecDeque<Result<Vec<RawReading>, DeviceError>>>,
        current: Mutex<VecDeque<Result<Vec<RawReading>, DeviceError>>>,
    }

    impl ScriptedDevice {
        fn new() -> Self {
            Self {
                auth: Mutex::new(VecDeque::new()),
                voltage: Mutex::new(VecDeque::new()),
                current: Mutex::new(VecDeque::new()),
            }
        }
    }

    #[async_trait]
    impl DeviceGateway for ScriptedDevice {
        async fn authenticate(&self) -> Result<SessionKey, DeviceError> {
            self.auth
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SessionKey("key".into())))
        }

        async fn fetch_voltage(&self, _key: &SessionKey) -> Result<Vec<RawReading>, DeviceError> {
            self.voltage
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn fetch_current(&self, _key: &SessionKey) -> Result<Vec<RawReading>, DeviceError> {
            self.current
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<(MeasurementKind, Vec<Measurement>)>>,
    }

    #[async_trait]
    impl TelemetryStore for RecordingStore {
        async fn get_detector(&self, _id: DetectorId) -> Result<Option<Detector>, StoreError> {
            Ok(None)
        }

        async fn list_detectors(&self) -> Result<Vec<Detector>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_detectors_by_name(&self, _name: &str) -> Result<Vec<Detector>, StoreError> {
            Ok(Vec::new())
        }

        async fn register_detectors(
            &self,
            _detectors: &[Detector],
        ) -> Result<RegistrationSummary, StoreError> {
            Ok(RegistrationSummary::default())
        }

        async fn insert_measurements(
            &self,
            kind: MeasurementKind,
            batch: &[Measurement],
        ) -> Result<(), StoreError> {
            self.batches.lock().unwrap().push((kind, batch.to_vec()));
            Ok(())
        }

        async fn query_series(
            &self,
            _kind: MeasurementKind,
            _det_id: DetectorId,
            _after: Option<f64>,
            _before: Option<f64>,
        ) -> Result<TimeSeries, StoreError> {
            Ok(TimeSeries::default())
        }
    }

    fn collector(
        device: Arc<ScriptedDevice>,
        store: Arc<RecordingStore>,
    ) -> (Collector, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let collector = Collector::new(device, store, Duration::from_millis(1), rx);
        (collector, tx)
    }

    #[test]
    fn malformed_record_is_dropped_and_rest_of_batch_survives() {
        let readings = vec![
            reading(0, 0, 1, 3.5, "kV"),
            reading(0, 999, 2, 1.0, "V"),
            reading(0, 0, 3, 2.0, "V"),
        ];
        let batch = build_batch(MeasurementKind::Voltage, &readings);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].value, 3500.0);
        assert_eq!(batch[1].value, 2.0);
    }

    #[test]
    fn batch_values_are_canonical() {
        let batch = build_batch(MeasurementKind::Current, &[reading(1, 2, 3, 2.0, "µA")]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].value, 0.002);
        assert_eq!(
            batch[0].det_id,
            DetectorId::encode(ChannelAddress::new(1, 2, 3)).unwrap()
        );
    }

    #[tokio::test]
    async fn voltage_failure_does_not_block_current() {
        let device = Arc::new(ScriptedDevice::new());
        device
            .voltage
            .lock()
            .unwrap()
            .push_back(Err(DeviceError::Query("timeout".into())));
        device
            .current
            .lock()
            .unwrap()
            .push_back(Ok(vec![reading(0, 0, 1, 10.0, "mA")]));
        let store = Arc::new(RecordingStore::default());

        let (collector, _tx) = collector(device, store.clone());
        collector.cycle().await;

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, MeasurementKind::Current);
    }

    #[tokio::test]
    async fn failed_authentication_does_not_poison_the_next_cycle() {
        let device = Arc::new(ScriptedDevice::new());
        device
            .auth
            .lock()
            .unwrap()
            .push_back(Err(DeviceError::Authentication("connection refused".into())));
        device
            .voltage
            .lock()
            .unwrap()
            .push_back(Ok(vec![reading(0, 0, 1, 1.2, "kV")]));
        let store = Arc::new(RecordingStore::default());

        let (collector, _tx) = collector(device, store.clone());
        collector.cycle().await;
        assert!(store.batches.lock().unwrap().is_empty());

        collector.cycle().await;
        assert_eq!(store.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let device = Arc::new(ScriptedDevice::new());
        let store = Arc::new(RecordingStore::default());
        let (collector, tx) = collector(device, store);

        let handle = tokio::spawn(collector.run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("collector did not stop")
            .unwrap();
    }
}
