// SQLite-backed implementation of the telemetry store
use crate::application::store::{RegistrationSummary, StoreError, TelemetryStore};
use crate::domain::detector::{Detector, DetectorId};
use crate::domain::measurement::{Measurement, MeasurementKind, TimeSeries};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tokio::sync::Mutex;

/// One detector table plus one append-only table per measurement kind, each
/// indexed on `(det_id, time)` for range scans.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS detector (
    id      INTEGER PRIMARY KEY,
    name    TEXT NOT NULL,
    line    INTEGER NOT NULL,
    address INTEGER NOT NULL,
    channel INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS voltage (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    det_id  INTEGER NOT NULL,
    line    INTEGER NOT NULL,
    address INTEGER NOT NULL,
    channel INTEGER NOT NULL,
    value   REAL NOT NULL,
    time    REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_voltage_det_time ON voltage (det_id, time);
CREATE TABLE IF NOT EXISTS current (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    det_id  INTEGER NOT NULL,
    line    INTEGER NOT NULL,
    address INTEGER NOT NULL,
    channel INTEGER NOT NULL,
    value   REAL NOT NULL,
    time    REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_current_det_time ON current (det_id, time);
";

impl MeasurementKind {
    fn table(self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::Current => "current",
        }
    }
}

/// SQLite store. WAL journaling keeps the read API responsive while the
/// collector commits a batch.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(StoreError::new)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(StoreError::new)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::new)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::new)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::new)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn detector_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Detector> {
    Ok(Detector {
        id: DetectorId(row.get(0)?),
        name: row.get(1)?,
        line: row.get(2)?,
        address: row.get(3)?,
        channel: row.get(4)?,
    })
}

#[async_trait]
impl TelemetryStore for SqliteStore {
    async fn get_detector(&self, id: DetectorId) -> Result<Option<Detector>, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, name, line, address, channel FROM detector WHERE id = ?1",
            params![id.0],
            detector_from_row,
        )
        .optional()
        .map_err(StoreError::new)
    }

    async fn list_detectors(&self) -> Result<Vec<Detector>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT id, name, line, address, channel FROM detector ORDER BY id")
            .map_err(StoreError::new)?;
        let rows = stmt
            .query_map([], detector_from_row)
            .map_err(StoreError::new)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::new)
    }

    async fn find_detectors_by_name(&self, name: &str) -> Result<Vec<Detector>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, line, address, channel FROM detector \
                 WHERE name = ?1 ORDER BY id",
            )
            .map_err(StoreError::new)?;
        let rows = stmt
            .query_map(params![name], detector_from_row)
            .map_err(StoreError::new)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::new)
    }

    async fn register_detectors(
        &self,
        detectors: &[Detector],
    ) -> Result<RegistrationSummary, StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(StoreError::new)?;
        let mut summary = RegistrationSummary::default();

        for det in detectors {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT name FROM detector WHERE id = ?1",
                    params![det.id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::new)?;

            match existing {
                Some(name) if name != det.name => {
                    tx.execute(
                        "UPDATE detector SET name = ?2 WHERE id = ?1",
                        params![det.id.0, det.name],
                    )
                    .map_err(StoreError::new)?;
                    summary.renamed += 1;
                }
                Some(_) => {}
                None => {
                    tx.execute(
                        "INSERT INTO detector (id, name, line, address, channel) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![det.id.0, det.name, det.line, det.address, det.channel],
                    )
                    .map_err(StoreError::new)?;
                    summary.inserted += 1;
                }
            }
        }

        tx.commit().map_err(StoreError::new)?;
        Ok(summary)
    }

    async fn insert_measurements(
        &self,
        kind: MeasurementKind,
        batch: &[Measurement],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(StoreError::new)?;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} (det_id, line, address, channel, value, time) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    kind.table()
                ))
                .map_err(StoreError::new)?;
            for m in batch {
                stmt.execute(params![
                    m.det_id.0,
                    m.address.line,
                    m.address.address,
                    m.address.channel,
                    m.value,
                    m.time,
                ])
                .map_err(StoreError::new)?;
            }
        }
        tx.commit().map_err(StoreError::new)
    }

    async fn query_series(
        &self,
        kind: MeasurementKind,
        det_id: DetectorId,
        after: Option<f64>,
        before: Option<f64>,
    ) -> Result<TimeSeries, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT time, value FROM {} WHERE det_id = ?1 \
                 AND (?2 IS NULL OR time > ?2) AND (?3 IS NULL OR time < ?3) \
                 ORDER BY time ASC",
                kind.table()
            ))
            .map_err(StoreError::new)?;

        let mut rows = stmt
            .query(params![det_id.0, after, before])
            .map_err(StoreError::new)?;
        let mut series = TimeSeries::default();
        while let Some(row) = rows.next().map_err(StoreError::new)? {
            let time: f64 = row.get(0).map_err(StoreError::new)?;
            let value: f64 = row.get(1).map_err(StoreError::new)?;
            series.push(time, value);
        }
        Ok(series)
    }
}
