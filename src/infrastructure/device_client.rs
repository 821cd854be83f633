// HTTP client for the iCS high-voltage supply controller
use crate::application::device::{DeviceError, DeviceGateway, RawReading, SessionKey};
use crate::domain::measurement::InvalidMeasurement;
use crate::infrastructure::config::ControllerSettings;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Snapshot item path suffixes understood by the controller.
const VOLTAGE_ITEM: &str = "Status.voltageMeasure";
const CURRENT_ITEM: &str = "Status.currentMeasure";

/// Controller client. Holds no session state: the collector re-authenticates
/// every cycle, so an expired key never needs tracking here.
pub struct HttpDeviceClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl HttpDeviceClient {
    pub fn new(settings: &ControllerSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("http://{}:{}", settings.host, settings.port),
            user: settings.user.clone(),
            password: settings.password.clone(),
        })
    }

    async fn fetch_item(&self, key: &SessionKey, item: &str) -> Result<Vec<RawReading>, DeviceError> {
        // Wildcard query across every line, address, and channel.
        let url = format!(
            "{}/api/getItem/{}/*/*/*/{item}",
            self.base_url,
            key.as_str()
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DeviceError::Query(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DeviceError::Query(format!(
                "controller returned {} for {item}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| DeviceError::Query(e.to_string()))?;
        parse_snapshot(&body)
    }
}

#[async_trait]
impl DeviceGateway for HttpDeviceClient {
    async fn authenticate(&self) -> Result<SessionKey, DeviceError> {
        let url = format!("{}/api/login/{}/{}", self.base_url, self.user, self.password);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DeviceError::Authentication(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DeviceError::Authentication(format!(
                "login returned {}",
                response.status()
            )));
        }
        let key = response
            .text()
            .await
            .map_err(|e| DeviceError::Authentication(e.to_string()))?;
        Ok(SessionKey(key.trim().to_string()))
    }

    async fn fetch_voltage(&self, key: &SessionKey) -> Result<Vec<RawReading>, DeviceError> {
        self.fetch_item(key, VOLTAGE_ITEM).await
    }

    async fn fetch_current(&self, key: &SessionKey) -> Result<Vec<RawReading>, DeviceError> {
        self.fetch_item(key, CURRENT_ITEM).await
    }
}

// Wire shape of a getItem response:
// [ { "c": [ { "d": { "p": {"l","a","c"}, "v", "u", "t" } }, ... ] } ]
// Numeric fields may arrive as JSON numbers or as strings, so they are kept
// as raw values here and coerced per record.

#[derive(Debug, Deserialize)]
struct WireSnapshot {
    c: Vec<WireChannel>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    d: WireData,
}

#[derive(Debug, Deserialize)]
struct WireData {
    p: WirePosition,
    v: Value,
    u: String,
    t: Value,
}

#[derive(Debug, Deserialize)]
struct WirePosition {
    l: Value,
    a: Value,
    c: Value,
}

fn coerce_u32(field: &'static str, value: &Value) -> Result<u32, InvalidMeasurement> {
    let malformed = || InvalidMeasurement {
        field,
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).ok_or_else(malformed),
        Value::String(s) => s.trim().parse().map_err(|_| malformed()),
        _ => Err(malformed()),
    }
}

fn coerce_f64(field: &'static str, value: &Value) -> Result<f64, InvalidMeasurement> {
    let malformed = || InvalidMeasurement {
        field,
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(malformed),
        Value::String(s) => s.trim().parse().map_err(|_| malformed()),
        _ => Err(malformed()),
    }
}

impl WireChannel {
    fn reading(&self) -> Result<RawReading, InvalidMeasurement> {
        Ok(RawReading {
            line: coerce_u32("l", &self.d.p.l)?,
            address: coerce_u32("a", &self.d.p.a)?,
            channel: coerce_u32("c", &self.d.p.c)?,
            value: coerce_f64("v", &self.d.v)?,
            unit: self.d.u.clone(),
            time: coerce_f64("t", &self.d.t)?,
        })
    }
}

/// Decode a snapshot body. A top-level shape mismatch fails the whole fetch;
/// a single uncoercible record is dropped with a warning and the rest of the
/// snapshot survives.
fn parse_snapshot(body: &str) -> Result<Vec<RawReading>, DeviceError> {
    let snapshots: Vec<WireSnapshot> = serde_json::from_str(body)
        .map_err(|e| DeviceError::Query(format!("malformed snapshot body: {e}")))?;
    let snapshot = snapshots
        .into_iter()
        .next()
        .ok_or_else(|| DeviceError::Query("empty snapshot response".to_string()))?;

    let mut readings = Vec::with_capacity(snapshot.c.len());
    for channel in &snapshot.c {
        match channel.reading() {
            Ok(reading) => readings.push(reading),
            Err(err) => tracing::warn!(error = %err, "dropping malformed device record"),
        }
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_snapshot_with_mixed_numeric_encodings() {
        let body = r#"[{"c": [
            {"d": {"p": {"l": 0, "a": 1, "c": 2}, "v": 2.5, "u": "kV", "t": 1700000000.5}},
            {"d": {"p": {"l": "0", "a": "1", "c": "3"}, "v": "3.5", "u": "V", "t": "1700000001"}}
        ]}]"#;

        let readings = parse_snapshot(body).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(
            readings[0],
            RawReading {
                line: 0,
                address: 1,
                channel: 2,
                value: 2.5,
                unit: "kV".to_string(),
                time: 1_700_000_000.5,
            }
        );
        assert_eq!(readings[1].channel, 3);
        assert_eq!(readings[1].value, 3.5);
    }

    #[test]
    fn uncoercible_record_is_dropped_but_snapshot_survives() {
        let body = r#"[{"c": [
            {"d": {"p": {"l": 0, "a": 1, "c": 2}, "v": "not-a-number", "u": "V", "t": 10}},
            {"d": {"p": {"l": 0, "a": 1, "c": 3}, "v": 1.0, "u": "V", "t": 10}}
        ]}]"#;

        let readings = parse_snapshot(body).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].channel, 3);
    }

    #[test]
    fn top_level_shape_mismatch_is_a_query_error() {
        assert!(matches!(
            parse_snapshot(r#"{"unexpected": true}"#),
            Err(DeviceError::Query(_))
        ));
        assert!(matches!(parse_snapshot("[]"), Err(DeviceError::Query(_))));
    }

    #[test]
    fn coercion_rejects_non_numeric_values() {
        assert!(coerce_u32("a", &Value::Bool(true)).is_err());
        assert!(coerce_u32("a", &Value::String("-1".into())).is_err());
        assert_eq!(coerce_u32("a", &Value::String(" 7 ".into())).unwrap(), 7);
        assert_eq!(coerce_f64("v", &Value::String("2.5".into())).unwrap(), 2.5);
    }
}
