// Gateway trait for the high-voltage supply controller
use async_trait::async_trait;
use thiserror::Error;

/// Session credential returned by the controller's login endpoint. Expiry is
/// not tracked here; the collector re-authenticates every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One per-channel record from a raw measurement snapshot, numerics already
/// coerced but the channel triple not yet validated and the value not yet in
/// canonical units.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub line: u32,
    pub address: u32,
    pub channel: u32,
    pub value: f64,
    pub unit: String,
    pub time: f64,
}

/// Transient device/network failures. Both variants skip the current
/// collection cycle and never terminate the process.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("device query failed: {0}")]
    Query(String),
}

/// Access to the controller: session handling plus wildcard snapshot
/// fetches over all lines, addresses, and channels.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    async fn authenticate(&self) -> Result<SessionKey, DeviceError>;

    async fn fetch_voltage(&self, key: &SessionKey) -> Result<Vec<RawReading>, DeviceError>;

    async fn fetch_current(&self, key: &SessionKey) -> Result<Vec<RawReading>, DeviceError>;
}
