// Configuration loading
use crate::application::registry::ConfiguredDetector;
use crate::domain::detector::ChannelAddress;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub controller: ControllerSettings,
    pub storage: StorageSettings,
    pub collector: CollectorSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControllerSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// SQLite database path.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorSettings {
    /// Fixed delay between collection cycles, seconds.
    pub interval_secs: u64,
    /// Path to the JSON detector list file.
    pub detector_list: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Load `config/monitor.toml`, with `HV_`-prefixed environment overrides
/// (e.g. `HV_CONTROLLER__PASSWORD`).
pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitor"))
        .add_source(config::Environment::with_prefix("HV").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// One entry of the detector list file:
/// `[{"id": [line, address, channel], "name": "..."}]`.
#[derive(Debug, Deserialize)]
struct DetectorListEntry {
    id: [u32; 3],
    name: String,
}

pub fn load_detector_list(path: &str) -> anyhow::Result<Vec<ConfiguredDetector>> {
    let body = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("reading detector list {path}"))?;
    parse_detector_list(&body).with_context(|| format!("parsing detector list {path}"))
}

fn parse_detector_list(body: &str) -> anyhow::Result<Vec<ConfiguredDetector>> {
    let entries: Vec<DetectorListEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .map(|entry| ConfiguredDetector {
            address: ChannelAddress::new(entry.id[0], entry.id[1], entry.id[2]),
            name: entry.name,
        })
        .collect())
}
