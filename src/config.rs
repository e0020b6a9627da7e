use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub collector: CollectorConfig,
    pub predictor: PredictorConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Vendor meter API root, e.g. "https://sereneinv.co.zw/minimeter".
    pub base_url: String,
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    pub models_dir: String,
    /// Minimum readings before a per-device model can be trained.
    pub min_device_samples: usize,
    /// Minimum readings across all devices for the peak demand model.
    pub min_peak_samples: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub enabled: bool,
    /// Hour of day (0-23) for the daily device sync.
    pub device_sync_hour: u32,
    /// Minute past each hour for the consumption sync.
    pub consumption_sync_minute: u32,
    /// Hour of day (0-23) for the daily model training run.
    pub training_hour: u32,
    /// Prediction generation fires every N hours...
    pub prediction_every_hours: u32,
    /// ...at this minute past the hour.
    pub prediction_minute: u32,
    pub prediction_days_ahead: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("GRIDWATCH__").split("__"));
        Ok(figment.extract()?)
    }
}
