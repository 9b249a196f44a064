// Service configuration - file and environment layers
use crate::application::graph_service::ChartSettings;
use crate::application::refresh::RefreshSettings;
use crate::application::time_series_store::CacheSettings;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    pub store: StoreSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_sensor_table")]
    pub sensor_table: String,
    #[serde(default = "default_prediction_table")]
    pub prediction_table: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub ttl_check_secs: u64,
    pub sensor_secs: u64,
    pub prediction_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartConfig {
    pub max_points: usize,
    pub history_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

fn default_sensor_table() -> String {
    "sensor_data".to_string()
}

fn default_prediction_table() -> String {
    "predictions".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 10_000,
            debounce_ms: 500,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            ttl_check_secs: 10,
            sensor_secs: 30,
            prediction_secs: 60,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_points: 100,
            history_days: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: chrono::Duration::milliseconds(self.ttl_ms as i64),
            debounce: chrono::Duration::milliseconds(self.debounce_ms as i64),
        }
    }
}

impl RefreshConfig {
    pub fn settings(&self) -> RefreshSettings {
        RefreshSettings {
            ttl_check: Duration::from_secs(self.ttl_check_secs),
            sensor: Duration::from_secs(self.sensor_secs),
            prediction: Duration::from_secs(self.prediction_secs),
        }
    }
}

impl ChartConfig {
    pub fn settings(&self) -> ChartSettings {
        ChartSettings {
            max_points: self.max_points,
            history_days: self.history_days,
        }
    }
}

const MAX_HISTORY_DAYS: i64 = 3650;

impl TelemetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.debounce_ms >= self.cache.ttl_ms {
            anyhow::bail!(
                "cache.debounce_ms ({}) must be shorter than cache.ttl_ms ({})",
                self.cache.debounce_ms,
                self.cache.ttl_ms
            );
        }

        for (key, secs) in [
            ("refresh.ttl_check_secs", self.refresh.ttl_check_secs),
            ("refresh.sensor_secs", self.refresh.sensor_secs),
            ("refresh.prediction_secs", self.refresh.prediction_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("{} must be at least 1", key);
            }
        }

        if !(1..=MAX_HISTORY_DAYS).contains(&self.chart.history_days) {
            anyhow::bail!(
                "chart.history_days ({}) must be between 1 and {}",
                self.chart.history_days,
                MAX_HISTORY_DAYS
            );
        }
        if self.chart.max_points == 0 {
            anyhow::bail!("chart.max_points must be at least 1");
        }
        Ok(())
    }
}

/// `config/telemetry.{toml,yaml,json}` if present, overridden by
/// `TELEMETRY__SECTION__KEY` environment variables.
pub fn load_telemetry_config() -> anyhow::Result<TelemetryConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/telemetry").required(false))
        .add_source(config::Environment::with_prefix("TELEMETRY").separator("__"))
        .build()
        .context("Failed to read telemetry configuration")?;

    let config: TelemetryConfig = settings
        .try_deserialize()
        .context("Invalid telemetry configuration (store.url and store.api_key are required)")?;
    config.validate()?;
    Ok(config)
}
