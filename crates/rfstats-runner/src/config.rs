//! # Configuration Loading
//!
//! TOML schema for a simulated sensor deployment.
//!
//! ```toml
//! [simulation]
//! noise_floor = -115.0
//! noise_duration_secs = 25
//! rfi_duration_secs = 12
//! rfi_shift = 20.0
//! write_interval_secs = 5
//!
//! [[sensors]]
//! hardware_id = 1
//! metadata_id = 47
//!
//! [sink]
//! kind = "outputs_table"
//! path = "data/outputs.jsonl"
//! ```
//!
//! Every error here is fatal: nothing starts ticking until `validate` passes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use rfstats_core::{InitialTrigger, ScheduleParams};
use serde::Deserialize;

/// Metadata ids of the reference single-node deployment (hardware id 1).
pub const DEFAULT_METADATA_IDS: [i64; 20] = [
    47, 48, 49, 50, 55, 56, 77, 78, 79, 80, 1, 2, 5, 6, 17, 18, 19, 20, 25, 26,
];

/// Root configuration schema.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RfStatsConfig {
    pub simulation: SimulationInfo,
    pub sensors: Vec<SensorInfo>,
    #[serde(default)]
    pub sink: SinkInfo,
}

/// Signal model shared by every sensor in the deployment.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SimulationInfo {
    /// Baseline anchor in dB; also the reference for the kurtosis proxy.
    pub noise_floor: f64,
    #[serde(default = "default_std_dev")]
    pub std_dev: f64,
    #[serde(default = "default_samples_per_tick")]
    pub samples_per_tick: usize,
    #[serde(default = "default_noise_duration_secs")]
    pub noise_duration_secs: f64,
    #[serde(default = "default_rfi_duration_secs")]
    pub rfi_duration_secs: f64,
    #[serde(default = "default_rfi_shift")]
    pub rfi_shift: f64,
    #[serde(default = "default_write_interval_secs")]
    pub write_interval_secs: f64,
    #[serde(default)]
    pub initial_trigger: InitialTrigger,
    /// Base RNG seed; sensor `i` uses `seed + i`.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Stop after this many ticks (unbounded when absent).
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

fn default_std_dev() -> f64 {
    2.0
}
fn default_samples_per_tick() -> usize {
    10
}
fn default_noise_duration_secs() -> f64 {
    25.0
}
fn default_rfi_duration_secs() -> f64 {
    12.0
}
fn default_rfi_shift() -> f64 {
    20.0
}
fn default_write_interval_secs() -> f64 {
    5.0
}
fn default_http_timeout_secs() -> f64 {
    10.0
}

impl SimulationInfo {
    /// Reference defaults around the given noise floor.
    pub fn with_noise_floor(noise_floor: f64) -> Self {
        Self {
            noise_floor,
            std_dev: default_std_dev(),
            samples_per_tick: default_samples_per_tick(),
            noise_duration_secs: default_noise_duration_secs(),
            rfi_duration_secs: default_rfi_duration_secs(),
            rfi_shift: default_rfi_shift(),
            write_interval_secs: default_write_interval_secs(),
            initial_trigger: InitialTrigger::default(),
            seed: None,
            max_ticks: None,
        }
    }

    pub fn schedule(&self) -> Result<ScheduleParams, ConfigError> {
        Ok(ScheduleParams {
            noise_duration: secs("noise_duration_secs", self.noise_duration_secs)?,
            rfi_duration: secs("rfi_duration_secs", self.rfi_duration_secs)?,
            rfi_shift: self.rfi_shift,
            initial_trigger: self.initial_trigger,
        })
    }

    pub fn write_interval(&self) -> Result<Duration, ConfigError> {
        let interval = secs("write_interval_secs", self.write_interval_secs)?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid(
                "write_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(interval)
    }
}

/// Identity of one simulated sensor.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorInfo {
    pub hardware_id: i64,
    pub metadata_id: i64,
}

/// Where records go.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkInfo {
    /// Console only.
    #[default]
    Log,
    /// Append rows to a JSONL outputs table.
    OutputsTable { path: PathBuf },
    /// POST CSV envelopes to a monitor endpoint.
    Http {
        endpoint: String,
        monitor_id: String,
        /// Name of the env var holding the bearer token.
        #[serde(default)]
        token_env: Option<String>,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: f64,
    },
}

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Non-finite value for `{0}`")]
    NonFinite(&'static str),

    #[error("Duplicate sensor (hardware_id={hardware_id}, metadata_id={metadata_id})")]
    DuplicateSensor { hardware_id: i64, metadata_id: i64 },

    #[error("Environment variable `{0}` is not set")]
    MissingEnv(String),
}

fn finite(name: &'static str, v: f64) -> Result<f64, ConfigError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ConfigError::NonFinite(name))
    }
}

fn secs(name: &'static str, v: f64) -> Result<Duration, ConfigError> {
    finite(name, v)?;
    Duration::try_from_secs_f64(v)
        .map_err(|e| ConfigError::Invalid(format!("{name} = {v}: {e}")))
}

impl RfStatsConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Could not read config file {}: {}", path, e))?;
        let cfg = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("{} ({})", e, path))?;
        Ok(cfg)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Self =
            toml::from_str(s).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        finite("noise_floor", sim.noise_floor)?;
        finite("std_dev", sim.std_dev)?;
        finite("rfi_shift", sim.rfi_shift)?;
        if sim.std_dev < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "std_dev must be >= 0, got {}",
                sim.std_dev
            )));
        }
        if sim.samples_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "samples_per_tick must be > 0".to_string(),
            ));
        }
        sim.schedule()?;
        sim.write_interval()?;

        if self.sensors.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[sensors]] entry is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for s in &self.sensors {
            if !seen.insert((s.hardware_id, s.metadata_id)) {
                return Err(ConfigError::DuplicateSensor {
                    hardware_id: s.hardware_id,
                    metadata_id: s.metadata_id,
                });
            }
        }

        match &self.sink {
            SinkInfo::Log => {}
            SinkInfo::OutputsTable { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(
                        "outputs_table sink requires a path".to_string(),
                    ));
                }
            }
            SinkInfo::Http {
                endpoint,
                monitor_id,
                timeout_secs,
                ..
            } => {
                if endpoint.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "http sink requires an endpoint".to_string(),
                    ));
                }
                if monitor_id.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "http sink requires a monitor_id".to_string(),
                    ));
                }
                let timeout = secs("timeout_secs", *timeout_secs)?;
                if timeout.is_zero() {
                    return Err(ConfigError::Invalid(
                        "timeout_secs must be > 0".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Resolve the bearer token of an http sink from the environment.
    pub fn http_token(&self) -> Result<Option<String>, ConfigError> {
        match &self.sink {
            SinkInfo::Http {
                token_env: Some(var),
                ..
            } => std::env::var(var)
                .map(Some)
                .map_err(|_| ConfigError::MissingEnv(var.clone())),
            _ => Ok(None),
        }
    }
}
