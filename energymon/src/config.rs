//! Configuration for the energy monitor.

use std::path::Path;
use std::time::Duration;

use energymon_common::{Error, LINES, LoggingConfig, Result};
use energymon_transport::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Complete monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// I2C bus and chip address
    #[serde(default)]
    pub bus: BusConfig,

    /// Per-line calibration factors
    #[serde(default = "default_calibration")]
    pub calibration: [f64; LINES],

    /// Collector connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Acquisition loop and reading cache
    #[serde(default)]
    pub polling: PollingConfig,

    /// Plausibility limits for readings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Hardware-free operation and failure injection
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_calibration() -> [f64; LINES] {
    [1.0; LINES]
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            calibration: default_calibration(),
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            validation: ValidationConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// I2C bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// I2C device node (default: "/dev/i2c-1")
    #[serde(default = "default_device")]
    pub device: String,

    /// 7-bit chip address (default: 0x38)
    #[serde(default = "default_address")]
    pub address: u8,
}

fn default_device() -> String {
    "/dev/i2c-1".to_string()
}

fn default_address() -> u8 {
    energymon_meter::registers::DEFAULT_ADDRESS
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            address: default_address(),
        }
    }
}

/// Collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the collector
    #[serde(default = "default_url")]
    pub url: String,

    /// Endpoint readings are posted to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Device name sent with every batch
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the first retry, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Double the wait after every retry
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,

    /// Bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_endpoint() -> String {
    "/api/readings".to_string()
}

fn default_device_id() -> String {
    "ade7878a".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            endpoint: default_endpoint(),
            device_id: default_device_id(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            exponential_backoff: default_true(),
            api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            self.exponential_backoff,
        )
    }
}

/// Acquisition loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Time between readings in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Readings kept while the collector is unreachable
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Readings per delivered batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_cache_size() -> usize {
    100
}

fn default_batch_size() -> usize {
    1
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_cache_size: default_max_cache_size(),
            batch_size: default_batch_size(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Plausibility limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_voltage")]
    pub max_voltage: f64,

    #[serde(default = "default_min_frequency")]
    pub min_frequency: f64,

    #[serde(default = "default_max_frequency")]
    pub max_frequency: f64,
}

fn default_max_voltage() -> f64 {
    500.0
}

fn default_min_frequency() -> f64 {
    45.0
}

fn default_max_frequency() -> f64 {
    65.0
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_voltage: default_max_voltage(),
            min_frequency: default_min_frequency(),
            max_frequency: default_max_frequency(),
        }
    }
}

/// Simulation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Run against a simulated bus and collector
    #[serde(default)]
    pub enabled: bool,

    /// Make every meter read fail
    #[serde(default)]
    pub fail_device: bool,

    /// Make every delivery fail
    #[serde(default)]
    pub fail_transport: bool,
}

impl MonitorConfig {
    /// Load and validate configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = energymon_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = energymon_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.bus.device.trim().is_empty() {
            return Err(Error::validation("bus.device must not be empty"));
        }

        if !energymon_bus::is_valid_address(self.bus.address) {
            return Err(Error::validation(format!(
                "bus.address 0x{:02X} outside 0x{:02X}-0x{:02X}",
                self.bus.address,
                energymon_bus::MIN_ADDRESS,
                energymon_bus::MAX_ADDRESS
            )));
        }

        if let Some(factor) = self
            .calibration
            .iter()
            .find(|f| !f.is_finite() || **f <= 0.0)
        {
            return Err(Error::validation(format!(
                "calibration factors must be finite and positive, got {}",
                factor
            )));
        }

        if self.server.url.trim().is_empty() {
            return Err(Error::validation("server.url must not be empty"));
        }

        if self.polling.interval_ms == 0 {
            return Err(Error::validation("polling.interval_ms must be > 0"));
        }

        if self.polling.batch_size == 0 {
            return Err(Error::validation("polling.batch_size must be >= 1"));
        }

        if self.polling.batch_size > self.polling.max_cache_size {
            return Err(Error::validation(
                "polling.batch_size must not exceed polling.max_cache_size",
            ));
        }

        if self.validation.min_frequency >= self.validation.max_frequency {
            return Err(Error::validation(
                "validation.min_frequency must be below validation.max_frequency",
            ));
        }

        Ok(())
    }
}
