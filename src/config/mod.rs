//! Configuration module for the inspection line
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`INSPECTOR_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use inspector::config::InspectorConfig;
//!
//! let config = InspectorConfig::default();
//! assert_eq!(config.timing.tick_interval_ms, 50);
//!
//! let toml = r#"
//! [timing]
//! start_delay_ms = 250
//! "#;
//! let config: InspectorConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.timing.start_delay_ms, 250);
//! assert_eq!(config.timing.hold_delay_ms, 500);
//! ```

pub mod cache;
pub mod ejection;
pub mod error;
pub mod hardware;
pub mod http;
pub mod logging;
pub mod network;
pub mod state;
pub mod timing;

pub use cache::{CacheConfig, MAX_CACHE_SIZE_MB};
pub use ejection::EjectionThresholds;
pub use error::ConfigError;
pub use hardware::{HardwareBackend, HardwareConfig};
pub use http::{EndpointsConfig, HttpConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use network::NetworkConfig;
pub use state::StateConfig;
pub use timing::{TimingConfig, MAX_SENSOR2_WAIT_SECONDS};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Unified configuration for the inspection line, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InspectorConfig {
    pub hardware: HardwareConfig,
    pub endpoints: EndpointsConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub timing: TimingConfig,
    pub ejection: EjectionThresholds,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
    pub state: StateConfig,
}

impl InspectorConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `INSPECTOR_*` environment variable overrides.
    ///
    /// Invalid values are ignored and the previous value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("INSPECTOR_IMAGE_URL") {
            self.endpoints.image_url = url;
        }
        if let Ok(url) = std::env::var("INSPECTOR_INFERENCE_URL") {
            self.endpoints.inference_url = url;
        }

        if let Ok(level) = std::env::var("INSPECTOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("INSPECTOR_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(enabled) = std::env::var("INSPECTOR_NETWORK_CHECK") {
            self.network.enabled = enabled.to_lowercase() == "true";
        }
        if let Ok(backend) = std::env::var("INSPECTOR_HARDWARE") {
            if let Ok(b) = backend.parse() {
                self.hardware.backend = b;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("endpoints.image_url", &self.endpoints.image_url)?;
        validate_url("endpoints.inference_url", &self.endpoints.inference_url)?;

        if self.timing.tick_interval_ms == 0 {
            return Err(invalid("timing.tick_interval_ms", "must be non-zero"));
        }
        if !(0.0..=MAX_SENSOR2_WAIT_SECONDS).contains(&self.timing.sensor2_wait_time_s) {
            return Err(invalid(
                "timing.sensor2_wait_time_s",
                &format!("must be between 0 and {} seconds", MAX_SENSOR2_WAIT_SECONDS),
            ));
        }

        if self.cache.max_size_mb == 0 {
            return Err(invalid("cache.max_size_mb", "must be non-zero"));
        }
        if self.cache.max_size_mb > MAX_CACHE_SIZE_MB {
            return Err(invalid(
                "cache.max_size_mb",
                &format!("must be at most {}", MAX_CACHE_SIZE_MB),
            ));
        }

        let ejection = &self.ejection;
        for (field, value) in [
            ("ejection.confidence_min", ejection.confidence_min),
            ("ejection.area_max", ejection.area_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within [0, 1]"));
            }
        }
        // A zero count would eject every piece, including ones with no detections
        for (field, value) in [
            ("ejection.critical_count", ejection.critical_count),
            ("ejection.major_count", ejection.major_count),
            ("ejection.total_defects_min", ejection.total_defects_min),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }

        if self.network.enabled {
            if self.network.dns_servers.is_empty() {
                return Err(invalid(
                    "network.dns_servers",
                    "at least one resolver is required when network checks are enabled",
                ));
            }
            if self.network.interval_seconds == 0 {
                return Err(invalid("network.interval_seconds", "must be non-zero"));
            }
        }
        if self.network.history_size == 0 {
            return Err(invalid("network.history_size", "must be non-zero"));
        }

        if let Some((component, reason)) = self.logging.invalid_component() {
            return Err(invalid(&format!("logging.component_levels.{}", component), &reason));
        }

        validate_pins(&self.hardware)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(field, &e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(invalid(field, "URL must include a host"));
    }
    Ok(())
}

fn validate_pins(hardware: &HardwareConfig) -> Result<(), ConfigError> {
    let mut named = vec![
        ("sensor1_pin", hardware.sensor1_pin),
        ("sensor2_pin", hardware.sensor2_pin),
        ("solenoid_pin", hardware.solenoid_pin),
        ("ejector_pin", hardware.ejector_pin),
    ];
    if let Some(pin) = hardware.ai_toggle_pin {
        named.push(("ai_toggle_pin", pin));
    }

    let mut seen: HashMap<u32, &str> = HashMap::new();
    for (name, pin) in named {
        if let Some(first) = seen.insert(pin, name) {
            return Err(ConfigError::DuplicatePin {
                pin,
                first: first.to_string(),
                second: name.to_string(),
            });
        }
    }
    Ok(())
}
