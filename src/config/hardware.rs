//! Hardware configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which hardware port implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HardwareBackend {
    /// Linux sysfs GPIO
    #[default]
    Sysfs,
    /// In-memory port, drives nothing
    Simulated,
}

impl std::str::FromStr for HardwareBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sysfs" => Ok(HardwareBackend::Sysfs),
            "simulated" | "sim" => Ok(HardwareBackend::Simulated),
            _ => Err(format!("Invalid hardware backend: {}", s)),
        }
    }
}

/// Pin assignments and electrical polarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: HardwareBackend,
    pub gpio_root: PathBuf,
    /// Piece-present sensor at the gate
    pub sensor1_pin: u32,
    /// Slot arrival sensor
    pub sensor2_pin: u32,
    pub solenoid_pin: u32,
    pub ejector_pin: u32,
    /// AI bypass toggle switch; absent means AI is always enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_toggle_pin: Option<u32>,
    pub active_low_inputs: bool,
    pub active_low_outputs: bool,
}

impl HardwareConfig {
    /// Every configured pin, inputs first.
    pub fn all_pins(&self) -> Vec<u32> {
        let mut pins = vec![self.sensor1_pin, self.sensor2_pin];
        pins.extend(self.ai_toggle_pin);
        pins.push(self.solenoid_pin);
        pins.push(self.ejector_pin);
        pins
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: HardwareBackend::Sysfs,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            sensor1_pin: 20,
            sensor2_pin: 21,
            solenoid_pin: 14,
            ejector_pin: 15,
            ai_toggle_pin: Some(16),
            active_low_inputs: true,
            active_low_outputs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_hardware_config_defaults() {
        let config = HardwareConfig::default();
        assert_eq!(config.backend, HardwareBackend::Sysfs);
        assert_eq!(config.solenoid_pin, 14);
        assert_eq!(config.sensor1_pin, 20);
        assert_eq!(config.sensor2_pin, 21);
        assert!(config.active_low_inputs);
    }

    #[test]
    fn test_all_pins_without_toggle() {
        let config = HardwareConfig {
            ai_toggle_pin: None,
            ..Default::default()
        };
        assert_eq!(config.all_pins(), vec![20, 21, 14, 15]);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!(
            HardwareBackend::from_str("SIMULATED").unwrap(),
            HardwareBackend::Simulated
        );
        assert_eq!(HardwareBackend::from_str("sysfs").unwrap(), HardwareBackend::Sysfs);
        assert!(HardwareBackend::from_str("spi").is_err());
    }
}
