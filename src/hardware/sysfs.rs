//! Linux sysfs GPIO backend (`/sys/class/gpio`).

use super::{apply_polarity, HardwareError, HardwarePort};
use crate::config::HardwareConfig;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct Pin {
    number: u32,
    value_path: PathBuf,
}

impl Pin {
    fn read_level(&self) -> Result<bool, HardwareError> {
        let raw = fs::read_to_string(&self.value_path).map_err(|source| HardwareError::Io {
            pin: self.number,
            source,
        })?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(HardwareError::InvalidValue {
                pin: self.number,
                value: other.to_string(),
            }),
        }
    }

    fn write_level(&self, level: bool) -> Result<(), HardwareError> {
        fs::write(&self.value_path, if level { "1" } else { "0" }).map_err(|source| {
            HardwareError::Io {
                pin: self.number,
                source,
            }
        })
    }
}

/// Hardware port driving real pins through sysfs.
///
/// Pins exported by this port are unexported again on shutdown (or drop).
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    sensor1: Pin,
    sensor2: Pin,
    ai_toggle: Option<Pin>,
    solenoid: Pin,
    ejector: Pin,
    active_low_inputs: bool,
    active_low_outputs: bool,
    solenoid_on: bool,
    ejector_on: bool,
    exported: Vec<u32>,
    released: bool,
}

impl SysfsGpio {
    /// Claim every configured pin.
    ///
    /// If any pin cannot be claimed, pins exported so far are released before
    /// the error is returned.
    pub fn open(config: &HardwareConfig) -> Result<Self, HardwareError> {
        let mut exported = Vec::new();
        match Self::claim_all(config, &mut exported) {
            Ok(port) => Ok(port),
            Err(e) => {
                for pin in exported {
                    if let Err(err) = unexport(&config.gpio_root, pin) {
                        tracing::warn!(pin, error = %err, "Failed to unexport pin after open error");
                    }
                }
                Err(e)
            }
        }
    }

    fn claim_all(config: &HardwareConfig, exported: &mut Vec<u32>) -> Result<Self, HardwareError> {
        let root = &config.gpio_root;
        // Outputs start at their off level so nothing fires while the line boots
        let output_direction = if config.active_low_outputs {
            "high"
        } else {
            "low"
        };

        let sensor1 = claim(root, config.sensor1_pin, "in", exported)?;
        let sensor2 = claim(root, config.sensor2_pin, "in", exported)?;
        let ai_toggle = match config.ai_toggle_pin {
            Some(pin) => Some(claim(root, pin, "in", exported)?),
            None => None,
        };
        let solenoid = claim(root, config.solenoid_pin, output_direction, exported)?;
        let ejector = claim(root, config.ejector_pin, output_direction, exported)?;

        let mut port = Self {
            root: root.clone(),
            sensor1,
            sensor2,
            ai_toggle,
            solenoid,
            ejector,
            active_low_inputs: config.active_low_inputs,
            active_low_outputs: config.active_low_outputs,
            solenoid_on: false,
            ejector_on: false,
            exported: std::mem::take(exported),
            released: false,
        };

        if let Err(e) = port.drive_outputs_off() {
            // Hand the pins back so the caller's cleanup path releases them
            *exported = std::mem::take(&mut port.exported);
            port.released = true;
            return Err(e);
        }

        Ok(port)
    }

    fn drive_outputs_off(&mut self) -> Result<(), HardwareError> {
        self.set_solenoid(false)?;
        self.set_ejector(false)
    }

    fn read_input(&self, pin: &Pin) -> Result<bool, HardwareError> {
        if self.released {
            return Err(HardwareError::Released);
        }
        Ok(apply_polarity(pin.read_level()?, self.active_low_inputs))
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        if self.released {
            return Ok(());
        }

        // Both actuators off even if the first write fails
        let solenoid = self.set_solenoid(false);
        let ejector = self.set_ejector(false);
        self.released = true;

        for pin in std::mem::take(&mut self.exported) {
            if let Err(e) = unexport(&self.root, pin) {
                tracing::warn!(pin, error = %e, "Failed to unexport pin");
            }
        }

        solenoid.and(ejector)
    }
}

impl HardwarePort for SysfsGpio {
    fn read_sensor1(&mut self) -> Result<bool, HardwareError> {
        self.read_input(&self.sensor1)
    }

    fn read_sensor2(&mut self) -> Result<bool, HardwareError> {
        self.read_input(&self.sensor2)
    }

    fn read_ai_toggle(&mut self) -> Result<bool, HardwareError> {
        match &self.ai_toggle {
            Some(pin) => self.read_input(pin),
            // No toggle wired: AI inspection is always on
            None => Ok(false),
        }
    }

    fn set_solenoid(&mut self, on: bool) -> Result<(), HardwareError> {
        if self.released {
            return Err(HardwareError::Released);
        }
        self.solenoid
            .write_level(apply_polarity(on, self.active_low_outputs))?;
        self.solenoid_on = on;
        Ok(())
    }

    fn set_ejector(&mut self, on: bool) -> Result<(), HardwareError> {
        if self.released {
            return Err(HardwareError::Released);
        }
        self.ejector
            .write_level(apply_polarity(on, self.active_low_outputs))?;
        self.ejector_on = on;
        Ok(())
    }

    fn solenoid_state(&self) -> bool {
        self.solenoid_on
    }

    fn ejector_state(&self) -> bool {
        self.ejector_on
    }

    fn shutdown(&mut self) -> Result<(), HardwareError> {
        self.release()
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!(error = %e, "Failed to release GPIO port on drop");
        }
    }
}

fn claim(
    root: &Path,
    number: u32,
    direction: &str,
    exported: &mut Vec<u32>,
) -> Result<Pin, HardwareError> {
    let pin_dir = root.join(format!("gpio{}", number));

    if !pin_dir.exists() {
        fs::write(root.join("export"), number.to_string())
            .map_err(|source| HardwareError::Unavailable { pin: number, source })?;
        exported.push(number);
    }

    fs::write(pin_dir.join("direction"), direction)
        .map_err(|source| HardwareError::Unavailable { pin: number, source })?;

    tracing::debug!(pin = number, direction, "Claimed GPIO pin");

    Ok(Pin {
        number,
        value_path: pin_dir.join("value"),
    })
}

fn unexport(root: &Path, number: u32) -> std::io::Result<()> {
    fs::write(root.join("unexport"), number.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HardwareBackend;
    use tempfile::TempDir;

    fn fake_sysfs(pins: &[u32]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for pin in pins {
            let pin_dir = dir.path().join(format!("gpio{}", pin));
            fs::create_dir_all(&pin_dir).unwrap();
            fs::write(pin_dir.join("direction"), "in").unwrap();
            // Pulled-up idle level
            fs::write(pin_dir.join("value"), "1").unwrap();
        }
        dir
    }

    fn config_for(root: &Path) -> HardwareConfig {
        HardwareConfig {
            backend: HardwareBackend::Sysfs,
            gpio_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    fn value(root: &Path, pin: u32) -> String {
        fs::read_to_string(root.join(format!("gpio{}/value", pin))).unwrap()
    }

    #[test]
    fn test_open_drives_outputs_off() {
        let config = HardwareConfig::default();
        let dir = fake_sysfs(&config.all_pins());
        let config = config_for(dir.path());

        let port = SysfsGpio::open(&config).unwrap();

        // Active-low outputs: off is a high level
        assert_eq!(value(dir.path(), config.solenoid_pin), "1");
        assert_eq!(value(dir.path(), config.ejector_pin), "1");
        assert_eq!(
            fs::read_to_string(dir.path().join(format!("gpio{}/direction", config.solenoid_pin)))
                .unwrap(),
            "high"
        );
        assert!(!port.solenoid_state());
    }

    #[test]
    fn test_inputs_are_inverted() {
        let config = HardwareConfig::default();
        let dir = fake_sysfs(&config.all_pins());
        let config = config_for(dir.path());
        let mut port = SysfsGpio::open(&config).unwrap();

        assert!(!port.read_sensor1().unwrap());

        fs::write(dir.path().join(format!("gpio{}/value", config.sensor1_pin)), "0\n").unwrap();
        assert!(port.read_sensor1().unwrap());
    }

    #[test]
    fn test_solenoid_write_levels() {
        let config = HardwareConfig::default();
        let dir = fake_sysfs(&config.all_pins());
        let config = config_for(dir.path());
        let mut port = SysfsGpio::open(&config).unwrap();

        port.set_solenoid(true).unwrap();
        assert_eq!(value(dir.path(), config.solenoid_pin), "0");
        assert!(port.solenoid_state());

        port.set_solenoid(false).unwrap();
        assert_eq!(value(dir.path(), config.solenoid_pin), "1");
    }

    #[test]
    fn test_missing_ai_toggle_reads_enabled() {
        let mut config = HardwareConfig {
            ai_toggle_pin: None,
            ..Default::default()
        };
        let dir = fake_sysfs(&config.all_pins());
        config.gpio_root = dir.path().to_path_buf();

        let mut port = SysfsGpio::open(&config).unwrap();
        assert!(!port.read_ai_toggle().unwrap());
    }

    #[test]
    fn test_invalid_value_rejected() {
        let config = HardwareConfig::default();
        let dir = fake_sysfs(&config.all_pins());
        let config = config_for(dir.path());
        let mut port = SysfsGpio::open(&config).unwrap();

        fs::write(dir.path().join(format!("gpio{}/value", config.sensor2_pin)), "?").unwrap();
        assert!(matches!(
            port.read_sensor2(),
            Err(HardwareError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_shutdown_turns_actuators_off_and_releases() {
        let config = HardwareConfig::default();
        let dir = fake_sysfs(&config.all_pins());
        let config = config_for(dir.path());
        let mut port = SysfsGpio::open(&config).unwrap();

        port.set_ejector(true).unwrap();
        port.shutdown().unwrap();

        assert_eq!(value(dir.path(), config.ejector_pin), "1");
        assert!(matches!(port.read_sensor1(), Err(HardwareError::Released)));
    }

    #[test]
    fn test_open_failure_unexports_claimed_pins() {
        // No pin directories exist and export does not create them
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.sensor1_pin = 20;

        let result = SysfsGpio::open(&config);

        assert!(matches!(
            result,
            Err(HardwareError::Unavailable { pin: 20, .. })
        ));
        // The export for pin 20 was written, then undone
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "20");
    }
}
