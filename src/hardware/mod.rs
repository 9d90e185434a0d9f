//! Hardware I/O port for the inspection line.
//!
//! The port exposes the three discrete inputs (piece-present sensor, slot
//! arrival sensor, AI bypass toggle) and the two actuators (gate solenoid,
//! pneumatic ejector). Inputs are wired active-low; every backend applies the
//! polarity inversion so callers always see `true = triggered`.
//!
//! Two backends are provided:
//! - [`SysfsGpio`] drives real pins through the Linux `/sys/class/gpio` interface
//! - [`SimulatedPort`] keeps pin levels in memory for tests and dry runs

mod error;
mod simulated;
mod sysfs;

pub use error::HardwareError;
pub use simulated::SimulatedPort;
pub use sysfs::SysfsGpio;

use crate::config::{HardwareBackend, HardwareConfig};

/// Immutable read of every input, taken once per controller tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorSnapshot {
    /// Piece present at the gate
    pub sensor1: bool,
    /// Piece arrived in the inspection slot
    pub sensor2: bool,
    /// AI bypass toggle is active
    pub ai_disabled: bool,
}

/// Discrete sensor reads and actuator writes.
///
/// Implementations do no logic beyond electrical-level inversion.
pub trait HardwarePort: Send {
    fn read_sensor1(&mut self) -> Result<bool, HardwareError>;

    fn read_sensor2(&mut self) -> Result<bool, HardwareError>;

    /// `true` when the operator has switched AI inspection off.
    fn read_ai_toggle(&mut self) -> Result<bool, HardwareError>;

    fn set_solenoid(&mut self, on: bool) -> Result<(), HardwareError>;

    fn set_ejector(&mut self, on: bool) -> Result<(), HardwareError>;

    /// Last commanded solenoid state.
    fn solenoid_state(&self) -> bool;

    /// Last commanded ejector state.
    fn ejector_state(&self) -> bool;

    /// Force both actuators off, then release the device handle.
    ///
    /// Safe to call more than once; later calls are no-ops.
    fn shutdown(&mut self) -> Result<(), HardwareError>;

    /// Read all inputs for one tick.
    fn snapshot(&mut self) -> Result<SensorSnapshot, HardwareError> {
        Ok(SensorSnapshot {
            sensor1: self.read_sensor1()?,
            sensor2: self.read_sensor2()?,
            ai_disabled: self.read_ai_toggle()?,
        })
    }
}

/// Open the backend selected in configuration.
///
/// Failure here is fatal: the caller must not start the control loop.
pub fn open(config: &HardwareConfig) -> Result<Box<dyn HardwarePort>, HardwareError> {
    match config.backend {
        HardwareBackend::Sysfs => {
            let port = SysfsGpio::open(config)?;
            tracing::info!(
                gpio_root = %config.gpio_root.display(),
                sensor1_pin = config.sensor1_pin,
                sensor2_pin = config.sensor2_pin,
                solenoid_pin = config.solenoid_pin,
                ejector_pin = config.ejector_pin,
                ai_toggle_pin = ?config.ai_toggle_pin,
                "Opened sysfs GPIO port"
            );
            Ok(Box::new(port))
        }
        HardwareBackend::Simulated => {
            tracing::warn!("Using simulated hardware port, no pins will be driven");
            Ok(Box::new(SimulatedPort::new()))
        }
    }
}

/// Convert an electrical level into a logical state (or back).
///
/// The mapping is its own inverse, so it serves both inputs and outputs.
pub(crate) fn apply_polarity(level: bool, active_low: bool) -> bool {
    level != active_low
}
