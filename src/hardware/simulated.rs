//! In-memory hardware port.
//!
//! Clones share the same pin state, so a test can keep one handle to drive
//! sensors while the controller owns another.

use super::{apply_polarity, HardwareError, HardwarePort};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Simulated inputs are wired active-low, like the real line.
const ACTIVE_LOW: bool = true;

#[derive(Debug)]
struct Pins {
    // Electrical levels; idle inputs are pulled high
    sensor1_level: bool,
    sensor2_level: bool,
    ai_toggle_level: bool,
    solenoid: bool,
    ejector: bool,
    solenoid_writes: u64,
    ejector_activations: u64,
    fail_reads: bool,
    ejector_faults: u32,
    released: bool,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            sensor1_level: true,
            sensor2_level: true,
            ai_toggle_level: true,
            solenoid: false,
            ejector: false,
            solenoid_writes: 0,
            ejector_activations: 0,
            fail_reads: false,
            ejector_faults: 0,
            released: false,
        }
    }
}

/// Hardware port backed by shared memory.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPort {
    pins: Arc<Mutex<Pins>>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn pins(&self) -> MutexGuard<'_, Pins> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Trigger or release the piece-present sensor.
    pub fn set_sensor1(&self, triggered: bool) {
        self.pins().sensor1_level = apply_polarity(triggered, ACTIVE_LOW);
    }

    /// Trigger or release the slot sensor.
    pub fn set_sensor2(&self, triggered: bool) {
        self.pins().sensor2_level = apply_polarity(triggered, ACTIVE_LOW);
    }

    /// Flip the AI bypass toggle.
    pub fn set_ai_disabled(&self, disabled: bool) {
        self.pins().ai_toggle_level = apply_polarity(disabled, ACTIVE_LOW);
    }

    /// Make every subsequent input read fail with an I/O error.
    pub fn fail_reads(&self, fail: bool) {
        self.pins().fail_reads = fail;
    }

    /// Make the next `count` attempts to switch the ejector on fail.
    pub fn fail_ejector_asserts(&self, count: u32) {
        self.pins().ejector_faults = count;
    }

    pub fn solenoid(&self) -> bool {
        self.pins().solenoid
    }

    pub fn ejector(&self) -> bool {
        self.pins().ejector
    }

    /// Number of solenoid writes, one per unlocked or locked tick.
    pub fn solenoid_writes(&self) -> u64 {
        self.pins().solenoid_writes
    }

    /// Number of off-to-on ejector transitions.
    pub fn ejector_activations(&self) -> u64 {
        self.pins().ejector_activations
    }

    pub fn is_released(&self) -> bool {
        self.pins().released
    }

    fn read(&self, pin: u32, level: impl Fn(&Pins) -> bool) -> Result<bool, HardwareError> {
        let pins = self.pins();
        if pins.released {
            return Err(HardwareError::Released);
        }
        if pins.fail_reads {
            return Err(HardwareError::Io {
                pin,
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated read fault"),
            });
        }
        Ok(apply_polarity(level(&pins), ACTIVE_LOW))
    }
}

impl HardwarePort for SimulatedPort {
    fn read_sensor1(&mut self) -> Result<bool, HardwareError> {
        self.read(1, |p| p.sensor1_level)
    }

    fn read_sensor2(&mut self) -> Result<bool, HardwareError> {
        self.read(2, |p| p.sensor2_level)
    }

    fn read_ai_toggle(&mut self) -> Result<bool, HardwareError> {
        self.read(3, |p| p.ai_toggle_level)
    }

    fn set_solenoid(&mut self, on: bool) -> Result<(), HardwareError> {
        let mut pins = self.pins();
        if pins.released {
            return Err(HardwareError::Released);
        }
        pins.solenoid = on;
        pins.solenoid_writes += 1;
        Ok(())
    }

    fn set_ejector(&mut self, on: bool) -> Result<(), HardwareError> {
        let mut pins = self.pins();
        if pins.released {
            return Err(HardwareError::Released);
        }
        if on && pins.ejector_faults > 0 {
            pins.ejector_faults -= 1;
            return Err(HardwareError::Io {
                pin: 5,
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write fault"),
            });
        }
        if on && !pins.ejector {
            pins.ejector_activations += 1;
        }
        pins.ejector = on;
        Ok(())
    }

    fn solenoid_state(&self) -> bool {
        self.pins().solenoid
    }

    fn ejector_state(&self) -> bool {
        self.pins().ejector
    }

    fn shutdown(&mut self) -> Result<(), HardwareError> {
        let mut pins = self.pins();
        if pins.released {
            return Ok(());
        }
        pins.solenoid = false;
        pins.ejector = false;
        pins.released = true;
        Ok(())
    }
}
