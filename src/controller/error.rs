//! Tick error types.

use crate::hardware::HardwareError;
use thiserror::Error;

/// Faults caught at the top of a tick. The driver records them and keeps
/// ticking.
#[derive(Error, Debug)]
pub enum TickError {
    #[error("hardware fault: {0}")]
    Hardware(#[from] HardwareError),

    /// The processing task ended without reporting an outcome.
    #[error("processing task ended without a result")]
    TaskLost,
}
