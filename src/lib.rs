//! Inspection line controller
//!
//! Drives a physical inspection line: a sensor-gated solenoid admits each
//! piece, a camera capture is sent to an AI inference service, and a
//! pneumatic ejector removes defective pieces. The [`controller`] module is
//! the real-time core; everything else is a collaborator it owns or calls.

pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod display;
pub mod hardware;
pub mod imaging;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod policy;
