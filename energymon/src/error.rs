//! Error types for the monitor.

use energymon_meter::DeviceError;
use energymon_transport::TransportError;
use thiserror::Error;

/// Errors raised while acquiring or delivering readings.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The meter failed to produce a reading.
    #[error("Meter error: {0}")]
    Device(#[from] DeviceError),

    /// The reading could not be delivered.
    #[error("Delivery error: {0}")]
    Transport(#[from] TransportError),

    /// The reading failed plausibility checks.
    #[error("Invalid reading: {0}")]
    Invalid(#[from] energymon_common::Error),

    /// The blocking acquisition task did not complete.
    #[error("Acquisition task failed: {0}")]
    Task(String),
}
