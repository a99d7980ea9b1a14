//! Three-phase power metering driver.
//!
//! [`Ade7878a`] talks to an ADE7878A-class chip over a
//! [`BusChannel`](energymon_bus::BusChannel):
//!
//! ```text
//! initialize: reset -> verify DEVICE_ID signature -> configure -> Ready
//! read:       timestamp -> voltage -> currents -> active -> reactive -> frequency
//! ```
//!
//! [`SimulatedMeter`] has the same lifecycle with no bus at all.

mod ade7878a;
pub mod calibration;
mod error;
pub mod registers;
mod simulated;

pub use ade7878a::Ade7878a;
pub use calibration::{Calibration, convert};
pub use error::{DeviceError, Result};
pub use simulated::SimulatedMeter;

use energymon_common::PowerReading;

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

/// Capability interface for a power metering device.
pub trait PowerDriver: Send + Sync {
    /// Bring the device to `Ready`. A second call on a ready driver logs a
    /// warning and changes nothing. On failure the driver stays uninitialized.
    fn initialize(&self, calibration: Calibration) -> Result<()>;

    /// Whether the driver is `Ready`.
    fn is_initialized(&self) -> bool;

    /// Acquire one complete reading.
    fn read_power_measurements(&self) -> Result<PowerReading>;

    /// Soft-reset the device.
    fn reset(&self) -> Result<()>;

    /// Check register access and the chip signature.
    fn perform_self_test(&self) -> Result<()>;

    /// Arm or disarm failure injection for reads.
    fn simulate_failure(&self, armed: bool);

    /// Install a canned reading returned (with a fresh timestamp) instead of
    /// reading the device. `None` removes it.
    fn set_simulation_values(&self, reading: Option<PowerReading>);
}
