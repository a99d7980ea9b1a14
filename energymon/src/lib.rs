//! Energy monitor.
//!
//! Polls an ADE7878A three-phase metering chip over I2C and delivers the
//! readings to an HTTP collector:
//!
//! ```text
//! I2cBus -> Ade7878a -> EnergyMonitor (validate, cache, batch) -> ResilientTransport -> collector
//! ```
//!
//! With `simulation.enabled` the bus is a [`SimulatedBus`](energymon_bus::SimulatedBus)
//! holding a healthy chip image and the collector is a
//! [`SimulatedConnector`](energymon_transport::SimulatedConnector).

pub mod args;
pub mod config;
pub mod error;
pub mod monitor;
pub mod simulation;

pub use args::MonitorArgs;
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use monitor::{EnergyMonitor, MonitorStats, RECOVERY_THRESHOLD, validate_reading};
