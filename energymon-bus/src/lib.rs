//! Addressed I2C register channel.
//!
//! A [`BusChannel`] issues register-addressed byte and block transfers to a
//! 7-bit slave address. Every transfer is framed the same way:
//!
//! ```text
//! [select slave address] -> [register byte] -> [payload byte(s)]
//! ```
//!
//! Two implementations are provided:
//! - [`I2cBus`] - real transfers through a [`BusDevice`] (Linux `/dev/i2c-N` by default)
//! - [`SimulatedBus`] - an in-memory register map, for running without hardware
//!
//! Both keep a register map keyed by `(device address, register)`. In simulated
//! mode it *is* the device; in real mode it mirrors the last bytes written, so
//! round trips can be checked without reading the hardware back.

mod device;
mod error;
mod i2c;
mod simulated;
mod state;

pub use device::{BusDevice, BusHandle, LinuxI2cDevice, LinuxI2cHandle};
pub use error::{BusError, Result};
pub use i2c::I2cBus;
pub use simulated::SimulatedBus;

/// Lowest non-reserved 7-bit slave address.
pub const MIN_ADDRESS: u8 = 0x03;

/// Highest non-reserved 7-bit slave address.
pub const MAX_ADDRESS: u8 = 0x77;

/// Whether `addr` is a usable slave address.
pub fn is_valid_address(addr: u8) -> bool {
    (MIN_ADDRESS..=MAX_ADDRESS).contains(&addr)
}

/// Capability interface for an addressed register bus.
///
/// All methods take `&self`; implementations serialize access with an
/// internal lock so a channel can be shared between a driver and a test
/// harness thread.
pub trait BusChannel: Send + Sync {
    /// Bind the channel to a device path. Idempotent: a second call logs a
    /// warning and changes nothing. Does not touch hardware.
    fn initialize(&self, path: &str) -> Result<()>;

    /// Whether [`initialize`](Self::initialize) has succeeded.
    fn is_initialized(&self) -> bool;

    /// Write one byte to `reg` on device `addr`.
    fn write_byte(&self, addr: u8, reg: u8, value: u8) -> Result<()>;

    /// Write `data` starting at `reg` on device `addr`.
    fn write_block(&self, addr: u8, reg: u8, data: &[u8]) -> Result<()>;

    /// Read one byte from `reg` on device `addr`.
    fn read_byte(&self, addr: u8, reg: u8) -> Result<u8>;

    /// Read `len` bytes starting at `reg` on device `addr`.
    fn read_block(&self, addr: u8, reg: u8, len: usize) -> Result<Vec<u8>>;

    /// Arm or disarm failure injection. While armed, every transfer fails
    /// with [`BusError::Simulated`] before any I/O.
    fn simulate_failure(&self, armed: bool);

    /// Preload the register map. Needs no prior initialization.
    fn set_simulated_register(&self, addr: u8, reg: u8, value: u8);

    /// Inspect the register map (0 if never written).
    fn simulated_register(&self, addr: u8, reg: u8) -> u8;
}
