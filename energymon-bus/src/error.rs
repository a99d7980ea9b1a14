//! Error types for bus transfers.

use thiserror::Error;

/// Result type alias using [`BusError`].
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors raised by a [`BusChannel`](crate::BusChannel).
#[derive(Error, Debug)]
pub enum BusError {
    /// The channel has not been initialized with a device path.
    #[error("I2C interface not initialized")]
    NotInitialized,

    /// The device path passed to `initialize` was empty.
    #[error("Invalid I2C device path: {0:?}")]
    InvalidPath(String),

    /// Device address outside the non-reserved 7-bit range.
    #[error("Invalid I2C address: 0x{0:02X} (allowed 0x03-0x77)")]
    InvalidAddress(u8),

    /// Failure injected through `simulate_failure`.
    #[error("Simulated {0} failure")]
    Simulated(&'static str),

    /// The bus device could not be opened.
    #[error("Failed to open I2C device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The slave address could not be selected.
    #[error("Failed to set I2C slave address 0x{addr:02X}: {source}")]
    SelectAddress {
        addr: u8,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the device failed.
    #[error("Failed to write to I2C device 0x{addr:02X} register 0x{reg:02X}: {source}")]
    Write {
        addr: u8,
        reg: u8,
        #[source]
        source: std::io::Error,
    },

    /// Reading from the device failed.
    #[error("Failed to read from I2C device 0x{addr:02X} register 0x{reg:02X}: {source}")]
    Read {
        addr: u8,
        reg: u8,
        #[source]
        source: std::io::Error,
    },

    /// Fewer bytes were written than requested.
    #[error("Short write to I2C device 0x{addr:02X}: {actual} of {expected} bytes")]
    ShortWrite {
        addr: u8,
        expected: usize,
        actual: usize,
    },

    /// Fewer bytes were read than requested.
    #[error("Short read from I2C device 0x{addr:02X}: {actual} of {expected} bytes")]
    ShortRead {
        addr: u8,
        expected: usize,
        actual: usize,
    },
}
