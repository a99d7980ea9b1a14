//! Error types for the metering driver.

use energymon_bus::BusError;
use thiserror::Error;

/// Result type alias using [`DeviceError`].
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors raised by a [`PowerDriver`](crate::PowerDriver).
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The driver has not completed initialization.
    #[error("Device not initialized")]
    NotInitialized,

    /// The bus channel handed to the driver is not ready for transfers.
    #[error("I2C interface not ready")]
    BusNotReady,

    /// The identification register did not carry the chip signature.
    #[error("Device ID verification failed: found 0x{found:08X}")]
    IdentificationMismatch { found: u32 },

    /// The scratch register did not read back the pattern written to it.
    #[error("Self-test failed: wrote 0x{expected:08X}, read back 0x{found:08X}")]
    SelfTestFailed { expected: u32, found: u32 },

    /// Failure injected through `simulate_failure`.
    #[error("Simulated read failure")]
    Simulated,

    /// A register transfer failed.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The initialization sequence failed; the driver stays uninitialized.
    #[error("Initialization failed: {source}")]
    Initialization {
        #[source]
        source: Box<DeviceError>,
    },
}

impl DeviceError {
    /// Wrap `self` as the cause of a failed initialization.
    pub fn initialization(source: DeviceError) -> Self {
        DeviceError::Initialization {
            source: Box::new(source),
        }
    }
}
