//! Access to the underlying bus device.
//!
//! A [`BusDevice`] opens a fresh [`BusHandle`] for every transfer. Handles
//! close when dropped, so a transfer that fails half-way still releases its
//! file descriptor.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};

/// Something that can open handles on a bus device path.
pub trait BusDevice: Send + Sync {
    /// Handle type; dropping it releases the device.
    type Handle: BusHandle;

    /// Open the device at `path` for reading and writing.
    fn open(&self, path: &str) -> io::Result<Self::Handle>;
}

/// An open bus device.
pub trait BusHandle {
    /// Select the 7-bit slave address for subsequent transfers.
    fn select(&mut self, addr: u8) -> io::Result<()>;

    /// Write bytes to the selected slave. Returns the count written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read bytes from the selected slave. Returns the count read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Linux i2c-dev character device (`/dev/i2c-N`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxI2cDevice;

/// Open `/dev/i2c-N` file.
#[derive(Debug)]
pub struct LinuxI2cHandle {
    file: File,
}

impl BusDevice for LinuxI2cDevice {
    type Handle = LinuxI2cHandle;

    fn open(&self, path: &str) -> io::Result<Self::Handle> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(LinuxI2cHandle { file })
    }
}

impl BusHandle for LinuxI2cHandle {
    #[cfg(target_os = "linux")]
    fn select(&mut self, addr: u8) -> io::Result<()> {
        use std::os::fd::AsRawFd;

        // From <linux/i2c-dev.h>.
        const I2C_SLAVE: libc::c_ulong = 0x0703;

        // SAFETY: the descriptor is owned by `self.file` and open for the
        // duration of the call; I2C_SLAVE takes the address by value.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(addr),
            )
        };

        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn select(&mut self, _addr: u8) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "I2C slave selection requires Linux i2c-dev",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}
