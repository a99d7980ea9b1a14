//! Real I2C transfers through a [`BusDevice`].

use parking_lot::Mutex;
use tracing::{Span, debug, error, info_span};

use crate::device::{BusDevice, BusHandle, LinuxI2cDevice};
use crate::error::{BusError, Result};
use crate::state::BusState;
use crate::BusChannel;

/// I2C channel backed by a device node.
///
/// Each transfer opens the device, selects the slave, transfers and closes
/// the handle again. Successful writes are mirrored into the register map.
pub struct I2cBus<D: BusDevice = LinuxI2cDevice> {
    device: D,
    state: Mutex<BusState>,
    span: Span,
}

impl I2cBus<LinuxI2cDevice> {
    /// Channel over the Linux i2c-dev interface.
    pub fn new() -> Self {
        Self::with_device(LinuxI2cDevice)
    }
}

impl Default for I2cBus<LinuxI2cDevice> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: BusDevice> I2cBus<D> {
    /// Channel over a custom device implementation.
    pub fn with_device(device: D) -> Self {
        Self {
            device,
            state: Mutex::new(BusState::default()),
            span: info_span!("i2c"),
        }
    }

    /// Replace the logging span operations run in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Open the device, select `addr` and run `transfer` on the handle.
    ///
    /// The handle is dropped before this returns, whatever the outcome.
    fn with_handle<T>(
        &self,
        state: &BusState,
        addr: u8,
        op: &'static str,
        transfer: impl FnOnce(&mut D::Handle) -> Result<T>,
    ) -> Result<T> {
        let path = state.check_transfer(addr, op)?;

        let mut handle = self.device.open(path).map_err(|source| {
            error!("Failed to open I2C device {}: {}", path, source);
            BusError::Open {
                path: path.to_string(),
                source,
            }
        })?;

        handle.select(addr).map_err(|source| {
            error!("Failed to set I2C slave address 0x{:02X}: {}", addr, source);
            BusError::SelectAddress { addr, source }
        })?;

        transfer(&mut handle)
    }

    fn write_frame(handle: &mut D::Handle, addr: u8, reg: u8, frame: &[u8]) -> Result<()> {
        let written = handle
            .write(frame)
            .map_err(|source| BusError::Write { addr, reg, source })?;

        if written != frame.len() {
            return Err(BusError::ShortWrite {
                addr,
                expected: frame.len(),
                actual: written,
            });
        }
        Ok(())
    }

    fn transfer_write(&self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        let _enter = self.span.enter();
        let mut state = self.state.lock();

        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(data);

        let op = if data.len() == 1 { "write" } else { "block write" };
        self.with_handle(&state, addr, op, |handle| {
            Self::write_frame(handle, addr, reg, &frame)
        })
        .inspect_err(|e| error!("I2C {} failed: {}", op, e))?;

        state.mirror(addr, reg, data);
        debug!(
            "Wrote {} byte(s) to device 0x{:02X} register 0x{:02X}",
            data.len(),
            addr,
            reg
        );
        Ok(())
    }

    fn transfer_read(&self, addr: u8, reg: u8, len: usize) -> Result<Vec<u8>> {
        let _enter = self.span.enter();
        let state = self.state.lock();

        let op = if len == 1 { "read" } else { "block read" };
        let data = self
            .with_handle(&state, addr, op, |handle| {
                Self::write_frame(handle, addr, reg, &[reg])?;

                let mut buf = vec![0u8; len];
                let read = handle
                    .read(&mut buf)
                    .map_err(|source| BusError::Read { addr, reg, source })?;

                if read != len {
                    return Err(BusError::ShortRead {
                        addr,
                        expected: len,
                        actual: read,
                    });
                }
                Ok(buf)
            })
            .inspect_err(|e| error!("I2C {} failed: {}", op, e))?;

        debug!(
            "Read {} byte(s) from device 0x{:02X} register 0x{:02X}",
            len, addr, reg
        );
        Ok(data)
    }
}

impl<D: BusDevice> BusChannel for I2cBus<D> {
    fn initialize(&self, path: &str) -> Result<()> {
        let _enter = self.span.enter();
        self.state.lock().initialize(path).map(|_| ())
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().is_initialized()
    }

    fn write_byte(&self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.transfer_write(addr, reg, &[value])
    }

    fn write_block(&self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        self.transfer_write(addr, reg, data)
    }

    fn read_byte(&self, addr: u8, reg: u8) -> Result<u8> {
        let data = self.transfer_read(addr, reg, 1)?;
        Ok(data[0])
    }

    fn read_block(&self, addr: u8, reg: u8, len: usize) -> Result<Vec<u8>> {
        self.transfer_read(addr, reg, len)
    }

    fn simulate_failure(&self, armed: bool) {
        self.state.lock().set_simulate_failure(armed);
    }

    fn set_simulated_register(&self, addr: u8, reg: u8, value: u8) {
        self.state.lock().mirror(addr, reg, &[value]);
    }

    fn simulated_register(&self, addr: u8, reg: u8) -> u8 {
        self.state.lock().register(addr, reg)
    }
}
