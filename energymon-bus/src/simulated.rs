//! In-memory register map standing in for a bus and its devices.

use parking_lot::Mutex;
use tracing::{Span, debug, info_span};

use crate::error::Result;
use crate::state::BusState;
use crate::BusChannel;

/// A channel with no hardware behind it.
///
/// Writes land in the register map, reads return what is stored there
/// (0 for registers never written). Preconditions and failure injection
/// behave exactly as on [`I2cBus`](crate::I2cBus).
pub struct SimulatedBus {
    state: Mutex<BusState>,
    span: Span,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            span: info_span!("i2c", simulated = true),
        }
    }

    /// Replace the logging span operations run in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Preload a run of consecutive registers.
    pub fn load_registers(&self, addr: u8, reg: u8, data: &[u8]) {
        self.state.lock().mirror(addr, reg, data);
    }

    fn write(&self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        let _enter = self.span.enter();
        let mut state = self.state.lock();
        let op = if data.len() == 1 { "write" } else { "block write" };
        state.check_transfer(addr, op)?;

        state.mirror(addr, reg, data);
        debug!(
            "Simulated write of {} byte(s) to device 0x{:02X} register 0x{:02X}",
            data.len(),
            addr,
            reg
        );
        Ok(())
    }

    fn read(&self, addr: u8, reg: u8, len: usize) -> Result<Vec<u8>> {
        let _enter = self.span.enter();
        let state = self.state.lock();
        let op = if len == 1 { "read" } else { "block read" };
        state.check_transfer(addr, op)?;

        debug!(
            "Simulated read of {} byte(s) from device 0x{:02X} register 0x{:02X}",
            len, addr, reg
        );
        Ok(state.registers(addr, reg, len))
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusChannel for SimulatedBus {
    fn initialize(&self, path: &str) -> Result<()> {
        let _enter = self.span.enter();
        self.state.lock().initialize(path).map(|_| ())
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().is_initialized()
    }

    fn write_byte(&self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.write(addr, reg, &[value])
    }

    fn write_block(&self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        self.write(addr, reg, data)
    }

    fn read_byte(&self, addr: u8, reg: u8) -> Result<u8> {
        let _enter = self.span.enter();
        let state = self.state.lock();
        state.check_transfer(addr, "read")?;
        Ok(state.register(addr, reg))
    }

    fn read_block(&self, addr: u8, reg: u8, len: usize) -> Result<Vec<u8>> {
        self.read(addr, reg, len)
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
