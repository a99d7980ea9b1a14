//! State shared by the real and simulated channels.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{BusError, Result};
use crate::is_valid_address;

/// Everything a channel guards with its lock.
#[derive(Debug, Default)]
pub(crate) struct BusState {
    path: Option<String>,
    simulate_failure: bool,
    registers: HashMap<(u8, u8), u8>,
}

impl BusState {
    /// Bind to `path` once. Returns `false` if already initialized.
    pub(crate) fn initialize(&mut self, path: &str) -> Result<bool> {
        if let Some(current) = &self.path {
            warn!(path = %current, "I2C interface already initialized");
            return Ok(false);
        }

        if path.trim().is_empty() {
            return Err(BusError::InvalidPath(path.to_string()));
        }

        self.path = Some(path.to_string());
        info!(path = %path, "I2C interface initialized");
        Ok(true)
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.path.is_some()
    }

    /// Preconditions of every transfer, in order: initialized, valid address,
    /// failure not armed. Returns the device path.
    pub(crate) fn check_transfer(&self, addr: u8, op: &'static str) -> Result<&str> {
        let path = self.path.as_deref().ok_or(BusError::NotInitialized)?;

        if !is_valid_address(addr) {
            return Err(BusError::InvalidAddress(addr));
        }

        if self.simulate_failure {
            warn!("Simulated I2C {} failure (addr 0x{:02X})", op, addr);
            return Err(BusError::Simulated(op));
        }

        Ok(path)
    }

    pub(crate) fn set_simulate_failure(&mut self, armed: bool) {
        self.simulate_failure = armed;
    }

    /// Record `data` at consecutive registers starting at `reg`.
    pub(crate) fn mirror(&mut self, addr: u8, reg: u8, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            let reg = reg.wrapping_add(offset as u8);
            self.registers.insert((addr, reg), *byte);
        }
    }

    pub(crate) fn register(&self, addr: u8, reg: u8) -> u8 {
        self.registers.get(&(addr, reg)).copied().unwrap_or(0)
    }

    pub(crate) fn registers(&self, addr: u8, reg: u8, len: usize) -> Vec<u8> {
        (0..len)
            .map(|offset| self.register(addr, reg.wrapping_add(offset as u8)))
            .collect()
    }
}
