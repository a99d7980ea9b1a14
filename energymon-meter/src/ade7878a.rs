//! ADE7878A driver over a bus channel.

use std::sync::Arc;

use energymon_bus::BusChannel;
use energymon_common::{LINES, PowerReading, current_timestamp_secs};
use parking_lot::Mutex;
use tracing::{Span, debug, error, info, info_span, warn};

use crate::calibration::{Calibration, convert, frequency_hz};
use crate::error::{DeviceError, Result};
use crate::registers::{self, REGISTER_WIDTH};
use crate::{DriverState, PowerDriver};

struct Inner {
    state: DriverState,
    calibration: Calibration,
    simulate_failure: bool,
    simulated: Option<PowerReading>,
}

/// Driver for an ADE7878A on a shared bus channel.
///
/// The driver lock is held for the whole of every operation, so register
/// sequences never interleave. The channel takes its own lock inside each
/// transfer; the order is always driver then channel.
pub struct Ade7878a<B: BusChannel> {
    bus: Arc<B>,
    address: u8,
    inner: Mutex<Inner>,
    span: Span,
}

impl<B: BusChannel> Ade7878a<B> {
    /// Driver for the chip at the default address.
    pub fn new(bus: Arc<B>) -> Self {
        Self::with_address(bus, registers::DEFAULT_ADDRESS)
    }

    /// Driver for the chip at `address`.
    pub fn with_address(bus: Arc<B>, address: u8) -> Self {
        Self {
            bus,
            address,
            inner: Mutex::new(Inner {
                state: DriverState::Uninitialized,
                calibration: Calibration::default(),
                simulate_failure: false,
                simulated: None,
            }),
            span: info_span!("ade7878a", addr = address),
        }
    }

    /// Replace the logging span operations run in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn state(&self) -> DriverState {
        self.inner.lock().state
    }

    fn read_register(&self, reg: u8) -> Result<u32> {
        let bytes = self.bus.read_block(self.address, reg, REGISTER_WIDTH)?;
        Ok(registers::decode(&bytes))
    }

    fn write_register(&self, reg: u8, value: u32) -> Result<()> {
        self.bus
            .write_block(self.address, reg, &registers::encode(value))?;
        Ok(())
    }

    fn verify_signature(&self) -> Result<()> {
        let found = self.read_register(registers::DEVICE_ID)?;
        if !registers::is_signature(found) {
            return Err(DeviceError::IdentificationMismatch { found });
        }
        Ok(())
    }

    fn soft_reset(&self) -> Result<()> {
        self.write_register(registers::CONTROL, registers::SOFT_RESET)?;
        debug!("Soft reset issued");
        Ok(())
    }

    fn self_test(&self) -> Result<()> {
        self.write_register(registers::SCRATCH, registers::SELF_TEST_PATTERN)?;
        let found = self.read_register(registers::SCRATCH)?;
        if found != registers::SELF_TEST_PATTERN {
            return Err(DeviceError::SelfTestFailed {
                expected: registers::SELF_TEST_PATTERN,
                found,
            });
        }
        self.verify_signature()
    }

    fn bring_up(&self) -> Result<()> {
        self.soft_reset()?;
        self.verify_signature()?;
        self.write_register(
            registers::MEASUREMENT_MODE,
            registers::MEASUREMENT_MODE_VALUE,
        )?;
        self.write_register(registers::SAG_CONFIG, registers::SAG_ENABLE)?;
        Ok(())
    }

    fn read_lines(&self, regs: [u8; LINES], calibration: &Calibration) -> Result<[f64; LINES]> {
        let mut values = [0.0; LINES];
        for (line, reg) in regs.into_iter().enumerate() {
            values[line] = convert(self.read_register(reg)?, calibration.factor(line));
        }
        Ok(values)
    }

    fn acquire(&self, calibration: &Calibration) -> Result<PowerReading> {
        let timestamp = current_timestamp_secs();

        let voltage = convert(self.read_register(registers::VOLTAGE_RMS)?, 1.0);
        let current = self.read_lines(registers::CURRENT_RMS, calibration)?;
        let active = self.read_lines(registers::ACTIVE_POWER, calibration)?;
        let reactive = self.read_lines(registers::REACTIVE_POWER, calibration)?;
        let frequency = frequency_hz(self.read_register(registers::FREQUENCY)?);

        Ok(PowerReading::new(
            voltage, current, active, reactive, frequency, timestamp,
        ))
    }
}

impl<B: BusChannel> PowerDriver for Ade7878a<B> {
    fn initialize(&self, calibration: Calibration) -> Result<()> {
        let _enter = self.span.enter();
        let mut inner = self.inner.lock();

        if inner.state == DriverState::Ready {
            warn!("ADE7878A already initialized");
            return Ok(());
        }

        if !self.bus.is_initialized() {
            error!("Invalid I2C interface provided");
            return Err(DeviceError::BusNotReady);
        }

        inner.state = DriverState::Initializing;
        match self.bring_up() {
            Ok(()) => {
                inner.calibration = calibration;
                inner.state = DriverState::Ready;
                info!(
                    "ADE7878A initialized (calibration {:?})",
                    calibration.factors()
                );
                Ok(())
            }
            Err(e) => {
                inner.state = DriverState::Uninitialized;
                error!("ADE7878A initialization failed: {}", e);
                Err(DeviceError::initialization(e))
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.inner.lock().state == DriverState::Ready
    }

    fn read_power_measurements(&self) -> Result<PowerReading> {
        let _enter = self.span.enter();
        let inner = self.inner.lock();

        if inner.state != DriverState::Ready {
            error!("ADE7878A not initialized");
            return Err(DeviceError::NotInitialized);
        }

        if inner.simulate_failure {
            warn!("Simulated ADE7878A read failure");
            return Err(DeviceError::Simulated);
        }

        if let Some(reading) = &inner.simulated {
            debug!("Returning simulated reading");
            return Ok(reading.with_timestamp(current_timestamp_secs()));
        }

        let reading = self
            .acquire(&inner.calibration)
            .inspect_err(|e| error!("Failed to read power measurements: {}", e))?;

        debug!(
            "Read power measurements - V: {:.2}, I: {:?}",
            reading.voltage(),
            reading.current()
        );
        Ok(reading)
    }

    fn reset(&self) -> Result<()> {
        let _enter = self.span.enter();
        let _inner = self.inner.lock();

        if !self.bus.is_initialized() {
            return Err(DeviceError::BusNotReady);
        }
        self.soft_reset()
            .inspect_err(|e| error!("ADE7878A reset failed: {}", e))?;
        info!("ADE7878A reset");
        Ok(())
    }

    fn perform_self_test(&self) -> Result<()> {
        let _enter = self.span.enter();
        let _inner = self.inner.lock();

        if !self.bus.is_initialized() {
            return Err(DeviceError::BusNotReady);
        }
        self.self_test()
            .inspect_err(|e| error!("ADE7878A self-test failed: {}", e))?;
        info!("ADE7878A self-test passed");
        Ok(())
    }

    fn simulate_failure(&self, armed: bool) {
        self.inner.lock().simulate_failure = armed;
    }

    fn set_simulation_values(&self, reading: Option<PowerReading>) {
        self.inner.lock().simulated = reading;
        debug!("Set ADE7878A simulated values");
    }
}
