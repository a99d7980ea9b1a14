//! A metering driver with no hardware behind it.

use energymon_common::{PowerReading, current_timestamp_secs};
use parking_lot::Mutex;
use tracing::{Span, debug, info, info_span, warn};

use crate::calibration::Calibration;
use crate::error::{DeviceError, Result};
use crate::{DriverState, PowerDriver};

#[derive(Default)]
struct Inner {
    state: DriverState,
    calibration: Calibration,
    simulate_failure: bool,
    simulated: Option<PowerReading>,
}

/// Simulated meter returning canned or nominal readings.
pub struct SimulatedMeter {
    inner: Mutex<Inner>,
    span: Span,
}

impl SimulatedMeter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            span: info_span!("ade7878a", simulated = true),
        }
    }

    /// Replace the logging span operations run in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Nominal 230 V / 50 Hz reading scaled by the calibration factors.
    fn nominal(calibration: &Calibration, timestamp: u64) -> PowerReading {
        let factors = calibration.factors();
        PowerReading::new(
            230.0,
            factors.map(|f| 5.0 * f),
            factors.map(|f| 1100.0 * f),
            factors.map(|f| 200.0 * f),
            50.0,
            timestamp,
        )
    }
}

impl Default for SimulatedMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerDriver for SimulatedMeter {
    fn initialize(&self, calibration: Calibration) -> Result<()> {
        let _enter = self.span.enter();
        let mut inner = self.inner.lock();

        if inner.state == DriverState::Ready {
            warn!("ADE7878A already initialized");
            return Ok(());
        }

        inner.calibration = calibration;
        inner.state = DriverState::Ready;
        info!("Simulated ADE7878A initialized");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.inner.lock().state == DriverState::Ready
    }

    fn read_power_measurements(&self) -> Result<PowerReading> {
        let _enter = self.span.enter();
        let inner = self.inner.lock();

        if inner.state != DriverState::Ready {
            return Err(DeviceError::NotInitialized);
        }

        if inner.simulate_failure {
            warn!("Simulated ADE7878A read failure");
            return Err(DeviceError::Simulated);
        }

        let timestamp = current_timestamp_secs();
        let reading = match &inner.simulated {
            Some(reading) => reading.with_timestamp(timestamp),
            None => Self::nominal(&inner.calibration, timestamp),
        };
        debug!("Simulated reading - V: {:.2}", reading.voltage());
        Ok(reading)
    }

    fn reset(&self) -> Result<()> {
        let _enter = self.span.enter();
        debug!("Simulated ADE7878A reset");
        Ok(())
    }

    fn perform_self_test(&self) -> Result<()> {
        let _enter = self.span.enter();
        debug!("Simulated ADE7878A self-test passed");
        Ok(())
    }

    fn simulate_failure(&self, armed: bool) {
        self.inner.lock().simulate_failure = armed;
    }

    fn set_simulation_values(&self, reading: Option<PowerReading>) {
        self.inner.lock().simulated = reading;
    }
}
