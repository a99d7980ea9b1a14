//! Acquisition, validation, caching and delivery of readings.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use energymon_common::{Error, PowerReading};
use energymon_meter::{Calibration, DeviceError, PowerDriver};
use energymon_transport::{Transport, TransportError};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::{MonitorConfig, ServerConfig, ValidationConfig};
use crate::error::MonitorError;

/// Consecutive acquisition failures that trigger a meter reset.
pub const RECOVERY_THRESHOLD: u32 = 3;

/// Monitor statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Readings obtained from the meter, valid or not.
    pub acquired: u64,
    /// Readings that failed plausibility checks.
    pub invalid: u64,
    /// Meter reads that failed.
    pub acquisition_failures: u64,
    /// Meter resets after repeated failures.
    pub recoveries: u64,
    /// Readings acknowledged by the collector.
    pub delivered: u64,
    /// Batches the collector did not accept.
    pub delivery_failures: u64,
    /// Readings dropped because the cache was full.
    pub evicted: u64,
}

/// Readings awaiting delivery, tagged with an increasing sequence number.
#[derive(Default)]
struct Cache {
    next_seq: u64,
    readings: VecDeque<(u64, PowerReading)>,
}

#[derive(Default)]
struct Counters {
    stats: MonitorStats,
    consecutive_failures: u32,
}

/// Document posted to the collector.
#[derive(Serialize)]
struct Batch<'a> {
    device: &'a str,
    readings: &'a [PowerReading],
}

/// Check a reading against plausibility limits.
pub fn validate_reading(reading: &PowerReading, limits: &ValidationConfig) -> Result<(), Error> {
    if reading.values().any(|v| !v.is_finite()) {
        return Err(Error::validation("reading contains non-finite values"));
    }

    let voltage = reading.voltage();
    if !(0.0..=limits.max_voltage).contains(&voltage) {
        return Err(Error::validation(format!(
            "voltage {:.2} V outside 0-{} V",
            voltage, limits.max_voltage
        )));
    }

    let frequency = reading.frequency();
    if !(limits.min_frequency..=limits.max_frequency).contains(&frequency) {
        return Err(Error::validation(format!(
            "frequency {:.2} Hz outside {}-{} Hz",
            frequency, limits.min_frequency, limits.max_frequency
        )));
    }

    if let Some(current) = reading.current().iter().find(|c| **c < 0.0) {
        return Err(Error::validation(format!("negative current {:.3} A", current)));
    }

    Ok(())
}

/// Drives one meter and one transport.
///
/// Readings are validated, queued in a bounded in-memory cache and posted
/// in batches of `polling.batch_size`. A batch that cannot be delivered
/// stays cached for the next cycle; when the cache is full the oldest
/// reading is dropped.
pub struct EnergyMonitor<D: PowerDriver, T: Transport> {
    driver: D,
    transport: T,
    device_id: String,
    endpoint: String,
    batch_size: usize,
    max_cache_size: usize,
    limits: ValidationConfig,
    cache: Mutex<Cache>,
    counters: Mutex<Counters>,
    span: Span,
}

impl<D: PowerDriver, T: Transport> EnergyMonitor<D, T> {
    pub fn new(driver: D, transport: T, config: &MonitorConfig) -> Self {
        Self {
            driver,
            transport,
            device_id: config.server.device_id.clone(),
            endpoint: config.server.endpoint.clone(),
            batch_size: config.polling.batch_size.max(1),
            max_cache_size: config.polling.max_cache_size.max(1),
            limits: config.validation.clone(),
            cache: Mutex::new(Cache {
                next_seq: 0,
                readings: VecDeque::with_capacity(config.polling.max_cache_size),
            }),
            counters: Mutex::new(Counters::default()),
            span: info_span!("monitor", device = %config.server.device_id),
        }
    }

    /// Replace the logging span operations run in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> MonitorStats {
        self.counters.lock().stats
    }

    /// Readings waiting for delivery.
    pub fn cached(&self) -> usize {
        self.cache.lock().readings.len()
    }

    /// Bring the meter up with `calibration`.
    pub fn initialize_driver(&self, calibration: Calibration) -> Result<(), DeviceError> {
        let _enter = self.span.enter();
        self.driver.initialize(calibration)
    }

    /// Bind the transport to the collector described by `server`.
    pub fn initialize_transport(&self, server: &ServerConfig) -> Result<(), TransportError> {
        let _enter = self.span.enter();
        self.transport.initialize(&server.url, server.timeout())?;
        self.transport.set_retry_policy(server.retry_policy());
        self.transport.set_authentication(server.api_key.clone());
        Ok(())
    }

    /// Arm or disarm failure injection on the meter and the transport.
    pub fn arm_simulation(&self, device: bool, transport: bool) {
        let _enter = self.span.enter();
        self.driver.simulate_failure(device);
        self.transport.simulate_failure(transport);
        if device || transport {
            warn!(
                "Failure simulation armed (device: {}, transport: {})",
                device, transport
            );
        }
    }

    /// Install (or clear) the reading the meter returns instead of measuring.
    pub fn set_simulated_value(&self, reading: Option<PowerReading>) {
        self.driver.set_simulation_values(reading);
    }

    /// Whether the collector answers.
    pub async fn check_collector(&self) -> bool {
        self.transport.test_connection().await
    }

    /// Read and validate one reading.
    ///
    /// After [`RECOVERY_THRESHOLD`] consecutive meter failures the meter is
    /// reset.
    pub fn acquire_reading(&self) -> Result<PowerReading, MonitorError> {
        let _enter = self.span.enter();

        let reading = match self.driver.read_power_measurements() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Failed to acquire reading: {}", e);
                if self.note_failure() {
                    self.recover();
                }
                return Err(e.into());
            }
        };

        {
            let mut counters = self.counters.lock();
            counters.consecutive_failures = 0;
            counters.stats.acquired += 1;
        }

        if let Err(e) = validate_reading(&reading, &self.limits) {
            warn!("Discarding reading: {}", e);
            self.counters.lock().stats.invalid += 1;
            return Err(e.into());
        }

        debug!(
            "Acquired reading - V: {:.2}, I: {:?}, f: {:.2}",
            reading.voltage(),
            reading.current(),
            reading.frequency()
        );
        Ok(reading)
    }

    /// Count a failure; true when recovery is due.
    fn note_failure(&self) -> bool {
        let mut counters = self.counters.lock();
        counters.stats.acquisition_failures += 1;
        counters.consecutive_failures += 1;
        if counters.consecutive_failures >= RECOVERY_THRESHOLD {
            counters.consecutive_failures = 0;
            true
        } else {
            false
        }
    }

    fn recover(&self) {
        warn!(
            "{} consecutive acquisition failures, resetting meter",
            RECOVERY_THRESHOLD
        );
        match self.driver.reset() {
            Ok(()) => {
                self.counters.lock().stats.recoveries += 1;
                info!("Meter reset");
            }
            Err(e) => error!("Meter reset failed: {}", e),
        }
    }

    /// POST a single reading to `endpoint`.
    pub async fn deliver(
        &self,
        endpoint: &str,
        reading: &PowerReading,
    ) -> Result<Value, TransportError> {
        let payload = serde_json::to_value(reading)?;
        self.transport
            .send_request(endpoint, &payload)
            .instrument(self.span.clone())
            .await
    }

    /// Queue a reading for delivery, evicting the oldest when full.
    pub fn record(&self, reading: PowerReading) {
        let mut cache = self.cache.lock();
        let seq = cache.next_seq;
        cache.next_seq += 1;
        cache.readings.push_back((seq, reading));

        if cache.readings.len() > self.max_cache_size {
            cache.readings.pop_front();
            self.counters.lock().stats.evicted += 1;
            let _enter = self.span.enter();
            warn!(
                "Reading cache full ({}), dropped oldest reading",
                self.max_cache_size
            );
        }
    }

    /// Deliver cached readings in full batches, oldest first.
    ///
    /// Stops at the first batch the collector does not accept; that batch
    /// stays cached. Returns the number of readings delivered.
    ///
    /// The cache is unlocked while a batch is in flight. Only readings up to
    /// the last one sent are removed afterwards, so readings recorded (or
    /// evicted) meanwhile are accounted for.
    pub async fn flush(&self) -> Result<usize, TransportError> {
        let mut delivered = 0;

        loop {
            let (last_seq, batch): (u64, Vec<PowerReading>) = {
                let cache = self.cache.lock();
                if cache.readings.len() < self.batch_size {
                    return Ok(delivered);
                }
                let batch: Vec<_> = cache.readings.iter().take(self.batch_size).collect();
                let last_seq = batch.last().map_or(0, |(seq, _)| *seq);
                (last_seq, batch.into_iter().map(|(_, r)| r.clone()).collect())
            };

            let payload = serde_json::to_value(Batch {
                device: &self.device_id,
                readings: &batch,
            })?;

            let result = self
                .transport
                .send_request(&self.endpoint, &payload)
                .instrument(self.span.clone())
                .await;

            match result {
                Ok(response) => {
                    let mut cache = self.cache.lock();
                    while cache.readings.front().is_some_and(|(seq, _)| *seq <= last_seq) {
                        cache.readings.pop_front();
                    }
                    let sent = batch.len();
                    self.counters.lock().stats.delivered += sent as u64;
                    delivered += sent;
                    debug!(parent: &self.span, "Delivered {} reading(s): {}", sent, response);
                }
                Err(e) => {
                    self.counters.lock().stats.delivery_failures += 1;
                    warn!(
                        parent: &self.span,
                        "Delivery failed, {} reading(s) kept for retry: {}",
                        self.cached(),
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

impl<D, T> EnergyMonitor<D, T>
where
    D: PowerDriver + 'static,
    T: Transport + 'static,
{
    /// One acquisition and delivery cycle.
    pub async fn poll_once(self: &Arc<Self>) -> Result<(), MonitorError> {
        let monitor = Arc::clone(self);
        let reading = tokio::task::spawn_blocking(move || monitor.acquire_reading())
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))??;

        self.record(reading);
        self.flush().await?;
        Ok(())
    }

    /// Poll every `interval` until `shutdown` completes.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            parent: &self.span,
            "Starting acquisition loop (interval: {:?})", interval
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(parent: &self.span, "Received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        debug!(parent: &self.span, "Cycle ended early: {}", e);
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            parent: &self.span,
            "Acquisition loop stopped - acquired: {}, invalid: {}, failures: {}, recoveries: {}, delivered: {}, delivery failures: {}, evicted: {}, pending: {}",
            stats.acquired,
            stats.invalid,
            stats.acquisition_failures,
            stats.recoveries,
            stats.delivered,
            stats.delivery_failures,
            stats.evicted,
            self.cached()
        );
    }
}
