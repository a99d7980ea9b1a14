use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of monitored lines (phases / appliances).
pub const LINES: usize = 3;

/// An immutable snapshot of one power measurement cycle.
///
/// Apparent power is derived from the active/reactive pair in every
/// constructor, including deserialization, so it can never disagree with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ReadingFields")]
pub struct PowerReading {
    voltage: f64,
    current: [f64; LINES],
    active_power: [f64; LINES],
    reactive_power: [f64; LINES],
    apparent_power: [f64; LINES],
    frequency: f64,
    /// Unix epoch seconds, captured before the first register was read.
    timestamp: u64,
}

/// Wire form accepted on deserialization. Any apparent power present in the
/// document is ignored.
#[derive(Deserialize)]
struct ReadingFields {
    voltage: f64,
    current: [f64; LINES],
    active_power: [f64; LINES],
    reactive_power: [f64; LINES],
    frequency: f64,
    timestamp: u64,
}

impl From<ReadingFields> for PowerReading {
    fn from(f: ReadingFields) -> Self {
        PowerReading::new(
            f.voltage,
            f.current,
            f.active_power,
            f.reactive_power,
            f.frequency,
            f.timestamp,
        )
    }
}

impl PowerReading {
    /// Build a reading, deriving apparent power per line.
    pub fn new(
        voltage: f64,
        current: [f64; LINES],
        active_power: [f64; LINES],
        reactive_power: [f64; LINES],
        frequency: f64,
        timestamp: u64,
    ) -> Self {
        let apparent_power =
            std::array::from_fn(|i| apparent_power(active_power[i], reactive_power[i]));

        Self {
            voltage,
            current,
            active_power,
            reactive_power,
            apparent_power,
            frequency,
            timestamp,
        }
    }

    /// Copy of this reading with a new capture timestamp.
    pub fn with_timestamp(&self, timestamp: u64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn current(&self) -> [f64; LINES] {
        self.current
    }

    pub fn active_power(&self) -> [f64; LINES] {
        self.active_power
    }

    pub fn reactive_power(&self) -> [f64; LINES] {
        self.reactive_power
    }

    pub fn apparent_power(&self) -> [f64; LINES] {
        self.apparent_power
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Iterate over every numeric field, for validation.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::once(self.voltage)
            .chain(self.current)
            .chain(self.active_power)
            .chain(self.reactive_power)
            .chain(self.apparent_power)
            .chain(std::iter::once(self.frequency))
    }
}

/// Apparent power of one line: `sqrt(active² + reactive²)`.
pub fn apparent_power(active: f64, reactive: f64) -> f64 {
    (active * active + reactive * reactive).sqrt()
}

/// Get the current timestamp in seconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
