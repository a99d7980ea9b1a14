//! Raw register value to physical unit conversion.

use energymon_common::LINES;

/// Per-line calibration factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration([f64; LINES]);

impl Calibration {
    pub fn new(factors: [f64; LINES]) -> Self {
        Self(factors)
    }

    /// Factor for one line (0-based).
    pub fn factor(&self, line: usize) -> f64 {
        self.0[line]
    }

    pub fn factors(&self) -> [f64; LINES] {
        self.0
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self([1.0; LINES])
    }
}

impl From<[f64; LINES]> for Calibration {
    fn from(factors: [f64; LINES]) -> Self {
        Self(factors)
    }
}

/// Scale a raw register value by a calibration factor.
pub fn convert(raw: u32, factor: f64) -> f64 {
    f64::from(raw) * factor
}

/// Frequency register value in hertz.
pub fn frequency_hz(raw: u32) -> f64 {
    f64::from(raw) / 100.0
}
