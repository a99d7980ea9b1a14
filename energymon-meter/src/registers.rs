//! ADE7878A register map.
//!
//! Registers are 32 bits wide, big-endian on the wire, and addressed by an
//! 8-bit register pointer. Consecutive registers sit 4 pointer steps apart.

use energymon_common::LINES;

/// Width of one register in bytes.
pub const REGISTER_WIDTH: usize = 4;

/// Default I2C slave address of the chip.
pub const DEFAULT_ADDRESS: u8 = 0x38;

/// Upper 16 bits of [`DEVICE_ID`] on a genuine chip.
pub const CHIP_SIGNATURE: u16 = 0x7878;

/// Control register. Bit 7 triggers a soft reset.
pub const CONTROL: u8 = 0x00;
pub const SOFT_RESET: u32 = 0x0000_0080;

/// Measurement mode configuration.
pub const MEASUREMENT_MODE: u8 = 0x10;
pub const MEASUREMENT_MODE_VALUE: u32 = 0x0030;

/// Voltage sag detection configuration.
pub const SAG_CONFIG: u8 = 0x14;
pub const SAG_ENABLE: u32 = 0x0040;

/// Free read/write register used by the self-test.
pub const SCRATCH: u8 = 0x18;
pub const SELF_TEST_PATTERN: u32 = 0xA5A5_5A5A;

/// RMS voltage.
pub const VOLTAGE_RMS: u8 = 0x40;

/// RMS current per line.
pub const CURRENT_RMS: [u8; LINES] = [0x44, 0x48, 0x4C];

/// Active power per line.
pub const ACTIVE_POWER: [u8; LINES] = [0x50, 0x54, 0x58];

/// Reactive power per line.
pub const REACTIVE_POWER: [u8; LINES] = [0x5C, 0x60, 0x64];

/// Line frequency, in hundredths of a hertz.
pub const FREQUENCY: u8 = 0x68;

/// Identification register.
pub const DEVICE_ID: u8 = 0x7C;

/// Decode a big-endian register value.
pub fn decode(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(REGISTER_WIDTH)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

/// Encode a register value for the wire.
pub fn encode(value: u32) -> [u8; REGISTER_WIDTH] {
    value.to_be_bytes()
}

/// Whether a device ID value carries the chip signature.
pub fn is_signature(device_id: u32) -> bool {
    (device_id >> 16) as u16 == CHIP_SIGNATURE
}
