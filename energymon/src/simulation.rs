//! Register image of a healthy chip, for running without hardware.

use energymon_bus::BusChannel;
use energymon_meter::registers;

/// Raw register contents: 230 V, 50 Hz, three unevenly loaded lines.
const CHIP_IMAGE: &[(u8, u32)] = &[
    (registers::DEVICE_ID, 0x7878_0001),
    (registers::VOLTAGE_RMS, 230),
    (registers::CURRENT_RMS[0], 5),
    (registers::CURRENT_RMS[1], 3),
    (registers::CURRENT_RMS[2], 1),
    (registers::ACTIVE_POWER[0], 1100),
    (registers::ACTIVE_POWER[1], 650),
    (registers::ACTIVE_POWER[2], 200),
    (registers::REACTIVE_POWER[0], 200),
    (registers::REACTIVE_POWER[1], 120),
    (registers::REACTIVE_POWER[2], 40),
    (registers::FREQUENCY, 5000),
];

/// Preload `bus` so the chip at `addr` identifies and measures.
pub fn load_chip_image(bus: &impl BusChannel, addr: u8) {
    for (reg, value) in CHIP_IMAGE {
        for (offset, byte) in registers::encode(*value).into_iter().enumerate() {
            bus.set_simulated_register(addr, reg.wrapping_add(offset as u8), byte);
        }
    }
}
