//! Register map and protocol constants for the PB7200P80.
//!
//! This module defines the fixed register address space of the chip, the
//! fixed-point scales of its measurement registers, the status/fault bit
//! assignments and the default timing parameters used during start-up.

use crate::types::Threshold;

/// Default 7-bit I2C bus address
pub const DEFAULT_I2C_ADDRESS: u8 = 0x55;

/// Default number of series cells assumed by [`crate::AfeConfig`]
pub const DEFAULT_CELL_COUNT: u8 = 4;

/// Maximum number of series cells the chip can monitor
pub const MAX_CELLS: usize = 20;

/// Number of temperature sensor inputs (fixed, independent of cell count)
pub const MAX_TEMP_SENSORS: usize = 8;

/// Number of balancing control registers (8 + 8 + 4 bits used)
pub const BALANCE_REGISTER_COUNT: usize = 3;

/// Device identity register
pub const REG_DEVICE_ID: u8 = 0x00;

/// Status register (balancing / charging / ready bits)
pub const REG_STATUS: u8 = 0x01;

/// Fault latch register (OVP / UVP / OCP / OTP / UTP bits)
pub const REG_FAULT_STATUS: u8 = 0x02;

/// First cell voltage register, two bytes per cell (0x10..=0x37)
pub const REG_CELL_VOLTAGE_BASE: u8 = 0x10;

/// First temperature register, two bytes per sensor (0x38..=0x47)
///
/// The Arduino `PB7200P80.h` header puts this block at 0x30, inside the cell block
/// of a 20-cell pack. It sits directly after the last cell pair here.
pub const REG_TEMP_BASE: u8 = 0x38;

/// Pack current, high byte
///
/// 0x40 in the Arduino `PB7200P80.h` header, moved to follow the relocated
/// temperature block.
pub const REG_CURRENT_H: u8 = 0x48;

/// Pack current, low byte
pub const REG_CURRENT_L: u8 = 0x49;

/// Balancing control, cells 0-7
pub const REG_BALANCE_CTRL1: u8 = 0x50;

/// Balancing control, cells 8-15
pub const REG_BALANCE_CTRL2: u8 = 0x51;

/// Balancing control, cells 16-19
pub const REG_BALANCE_CTRL3: u8 = 0x52;

/// Over voltage protection threshold pair
///
/// The Arduino `PB7200P80.h` header numbers the five thresholds 0x60..=0x64, one
/// byte apart, so their 16-bit pairs would overlap. Each pair gets two
/// addresses here: OVP 0x60, UVP 0x62, OCP 0x64, OTP 0x66, UTP 0x68.
pub const REG_CONFIG_OVP: u8 = 0x60;

/// Under voltage protection threshold pair (0x61 in the Arduino header)
pub const REG_CONFIG_UVP: u8 = 0x62;

/// Over current protection threshold pair (0x62 in the Arduino header)
pub const REG_CONFIG_OCP: u8 = 0x64;

/// Over temperature protection threshold pair (0x63 in the Arduino header)
pub const REG_CONFIG_OTP: u8 = 0x66;

/// Under temperature protection threshold pair (0x64 in the Arduino header)
pub const REG_CONFIG_UTP: u8 = 0x68;

/// Control / mode register
pub const REG_CONTROL: u8 = 0x70;

/// ADC control register
pub const REG_ADC_CTRL: u8 = 0x71;

/// Shutdown register
pub const REG_SHUTDOWN: u8 = 0x72;

/// Cell voltage scale: 1 mV per bit
pub const VOLTAGE_LSB: f64 = 0.001;

/// Current scale: 10 mA per bit
pub const CURRENT_LSB: f64 = 0.01;

/// Temperature scale: 0.1 °C per bit
pub const TEMP_LSB: f64 = 0.1;

/// Identity values the chip never reports; reading one means nothing answered
pub const RESERVED_DEVICE_IDS: [u8; 2] = [0x00, 0xFF];

/// Control value written during start-up: normal mode, ADC enabled
pub const CONTROL_NORMAL_ADC_ON: u8 = 0x01;

/// Control bit enabling autonomous balancing
pub const CONTROL_AUTO_BALANCE: u8 = 0x10;

/// Control bit requesting a device reset
pub const CONTROL_RESET: u8 = 0x80;

/// Control bits holding the operating mode
pub const CONTROL_MODE_MASK: u8 = 0x03;

/// Value written to the shutdown register to power the chip down
pub const SHUTDOWN_COMMAND: u8 = 0x01;

/// Settling time before the first identity probe
pub const STARTUP_SETTLE_MS: u64 = 100;

/// Settling time after enabling the ADC, before the first reading
pub const CONTROL_SETTLE_MS: u64 = 50;

/// Time the chip needs after a reset command
pub const RESET_SETTLE_MS: u64 = 100;

/// Sentinel seed for the cell minimum; any real cell reads below it
pub const MIN_CELL_VOLTAGE_SEED: f64 = 5.0;

/// Seed for the temperature maximum
pub const MAX_TEMP_SEED: f64 = -100.0;

/// Seed for the temperature minimum
pub const MIN_TEMP_SEED: f64 = 200.0;

/// Sensors at or below this reading are treated as absent for the minimum
pub const MIN_TEMP_FLOOR: f64 = -50.0;

/// A contiguous block of registers in the address map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRange {
    pub name: &'static str,
    pub base: u8,
    pub len: u8,
}

impl RegisterRange {
    /// Last address covered by this block.
    pub const fn last(&self) -> u8 {
        self.base + self.len - 1
    }

    /// Whether `address` falls inside this block.
    pub const fn contains(&self, address: u8) -> bool {
        address >= self.base && address <= self.last()
    }
}

/// Static address map of the chip, in ascending address order.
pub static REGISTER_MAP: [RegisterRange; 11] = [
    RegisterRange { name: "device_id", base: REG_DEVICE_ID, len: 1 },
    RegisterRange { name: "status", base: REG_STATUS, len: 1 },
    RegisterRange { name: "fault_status", base: REG_FAULT_STATUS, len: 1 },
    RegisterRange { name: "cell_voltage", base: REG_CELL_VOLTAGE_BASE, len: (MAX_CELLS * 2) as u8 },
    RegisterRange { name: "temperature", base: REG_TEMP_BASE, len: (MAX_TEMP_SENSORS * 2) as u8 },
    RegisterRange { name: "current", base: REG_CURRENT_H, len: 2 },
    RegisterRange { name: "balance_ctrl", base: REG_BALANCE_CTRL1, len: BALANCE_REGISTER_COUNT as u8 },
    RegisterRange { name: "protection", base: REG_CONFIG_OVP, len: 10 },
    RegisterRange { name: "control", base: REG_CONTROL, len: 1 },
    RegisterRange { name: "adc_ctrl", base: REG_ADC_CTRL, len: 1 },
    RegisterRange { name: "shutdown", base: REG_SHUTDOWN, len: 1 },
];

/// Look up the block an address belongs to.
pub fn register_range(address: u8) -> Option<&'static RegisterRange> {
    REGISTER_MAP.iter().find(|range| range.contains(address))
}

/// High-byte address of cell `index`'s voltage pair.
pub const fn cell_voltage_register(index: u8) -> u8 {
    REG_CELL_VOLTAGE_BASE + index * 2
}

/// High-byte address of sensor `index`'s temperature pair.
pub const fn temperature_register(index: u8) -> u8 {
    REG_TEMP_BASE + index * 2
}

/// Balancing control register and bit position for cell `index`.
pub const fn balance_bit(index: u8) -> (u8, u8) {
    (REG_BALANCE_CTRL1 + index / 8, index % 8)
}

/// High-byte address of a protection threshold pair.
pub const fn threshold_register(threshold: Threshold) -> u8 {
    match threshold {
        Threshold::OverVoltage => REG_CONFIG_OVP,
        Threshold::UnderVoltage => REG_CONFIG_UVP,
        Threshold::OverCurrent => REG_CONFIG_OCP,
        Threshold::OverTemperature => REG_CONFIG_OTP,
        Threshold::UnderTemperature => REG_CONFIG_UTP,
    }
}
