//! Conversion between raw register pairs and physical quantities.
//!
//! Every measurement register on the chip is a 16-bit big-endian pair with a
//! fixed scale. Encoding truncates toward zero, matching the fixed-point
//! format of the chip; values outside the register range saturate.

use crate::constants::{CURRENT_LSB, TEMP_LSB, VOLTAGE_LSB};
use crate::types::Threshold;

/// Physical quantity carried by a register pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Volts, unsigned, 1 mV/LSB
    Voltage,
    /// Amperes, signed, 10 mA/LSB, positive = charging
    Current,
    /// Degrees Celsius, signed, 0.1 °C/LSB
    Temperature,
}

impl Domain {
    /// Value of one least significant bit.
    pub const fn lsb(self) -> f64 {
        match self {
            Domain::Voltage => VOLTAGE_LSB,
            Domain::Current => CURRENT_LSB,
            Domain::Temperature => TEMP_LSB,
        }
    }

    /// Whether the register pair is two's complement.
    pub const fn is_signed(self) -> bool {
        !matches!(self, Domain::Voltage)
    }
}

impl From<Threshold> for Domain {
    fn from(threshold: Threshold) -> Self {
        match threshold {
            Threshold::OverVoltage | Threshold::UnderVoltage => Domain::Voltage,
            Threshold::OverCurrent => Domain::Current,
            Threshold::OverTemperature | Threshold::UnderTemperature => Domain::Temperature,
        }
    }
}

/// Encode a physical value into its big-endian register pair.
pub fn encode(value: f64, domain: Domain) -> [u8; 2] {
    let scaled = value / domain.lsb();
    if domain.is_signed() {
        (scaled as i16).to_be_bytes()
    } else {
        (scaled as u16).to_be_bytes()
    }
}

/// Decode a big-endian register pair into its physical value.
pub fn decode(raw: [u8; 2], domain: Domain) -> f64 {
    if domain.is_signed() {
        f64::from(i16::from_be_bytes(raw)) * domain.lsb()
    } else {
        f64::from(u16::from_be_bytes(raw)) * domain.lsb()
    }
}

/// Raw cell voltage to volts.
pub fn raw_to_voltage(raw: u16) -> f64 {
    f64::from(raw) * VOLTAGE_LSB
}

/// Volts to raw, truncating.
pub fn voltage_to_raw(volts: f64) -> u16 {
    (volts / VOLTAGE_LSB) as u16
}

/// Raw current to amperes.
pub fn raw_to_current(raw: i16) -> f64 {
    f64::from(raw) * CURRENT_LSB
}

/// Amperes to raw, truncating.
pub fn current_to_raw(amps: f64) -> i16 {
    (amps / CURRENT_LSB) as i16
}

/// Raw temperature to degrees Celsius.
pub fn raw_to_temperature(raw: i16) -> f64 {
    f64::from(raw) * TEMP_LSB
}

/// Degrees Celsius to raw, truncating.
pub fn temperature_to_raw(celsius: f64) -> i16 {
    (celsius / TEMP_LSB) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_round_trip_within_one_lsb() {
        for raw in 0..=u16::MAX {
            let bytes = raw.to_be_bytes();
            let back = u16::from_be_bytes(encode(decode(bytes, Domain::Voltage), Domain::Voltage));
            assert!(raw.abs_diff(back) <= 1, "raw {} came back as {}", raw, back);
        }
    }

    #[test]
    fn signed_domains_round_trip_within_one_lsb() {
        for domain in [Domain::Current, Domain::Temperature] {
            for raw in i16::MIN..=i16::MAX {
                let back = i16::from_be_bytes(encode(decode(raw.to_be_bytes(), domain), domain));
                assert!((i32::from(raw) - i32::from(back)).abs() <= 1, "{:?}: {} -> {}", domain, raw, back);
            }
        }
    }

    #[test]
    fn pairs_are_big_endian() {
        assert_eq!(encode(4.2, Domain::Voltage), [0x10, 0x68]);
        assert_eq!(decode([0x10, 0x68], Domain::Voltage), 4200.0 * VOLTAGE_LSB);
    }

    #[test]
    fn negative_readings_use_twos_complement() {
        assert_eq!(encode(-20.0, Domain::Temperature), (-200i16).to_be_bytes());
        assert_eq!(encode(-25.0, Domain::Current), (-2500i16).to_be_bytes());
        assert!((decode([0xFF, 0x38], Domain::Temperature) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn encoding_truncates_toward_zero() {
        assert_eq!(voltage_to_raw(3.7005), 3700);
        assert_eq!(current_to_raw(-1.239), -123);
        assert_eq!(temperature_to_raw(-0.05), 0);
    }

    #[test]
    fn out_of_range_values_saturate() {
        assert_eq!(voltage_to_raw(-1.0), 0);
        assert_eq!(voltage_to_raw(100.0), u16::MAX);
        assert_eq!(temperature_to_raw(5000.0), i16::MAX);
        assert_eq!(current_to_raw(f64::NAN), 0);
    }

    #[test]
    fn threshold_domains() {
        assert_eq!(Domain::from(Threshold::UnderVoltage), Domain::Voltage);
        assert_eq!(Domain::from(Threshold::OverCurrent), Domain::Current);
        assert_eq!(Domain::from(Threshold::UnderTemperature), Domain::Temperature);
    }
}
