use crate::constants::MAX_TEMP_SENSORS;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Fault latch byte. Bits stay set until [`crate::Pb7200::clear_faults`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FaultFlags: u8 {
        /// Over voltage
        const OVP = 1 << 0;
        /// Under voltage
        const UVP = 1 << 1;
        /// Over current
        const OCP = 1 << 2;
        /// Over temperature
        const OTP = 1 << 3;
        /// Under temperature
        const UTP = 1 << 4;
    }
}

bitflags! {
    /// Status byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct StatusFlags: u8 {
        /// Balancing active
        const BALANCING = 1 << 5;
        /// Charging
        const CHARGING = 1 << 6;
        /// Ready
        const READY = 1 << 7;
    }
}

/// Operating modes selectable through the control register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    Normal = 0,
    Sleep = 1,
    Shutdown = 2,
}

/// Protection thresholds, in register order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Threshold {
    OverVoltage,
    UnderVoltage,
    OverCurrent,
    OverTemperature,
    UnderTemperature,
}

impl Threshold {
    /// All thresholds in register order.
    pub const ALL: [Threshold; 5] = [
        Threshold::OverVoltage,
        Threshold::UnderVoltage,
        Threshold::OverCurrent,
        Threshold::OverTemperature,
        Threshold::UnderTemperature,
    ];
}

/// The bus reads that make up a pack refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshStage {
    CellVoltages,
    Temperatures,
    Current,
    Status,
    FaultStatus,
}

impl RefreshStage {
    /// Stages in the order a refresh runs them.
    pub const ALL: [RefreshStage; 5] = [
        RefreshStage::CellVoltages,
        RefreshStage::Temperatures,
        RefreshStage::Current,
        RefreshStage::Status,
        RefreshStage::FaultStatus,
    ];
}

/// Per-cell view assembled from several registers.
///
/// `overvoltage` and `undervoltage` are the pack-level fault bits mirrored
/// onto every cell: the chip latches faults for the whole pack, so these
/// flags are identical for all cells and do not identify the offending cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellData {
    pub voltage: f64,
    pub balancing: bool,
    pub overvoltage: bool,
    pub undervoltage: bool,
}

/// Protection thresholds in physical units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Volts
    pub over_voltage_threshold: f64,
    /// Volts
    pub under_voltage_threshold: f64,
    /// Amperes
    pub over_current_threshold: f64,
    /// °C
    pub over_temp_threshold: f64,
    /// °C
    pub under_temp_threshold: f64,
    /// Milliseconds. Carried only; the chip has no delay registers.
    pub over_voltage_delay_ms: u16,
    /// Milliseconds. Carried only; the chip has no delay registers.
    pub under_voltage_delay_ms: u16,
    /// Milliseconds. Carried only; the chip has no delay registers.
    pub over_current_delay_ms: u16,
}

impl ProtectionConfig {
    /// Value of one threshold in its physical unit.
    pub fn threshold(&self, threshold: Threshold) -> f64 {
        match threshold {
            Threshold::OverVoltage => self.over_voltage_threshold,
            Threshold::UnderVoltage => self.under_voltage_threshold,
            Threshold::OverCurrent => self.over_current_threshold,
            Threshold::OverTemperature => self.over_temp_threshold,
            Threshold::UnderTemperature => self.under_temp_threshold,
        }
    }

    pub fn set_threshold(&mut self, threshold: Threshold, value: f64) {
        match threshold {
            Threshold::OverVoltage => self.over_voltage_threshold = value,
            Threshold::UnderVoltage => self.under_voltage_threshold = value,
            Threshold::OverCurrent => self.over_current_threshold = value,
            Threshold::OverTemperature => self.over_temp_threshold = value,
            Threshold::UnderTemperature => self.under_temp_threshold = value,
        }
    }
}

/// Aggregate pack statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PackStats {
    pub total_voltage: f64,
    pub max_cell_voltage: f64,
    pub min_cell_voltage: f64,
    pub avg_cell_voltage: f64,
    pub voltage_delta: f64,
    pub max_cell_index: u8,
    pub min_cell_index: u8,
    pub current: f64,
    pub power: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub max_temp_index: u8,
    pub min_temp_index: u8,
}

/// Decoded copy of the cached pack state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackSnapshot {
    pub cell_voltages: Vec<f64>,
    pub temperatures: [f64; MAX_TEMP_SENSORS],
    pub current: f64,
    pub status: StatusFlags,
    pub faults: FaultFlags,
    pub last_update: Option<DateTime<Utc>>,
}

/// Outcome of [`crate::Pb7200::self_test`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfTestReport {
    pub device_id: u8,
    pub refresh_ok: bool,
    pub total_voltage: f64,
    /// Total pack voltage under 0.1 V, usually cells not connected
    pub low_voltage_warning: bool,
}

/// Structured device diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub device_id: u8,
    pub cell_count: u8,
    pub status: StatusFlags,
    pub faults: FaultFlags,
    pub cells: Vec<CellData>,
    pub temperatures: [f64; MAX_TEMP_SENSORS],
    pub current: f64,
    pub power: f64,
    pub total_voltage: f64,
    pub voltage_delta: f64,
    /// When the cached measurements were last refreshed
    pub last_update: Option<DateTime<Utc>>,
}
