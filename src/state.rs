//! Cached pack readings and the statistics derived from them.
//!
//! The cache keeps raw register samples; physical values are decoded on
//! demand. Every aggregate here is a pure function of the cache, so the
//! statistics of a pack are fully determined by the last refresh.

use crate::codec::{raw_to_current, raw_to_temperature, raw_to_voltage};
use crate::constants::*;
use crate::types::{FaultFlags, PackSnapshot, PackStats, StatusFlags};
use chrono::{DateTime, Utc};

/// Most recent readings of one pack
#[derive(Debug, Clone, PartialEq)]
pub struct PackState {
    cell_count: u8,
    cell_raw: [u16; MAX_CELLS],
    temperature_raw: [i16; MAX_TEMP_SENSORS],
    current_raw: i16,
    status: StatusFlags,
    faults: FaultFlags,
    last_update: Option<DateTime<Utc>>,
}

impl PackState {
    /// Zeroed state for a pack of `cell_count` cells.
    pub fn new(cell_count: u8) -> Self {
        Self {
            cell_count: cell_count.min(MAX_CELLS as u8),
            cell_raw: [0; MAX_CELLS],
            temperature_raw: [0; MAX_TEMP_SENSORS],
            current_raw: 0,
            status: StatusFlags::empty(),
            faults: FaultFlags::empty(),
            last_update: None,
        }
    }

    pub fn cell_count(&self) -> u8 {
        self.cell_count
    }

    /// Whether `index` names a configured cell.
    ///
    /// Indices at or above `cell_count` are rejected, which also rejects
    /// anything at or above the chip maximum.
    pub fn is_valid_cell_index(&self, index: u8) -> bool {
        index < self.cell_count
    }

    pub fn is_valid_temp_index(index: u8) -> bool {
        (index as usize) < MAX_TEMP_SENSORS
    }

    pub fn cell_voltage(&self, index: u8) -> Option<f64> {
        self.is_valid_cell_index(index)
            .then(|| raw_to_voltage(self.cell_raw[index as usize]))
    }

    pub fn cell_raw(&self, index: u8) -> Option<u16> {
        self.is_valid_cell_index(index).then(|| self.cell_raw[index as usize])
    }

    /// Voltages of the configured cells, in index order.
    pub fn cell_voltages(&self) -> impl Iterator<Item = f64> + '_ {
        self.cell_raw[..self.cell_count as usize]
            .iter()
            .map(|raw| raw_to_voltage(*raw))
    }

    pub fn temperature(&self, index: u8) -> Option<f64> {
        Self::is_valid_temp_index(index)
            .then(|| raw_to_temperature(self.temperature_raw[index as usize]))
    }

    pub fn temperatures(&self) -> [f64; MAX_TEMP_SENSORS] {
        self.temperature_raw.map(raw_to_temperature)
    }

    pub fn current(&self) -> f64 {
        raw_to_current(self.current_raw)
    }

    pub fn status(&self) -> StatusFlags {
        self.status
    }

    pub fn faults(&self) -> FaultFlags {
        self.faults
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn total_voltage(&self) -> f64 {
        self.cell_voltages().sum()
    }

    /// Highest cell voltage and its index; ties keep the lowest index.
    pub fn max_cell(&self) -> (f64, u8) {
        let mut max = (0.0, 0);
        for (i, voltage) in self.cell_voltages().enumerate() {
            if voltage > max.0 {
                max = (voltage, i as u8);
            }
        }
        max
    }

    /// Lowest non-zero cell voltage and its index.
    ///
    /// Cells reading exactly 0 V are skipped; with no candidate at all the
    /// result stays at the 5 V seed.
    pub fn min_cell(&self) -> (f64, u8) {
        let mut min = (MIN_CELL_VOLTAGE_SEED, 0);
        for (i, voltage) in self.cell_voltages().enumerate() {
            if voltage < min.0 && voltage > 0.0 {
                min = (voltage, i as u8);
            }
        }
        min
    }

    pub fn max_cell_voltage(&self) -> f64 {
        self.max_cell().0
    }

    pub fn min_cell_voltage(&self) -> f64 {
        self.min_cell().0
    }

    pub fn voltage_delta(&self) -> f64 {
        self.max_cell_voltage() - self.min_cell_voltage()
    }

    pub fn avg_cell_voltage(&self) -> f64 {
        if self.cell_count == 0 {
            return 0.0;
        }
        self.total_voltage() / f64::from(self.cell_count)
    }

    /// Hottest sensor and its index, seeded at -100 °C.
    pub fn max_temperature_sensor(&self) -> (f64, u8) {
        let mut max = (MAX_TEMP_SEED, 0);
        for (i, temp) in self.temperatures().into_iter().enumerate() {
            if temp > max.0 {
                max = (temp, i as u8);
            }
        }
        max
    }

    /// Coldest sensor above -50 °C and its index, seeded at 200 °C.
    pub fn min_temperature_sensor(&self) -> (f64, u8) {
        let mut min = (MIN_TEMP_SEED, 0);
        for (i, temp) in self.temperatures().into_iter().enumerate() {
            if temp < min.0 && temp > MIN_TEMP_FLOOR {
                min = (temp, i as u8);
            }
        }
        min
    }

    pub fn max_temperature(&self) -> f64 {
        self.max_temperature_sensor().0
    }

    pub fn min_temperature(&self) -> f64 {
        self.min_temperature_sensor().0
    }

    pub fn power(&self) -> f64 {
        self.total_voltage() * self.current()
    }

    /// All aggregates of the cached readings.
    pub fn stats(&self) -> PackStats {
        let total_voltage = self.total_voltage();
        let (max_cell_voltage, max_cell_index) = self.max_cell();
        let (min_cell_voltage, min_cell_index) = self.min_cell();
        let (max_temp, max_temp_index) = self.max_temperature_sensor();
        let (min_temp, min_temp_index) = self.min_temperature_sensor();
        let current = self.current();

        PackStats {
            total_voltage,
            max_cell_voltage,
            min_cell_voltage,
            avg_cell_voltage: self.avg_cell_voltage(),
            voltage_delta: max_cell_voltage - min_cell_voltage,
            max_cell_index,
            min_cell_index,
            current,
            power: total_voltage * current,
            max_temp,
            min_temp,
            max_temp_index,
            min_temp_index,
        }
    }

    /// Decoded copy of the cache.
    pub fn snapshot(&self) -> PackSnapshot {
        PackSnapshot {
            cell_voltages: self.cell_voltages().collect(),
            temperatures: self.temperatures(),
            current: self.current(),
            status: self.status,
            faults: self.faults,
            last_update: self.last_update,
        }
    }

    pub(crate) fn set_cell_raw(&mut self, index: usize, raw: u16) {
        self.cell_raw[index] = raw;
    }

    pub(crate) fn set_temperature_raw(&mut self, index: usize, raw: i16) {
        self.temperature_raw[index] = raw;
    }

    pub(crate) fn set_current_raw(&mut self, raw: i16) {
        self.current_raw = raw;
    }

    pub(crate) fn set_status(&mut self, status: u8) {
        self.status = StatusFlags::from_bits_retain(status);
    }

    pub(crate) fn set_faults(&mut self, faults: u8) {
        self.faults = FaultFlags::from_bits_retain(faults);
    }

    /// Stamp a refresh. The stamp never moves backwards, even if the wall
    /// clock does.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = Some(match self.last_update {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }
}
