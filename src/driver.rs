use crate::codec::{raw_to_current, raw_to_temperature, raw_to_voltage};
use crate::config::AfeConfig;
use crate::constants::*;
use crate::error::{AfeError, Result};
use crate::state::PackState;
use crate::transport::{I2cTransport, Transport};
use crate::types::*;
use chrono::Utc;
use embedded_hal::i2c::I2c;
use log::{debug, trace, warn};
use std::fmt::Debug;
use std::thread;

/// PB7200P80 driver.
///
/// Owns the transport and a cache of the most recent pack readings. All
/// operations are blocking and issue their bus transactions one after the
/// other. The driver does no locking: if several threads must reach the
/// same chip, put the driver behind a mutex.
pub struct Pb7200<T: Transport> {
    transport: T,
    config: AfeConfig,
    state: PackState,
}

impl<I2C: I2c> Pb7200<I2cTransport<I2C>> {
    /// Create a driver on an I2C bus, addressing the chip at `config.address`.
    pub fn new_i2c(i2c: I2C, config: AfeConfig) -> Result<Self> {
        let transport = I2cTransport::new(i2c, config.address);
        Self::new(transport, config)
    }
}

impl<T: Transport> Pb7200<T> {
    /// Create a driver. No bus traffic happens until [`Self::begin`].
    pub fn new(transport: T, config: AfeConfig) -> Result<Self> {
        config.validate()?;
        let state = PackState::new(config.cell_count);
        Ok(Self {
            transport,
            config,
            state,
        })
    }

    /// Settings the driver was built with.
    pub fn config(&self) -> &AfeConfig {
        &self.config
    }

    /// Cached readings from the last refresh.
    pub fn state(&self) -> &PackState {
        &self.state
    }

    /// Number of configured series cells.
    pub fn cell_count(&self) -> u8 {
        self.state.cell_count()
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn release(self) -> T {
        self.transport
    }

    /// Whether `index` names one of the configured cells.
    pub fn is_valid_cell_index(&self, index: u8) -> bool {
        self.state.is_valid_cell_index(index)
    }

    /// Whether `index` names one of the eight temperature sensors.
    pub fn is_valid_temp_index(index: u8) -> bool {
        PackState::is_valid_temp_index(index)
    }

    pub(crate) fn check_cell_index(&self, index: u8) -> Result<()> {
        if self.is_valid_cell_index(index) {
            Ok(())
        } else {
            Err(AfeError::InvalidCellIndex {
                index,
                cell_count: self.cell_count(),
            })
        }
    }

    fn check_temp_index(index: u8) -> Result<()> {
        if Self::is_valid_temp_index(index) {
            Ok(())
        } else {
            Err(AfeError::InvalidSensorIndex { index })
        }
    }

    fn bus_error<E: Debug>(register: u8, e: E) -> AfeError {
        AfeError::Bus {
            register,
            message: format!("{:?}", e),
        }
    }

    pub(crate) fn write_registers(&mut self, register: u8, values: &[u8]) -> Result<()> {
        trace!("write {:#04x}: {:02X?}", register, values);
        self.transport
            .write_bytes(register, values)
            .map_err(|e| Self::bus_error(register, e))
    }

    pub(crate) fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.write_registers(register, &[value])
    }

    pub(crate) fn read_registers(&mut self, register: u8, values: &mut [u8]) -> Result<()> {
        self.transport
            .read_bytes(register, values)
            .map_err(|e| Self::bus_error(register, e))?;
        trace!("read  {:#04x}: {:02X?}", register, values);
        Ok(())
    }

    pub(crate) fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_registers(register, &mut value)?;
        Ok(value[0])
    }

    pub(crate) fn read_pair(&mut self, register: u8) -> Result<[u8; 2]> {
        let mut pair = [0u8; 2];
        self.read_registers(register, &mut pair)?;
        Ok(pair)
    }

    /// Bring the chip up: settle, probe identity, enable normal mode with the
    /// ADC running, settle again and take the first reading.
    ///
    /// An incomplete first reading is logged and does not fail start-up;
    /// the next [`Self::refresh`] reports it.
    pub fn begin(&mut self) -> Result<()> {
        thread::sleep(self.config.startup_settle());

        let id = self.device_id()?;
        if RESERVED_DEVICE_IDS.contains(&id) {
            return Err(AfeError::DeviceNotFound { id });
        }

        self.write_register(REG_CONTROL, CONTROL_NORMAL_ADC_ON)?;
        thread::sleep(self.config.control_settle());

        if let Err(e) = self.refresh() {
            warn!("First reading after start-up incomplete: {}", e);
        }

        debug!(
            "PB7200P80 {:#04x} ready at {:#04x} with {} cells",
            id,
            self.config.address,
            self.cell_count()
        );
        Ok(())
    }

    /// Whether something answers with a non-reserved identity.
    pub fn is_connected(&mut self) -> bool {
        match self.device_id() {
            Ok(id) => !RESERVED_DEVICE_IDS.contains(&id),
            Err(e) => {
                debug!("Identity probe failed: {}", e);
                false
            }
        }
    }

    /// Read the identity register.
    pub fn device_id(&mut self) -> Result<u8> {
        self.read_register(REG_DEVICE_ID)
    }

    // ========== Voltages ==========

    /// Read one cell's voltage and update its cache slot.
    pub fn cell_voltage(&mut self, index: u8) -> Result<f64> {
        self.check_cell_index(index)?;
        let raw = u16::from_be_bytes(self.read_pair(cell_voltage_register(index))?);
        self.state.set_cell_raw(index as usize, raw);
        Ok(raw_to_voltage(raw))
    }

    /// Read the first `count` cell voltages in one transaction.
    pub fn read_cell_voltages(&mut self, count: u8) -> Result<Vec<f64>> {
        if count > self.cell_count() {
            return Err(AfeError::InvalidReadCount {
                requested: count,
                available: self.cell_count(),
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut data = vec![0u8; count as usize * 2];
        self.read_registers(REG_CELL_VOLTAGE_BASE, &mut data)?;

        let voltages = data
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                let raw = u16::from_be_bytes([pair[0], pair[1]]);
                self.state.set_cell_raw(i, raw);
                raw_to_voltage(raw)
            })
            .collect();
        Ok(voltages)
    }

    /// Voltage, balancing flag and the pack-level OV/UV bits for one cell.
    pub fn cell_data(&mut self, index: u8) -> Result<CellData> {
        self.check_cell_index(index)?;
        let voltage = self.cell_voltage(index)?;
        let balancing = self.is_balancing(index)?;
        let faults = self.fault_status()?;

        Ok(CellData {
            voltage,
            balancing,
            overvoltage: faults.contains(FaultFlags::OVP),
            undervoltage: faults.contains(FaultFlags::UVP),
        })
    }

    /// Sum of the cached cell voltages.
    pub fn total_voltage(&self) -> f64 {
        self.state.total_voltage()
    }

    /// Highest cached cell voltage, 0.0 before the first reading.
    pub fn max_cell_voltage(&self) -> f64 {
        self.state.max_cell_voltage()
    }

    /// Lowest non-zero cached cell voltage, 5.0 if every cell reads zero.
    pub fn min_cell_voltage(&self) -> f64 {
        self.state.min_cell_voltage()
    }

    /// Highest minus lowest cached cell voltage.
    pub fn voltage_delta(&self) -> f64 {
        self.state.voltage_delta()
    }

    // ========== Temperatures ==========

    /// Read one sensor and update its cache slot.
    pub fn temperature(&mut self, index: u8) -> Result<f64> {
        Self::check_temp_index(index)?;
        let raw = i16::from_be_bytes(self.read_pair(temperature_register(index))?);
        self.state.set_temperature_raw(index as usize, raw);
        Ok(raw_to_temperature(raw))
    }

    /// Read the first `count` sensors in one transaction.
    pub fn read_temperatures(&mut self, count: u8) -> Result<Vec<f64>> {
        if count as usize > MAX_TEMP_SENSORS {
            return Err(AfeError::InvalidReadCount {
                requested: count,
                available: MAX_TEMP_SENSORS as u8,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut data = vec![0u8; count as usize * 2];
        self.read_registers(REG_TEMP_BASE, &mut data)?;

        let temperatures = data
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                let raw = i16::from_be_bytes([pair[0], pair[1]]);
                self.state.set_temperature_raw(i, raw);
                raw_to_temperature(raw)
            })
            .collect();
        Ok(temperatures)
    }

    /// Hottest cached sensor reading.
    pub fn max_temperature(&self) -> f64 {
        self.state.max_temperature()
    }

    /// Coldest cached sensor reading above -50 °C.
    pub fn min_temperature(&self) -> f64 {
        self.state.min_temperature()
    }

    // ========== Current ==========

    /// Read the pack current (positive = charging) and cache it.
    pub fn current(&mut self) -> Result<f64> {
        let raw = i16::from_be_bytes(self.read_pair(REG_CURRENT_H)?);
        self.state.set_current_raw(raw);
        Ok(raw_to_current(raw))
    }

    /// Cached total voltage times cached current.
    pub fn power(&self) -> f64 {
        self.state.power()
    }

    // ========== Status and faults ==========

    /// Read the status byte and cache it.
    pub fn status(&mut self) -> Result<StatusFlags> {
        let status = self.read_register(REG_STATUS)?;
        self.state.set_status(status);
        Ok(self.state.status())
    }

    /// Read the fault latch byte and cache it.
    pub fn fault_status(&mut self) -> Result<FaultFlags> {
        let faults = self.read_register(REG_FAULT_STATUS)?;
        self.state.set_faults(faults);
        Ok(self.state.faults())
    }

    fn has_fault(&mut self, fault: FaultFlags) -> Result<bool> {
        Ok(self.fault_status()?.contains(fault))
    }

    fn has_status(&mut self, status: StatusFlags) -> Result<bool> {
        Ok(self.status()?.contains(status))
    }

    /// Over voltage fault latched.
    pub fn is_over_voltage(&mut self) -> Result<bool> {
        self.has_fault(FaultFlags::OVP)
    }

    /// Under voltage fault latched.
    pub fn is_under_voltage(&mut self) -> Result<bool> {
        self.has_fault(FaultFlags::UVP)
    }

    /// Over current fault latched.
    pub fn is_over_current(&mut self) -> Result<bool> {
        self.has_fault(FaultFlags::OCP)
    }

    /// Over temperature fault latched.
    pub fn is_over_temperature(&mut self) -> Result<bool> {
        self.has_fault(FaultFlags::OTP)
    }

    /// Under temperature fault latched.
    pub fn is_under_temperature(&mut self) -> Result<bool> {
        self.has_fault(FaultFlags::UTP)
    }

    /// The chip reports balancing in progress.
    pub fn is_balancing_active(&mut self) -> Result<bool> {
        self.has_status(StatusFlags::BALANCING)
    }

    /// The chip reports the pack is charging.
    pub fn is_charging(&mut self) -> Result<bool> {
        self.has_status(StatusFlags::CHARGING)
    }

    /// The chip reports it is ready.
    pub fn is_ready(&mut self) -> Result<bool> {
        self.has_status(StatusFlags::READY)
    }

    /// Clear the host-visible fault latch. This does not re-arm the chip's
    /// comparators; a persisting condition latches again.
    pub fn clear_faults(&mut self) -> Result<()> {
        self.write_register(REG_FAULT_STATUS, 0x00)
    }

    // ========== Modes ==========

    /// Replace the mode bits of the control register, keeping the others.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        let control = self.read_register(REG_CONTROL)?;
        let control = (control & !CONTROL_MODE_MASK) | (mode as u8 & CONTROL_MODE_MASK);
        debug!("Mode -> {:?} (control {:#04x})", mode, control);
        self.write_register(REG_CONTROL, control)
    }

    /// Enter sleep mode.
    pub fn sleep(&mut self) -> Result<()> {
        self.set_mode(Mode::Sleep)
    }

    /// Return to normal mode.
    pub fn wakeup(&mut self) -> Result<()> {
        self.set_mode(Mode::Normal)
    }

    /// Reset the chip and run the start-up sequence again.
    pub fn reset(&mut self) -> Result<()> {
        self.write_register(REG_CONTROL, CONTROL_RESET)?;
        thread::sleep(self.config.reset_settle());
        self.begin()
    }

    /// Power the chip down through the shutdown register.
    pub fn shutdown(&mut self) -> Result<()> {
        debug!("Shutting down PB7200P80 at {:#04x}", self.config.address);
        self.write_register(REG_SHUTDOWN, SHUTDOWN_COMMAND)
    }

    // ========== Refresh and statistics ==========

    fn refresh_stage(&mut self, stage: RefreshStage) -> Result<()> {
        match stage {
            RefreshStage::CellVoltages => self.read_cell_voltages(self.cell_count()).map(drop),
            RefreshStage::Temperatures => self.read_temperatures(MAX_TEMP_SENSORS as u8).map(drop),
            RefreshStage::Current => self.current().map(drop),
            RefreshStage::Status => self.status().map(drop),
            RefreshStage::FaultStatus => self.fault_status().map(drop),
        }
    }

    /// Re-read every cached quantity.
    ///
    /// All five reads are attempted. Each successful read replaces its part
    /// of the cache; a failed read leaves the previous values in place. The
    /// result lists every stage that failed.
    pub fn refresh(&mut self) -> Result<()> {
        let mut failed = Vec::new();
        for stage in RefreshStage::ALL {
            if let Err(e) = self.refresh_stage(stage) {
                warn!("Refresh stage {:?} failed: {}", stage, e);
                failed.push(stage);
            }
        }
        self.state.touch(Utc::now());

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AfeError::RefreshIncomplete { failed })
        }
    }

    /// Refresh, then compute statistics. Fails if the refresh was incomplete.
    pub fn pack_stats(&mut self) -> Result<PackStats> {
        self.refresh()?;
        Ok(self.state.stats())
    }

    /// Decoded copy of the cache, without bus traffic.
    pub fn snapshot(&self) -> PackSnapshot {
        self.state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedAfe;

    fn driver(cells: u8) -> Pb7200<SimulatedAfe> {
        Pb7200::new(SimulatedAfe::new(0x72), AfeConfig::with_cells(cells).without_delays()).unwrap()
    }

    #[test]
    fn construction_rejects_bad_cell_count() {
        let result = Pb7200::new(SimulatedAfe::new(0x72), AfeConfig::with_cells(0));
        assert!(matches!(result, Err(AfeError::InvalidCellCount(0))));
    }

    #[test]
    fn construction_does_not_touch_the_bus() {
        let afe = driver(4);
        assert_eq!(afe.transport().read_count(), 0);
        assert!(afe.transport().writes().is_empty());
        assert_eq!(afe.snapshot().cell_voltages, vec![0.0; 4]);
    }

    #[test]
    fn invalid_index_is_rejected_before_bus_traffic() {
        let mut afe = driver(4);
        assert!(matches!(
            afe.cell_voltage(4),
            Err(AfeError::InvalidCellIndex { index: 4, cell_count: 4 })
        ));
        assert!(matches!(afe.temperature(8), Err(AfeError::InvalidSensorIndex { index: 8 })));
        assert!(matches!(afe.read_cell_voltages(5), Err(AfeError::InvalidReadCount { .. })));
        assert_eq!(afe.transport().read_count(), 0);
    }

    #[test]
    fn single_cell_read_updates_cache() {
        let mut afe = driver(4);
        afe.transport_mut().set_cell_voltage(2, 4.2);

        let voltage = afe.cell_voltage(2).unwrap();
        assert_eq!(voltage, raw_to_voltage(4200));
        assert_eq!(afe.state().cell_raw(2), Some(4200));
        assert_eq!(afe.max_cell_voltage(), voltage);
    }

    #[test]
    fn mode_change_keeps_other_control_bits() {
        let mut afe = driver(4);
        afe.transport_mut().set_register(REG_CONTROL, CONTROL_AUTO_BALANCE | 0x01);

        afe.sleep().unwrap();
        assert_eq!(afe.transport().register(REG_CONTROL), CONTROL_AUTO_BALANCE | 0x01);

        afe.set_mode(Mode::Shutdown).unwrap();
        assert_eq!(afe.transport().register(REG_CONTROL), CONTROL_AUTO_BALANCE | 0x02);

        afe.wakeup().unwrap();
        assert_eq!(afe.transport().register(REG_CONTROL), CONTROL_AUTO_BALANCE);
    }

    #[test]
    fn bus_failure_carries_register() {
        let mut afe = driver(4);
        afe.transport_mut().fail_reads_at(REG_FAULT_STATUS);

        match afe.is_over_voltage() {
            Err(AfeError::Bus { register, .. }) => assert_eq!(register, REG_FAULT_STATUS),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
