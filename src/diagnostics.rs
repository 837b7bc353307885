use crate::constants::RESERVED_DEVICE_IDS;
use crate::driver::Pb7200;
use crate::error::{AfeError, Result};
use crate::transport::Transport;
use crate::types::{CellData, DiagnosticsReport, FaultFlags, SelfTestReport};
use chrono::Utc;
use log::{info, warn};

/// Pack voltage below which the cells are probably not connected
const LOW_PACK_VOLTAGE: f64 = 0.1;

impl<T: Transport> Pb7200<T> {
    /// Check communication and take one reading.
    ///
    /// Fails only if the chip does not answer; an incomplete reading is
    /// reported through `refresh_ok`.
    pub fn self_test(&mut self) -> Result<SelfTestReport> {
        let device_id = self.device_id()?;
        if RESERVED_DEVICE_IDS.contains(&device_id) {
            return Err(AfeError::DeviceNotFound { id: device_id });
        }
        info!("Communication established, device id {:#04x}", device_id);

        let refresh_ok = match self.refresh() {
            Ok(()) => true,
            Err(e) => {
                warn!("Self-test reading incomplete: {}", e);
                false
            }
        };

        let total_voltage = self.total_voltage();
        let low_voltage_warning = total_voltage < LOW_PACK_VOLTAGE;
        if low_voltage_warning {
            warn!("Total voltage too low: {:.3} V", total_voltage);
        }

        Ok(SelfTestReport {
            device_id,
            refresh_ok,
            total_voltage,
            low_voltage_warning,
        })
    }

    /// Collect identity, flags, per-cell data and the cached measurements.
    ///
    /// Per-cell voltages come from the cache; balancing bits and flags are
    /// read fresh.
    pub fn diagnostics(&mut self) -> Result<DiagnosticsReport> {
        let device_id = self.device_id()?;
        let status = self.status()?;
        let faults = self.fault_status()?;
        let balancing = self.balancing_mask()?;

        let cells = self
            .state()
            .cell_voltages()
            .enumerate()
            .map(|(i, voltage)| CellData {
                voltage,
                balancing: balancing & (1 << i) != 0,
                overvoltage: faults.contains(FaultFlags::OVP),
                undervoltage: faults.contains(FaultFlags::UVP),
            })
            .collect();

        Ok(DiagnosticsReport {
            timestamp: Utc::now(),
            device_id,
            cell_count: self.cell_count(),
            status,
            faults,
            cells,
            temperatures: self.state().temperatures(),
            current: self.state().current(),
            power: self.power(),
            total_voltage: self.total_voltage(),
            voltage_delta: self.voltage_delta(),
            last_update: self.state().last_update(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AfeConfig;
    use crate::constants::*;
    use crate::driver::Pb7200;
    use crate::error::AfeError;
    use crate::sim::SimulatedAfe;
    use crate::types::FaultFlags;

    fn driver(sim: SimulatedAfe) -> Pb7200<SimulatedAfe> {
        Pb7200::new(sim, AfeConfig::with_cells(4).without_delays()).unwrap()
    }

    #[test]
    fn absent_device_fails_self_test() {
        let mut afe = driver(SimulatedAfe::new(0xFF));
        assert!(matches!(afe.self_test(), Err(AfeError::DeviceNotFound { id: 0xFF })));
    }

    #[test]
    fn unconnected_cells_raise_low_voltage_warning() {
        let mut afe = driver(SimulatedAfe::new(0x72));
        let report = afe.self_test().unwrap();
        assert!(report.refresh_ok);
        assert!(report.low_voltage_warning);
        assert_eq!(report.device_id, 0x72);
    }

    #[test]
    fn incomplete_reading_is_reported_not_fatal() {
        let mut sim = SimulatedAfe::new(0x72);
        for i in 0..4 {
            sim.set_cell_voltage(i, 3.7);
        }
        sim.fail_reads_at(REG_CURRENT_H);
        let mut afe = driver(sim);

        let report = afe.self_test().unwrap();
        assert!(!report.refresh_ok);
        assert!(!report.low_voltage_warning);
        assert!((report.total_voltage - 14.8).abs() < 1e-9);
    }

    #[test]
    fn diagnostics_mirror_pack_faults_on_every_cell() {
        let mut sim = SimulatedAfe::new(0x72);
        sim.set_register(REG_FAULT_STATUS, FaultFlags::OVP.bits());
        sim.set_register(REG_BALANCE_CTRL1, 0b0000_0100);
        let mut afe = driver(sim);

        let report = afe.diagnostics().unwrap();
        assert_eq!(report.cells.len(), 4);
        assert!(report.cells.iter().all(|cell| cell.overvoltage && !cell.undervoltage));
        assert_eq!(
            report.cells.iter().map(|cell| cell.balancing).collect::<Vec<_>>(),
            vec![false, false, true, false]
        );
        assert_eq!(report.faults, FaultFlags::OVP);
    }
}
