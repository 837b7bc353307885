//! Cell balancing control.
//!
//! Cell `i` is bit `i % 8` of balancing register `REG_BALANCE_CTRL1 + i / 8`.
//! Balancing state is never cached: every query reads the chip.
//!
//! Per-cell updates are read-modify-write over two separate bus
//! transactions. The chip offers no atomic bit set, so a change made to the
//! same register by another bus master between the read and the write is
//! overwritten. Callers that share the bus must serialize access themselves.

use crate::constants::*;
use crate::driver::Pb7200;
use crate::error::{AfeError, Result};
use crate::transport::Transport;
use log::{debug, warn};

const BALANCE_REGISTERS: [u8; BALANCE_REGISTER_COUNT] =
    [REG_BALANCE_CTRL1, REG_BALANCE_CTRL2, REG_BALANCE_CTRL3];

impl<T: Transport> Pb7200<T> {
    /// Enable or disable balancing of one cell, leaving every other cell's
    /// bit as read.
    pub fn set_balancing(&mut self, index: u8, enable: bool) -> Result<()> {
        self.check_cell_index(index)?;
        let (register, bit) = balance_bit(index);

        let mut value = self.read_register(register)?;
        if enable {
            value |= 1 << bit;
        } else {
            value &= !(1 << bit);
        }
        self.write_register(register, value)
    }

    /// Whether the chip has balancing enabled for one cell.
    pub fn is_balancing(&mut self, index: u8) -> Result<bool> {
        self.check_cell_index(index)?;
        let (register, bit) = balance_bit(index);
        Ok(self.read_register(register)? & (1 << bit) != 0)
    }

    /// All balancing bits, cell 0 in bit 0.
    pub fn balancing_mask(&mut self) -> Result<u32> {
        let mut bytes = [0u8; BALANCE_REGISTER_COUNT];
        self.read_registers(REG_BALANCE_CTRL1, &mut bytes)?;
        let mask = bytes
            .iter()
            .enumerate()
            .fold(0u32, |mask, (i, byte)| mask | u32::from(*byte) << (8 * i));
        Ok(mask & ((1u32 << MAX_CELLS) - 1))
    }

    /// Clear every balancing register.
    ///
    /// All three writes are attempted; the error lists the registers that
    /// could not be cleared.
    pub fn stop_all_balancing(&mut self) -> Result<()> {
        let mut failed = Vec::new();
        for register in BALANCE_REGISTERS {
            if let Err(e) = self.write_register(register, 0x00) {
                warn!("Clearing balance register {:#04x} failed: {}", register, e);
                failed.push(register);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AfeError::BalancingIncomplete { failed })
        }
    }

    /// Switch autonomous balancing on or off.
    ///
    /// Enabling sets the auto-balance bit of the control register and leaves
    /// manually enabled cells alone. `threshold_mv` is accepted but not sent
    /// to the chip: there is no register for it.
    ///
    /// Disabling clears all three balancing registers, which also drops any
    /// manually enabled cells.
    pub fn set_auto_balancing(&mut self, enable: bool, threshold_mv: u16) -> Result<()> {
        if !enable {
            return self.stop_all_balancing();
        }

        debug!(
            "Auto-balancing on; threshold {} mV has no register and is not applied",
            threshold_mv
        );
        let control = self.read_register(REG_CONTROL)?;
        self.write_register(REG_CONTROL, control | CONTROL_AUTO_BALANCE)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AfeConfig;
    use crate::constants::*;
    use crate::driver::Pb7200;
    use crate::error::AfeError;
    use crate::sim::SimulatedAfe;

    fn driver(cells: u8) -> Pb7200<SimulatedAfe> {
        Pb7200::new(SimulatedAfe::new(0x72), AfeConfig::with_cells(cells).without_delays()).unwrap()
    }

    #[test]
    fn cell_nine_is_bit_one_of_second_register() {
        let mut afe = driver(12);
        afe.transport_mut().set_register(REG_BALANCE_CTRL1, 0x81);
        afe.transport_mut().set_register(REG_BALANCE_CTRL2, 0x0C);
        afe.transport_mut().set_register(REG_BALANCE_CTRL3, 0x05);

        afe.set_balancing(9, true).unwrap();

        assert_eq!(afe.transport().register(REG_BALANCE_CTRL1), 0x81);
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL2), 0x0E);
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL3), 0x05);
        assert!(afe.is_balancing(9).unwrap());
    }

    #[test]
    fn disabling_clears_only_that_bit() {
        let mut afe = driver(20);
        afe.transport_mut().set_register(REG_BALANCE_CTRL3, 0x0F);

        afe.set_balancing(18, false).unwrap();

        assert_eq!(afe.transport().register(REG_BALANCE_CTRL3), 0x0B);
    }

    #[test]
    fn out_of_range_cell_is_rejected_without_bus_traffic() {
        let mut afe = driver(4);
        assert!(matches!(
            afe.set_balancing(4, true),
            Err(AfeError::InvalidCellIndex { index: 4, .. })
        ));
        assert!(afe.is_balancing(19).is_err());
        assert_eq!(afe.transport().read_count(), 0);
    }

    #[test]
    fn failed_read_skips_the_write() {
        let mut afe = driver(4);
        afe.transport_mut().fail_reads_at(REG_BALANCE_CTRL1);

        assert!(afe.set_balancing(0, true).is_err());
        assert!(afe.transport().writes().is_empty());
    }

    #[test]
    fn mask_packs_three_registers() {
        let mut afe = driver(20);
        afe.transport_mut().set_register(REG_BALANCE_CTRL1, 0x01);
        afe.transport_mut().set_register(REG_BALANCE_CTRL2, 0x02);
        afe.transport_mut().set_register(REG_BALANCE_CTRL3, 0xF8);

        // Bits above cell 19 are ignored
        assert_eq!(afe.balancing_mask().unwrap(), 0x08_02_01);
    }

    #[test]
    fn stop_all_attempts_every_register() {
        let mut afe = driver(20);
        for register in [REG_BALANCE_CTRL1, REG_BALANCE_CTRL2, REG_BALANCE_CTRL3] {
            afe.transport_mut().set_register(register, 0xFF);
        }
        afe.transport_mut().fail_writes_at(REG_BALANCE_CTRL2);

        match afe.stop_all_balancing() {
            Err(AfeError::BalancingIncomplete { failed }) => assert_eq!(failed, vec![REG_BALANCE_CTRL2]),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL1), 0x00);
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL2), 0xFF);
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL3), 0x00);
    }

    #[test]
    fn enabling_auto_mode_keeps_manual_cells() {
        let mut afe = driver(8);
        afe.transport_mut().set_register(REG_CONTROL, CONTROL_NORMAL_ADC_ON);
        afe.set_balancing(3, true).unwrap();

        afe.set_auto_balancing(true, 50).unwrap();

        assert_eq!(
            afe.transport().register(REG_CONTROL),
            CONTROL_NORMAL_ADC_ON | CONTROL_AUTO_BALANCE
        );
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL1), 0x08);
    }

    #[test]
    fn threshold_is_not_written_anywhere() {
        let mut afe = driver(8);
        afe.set_auto_balancing(true, 0x1234).unwrap();

        let writes = afe.transport().writes();
        assert_eq!(writes, &[(REG_CONTROL, vec![CONTROL_AUTO_BALANCE])]);
    }

    #[test]
    fn disabling_auto_mode_clears_manual_cells() {
        let mut afe = driver(8);
        afe.set_balancing(3, true).unwrap();
        afe.transport_mut().set_register(REG_BALANCE_CTRL2, 0x40);

        afe.set_auto_balancing(false, 50).unwrap();

        assert_eq!(afe.transport().register(REG_BALANCE_CTRL1), 0x00);
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL2), 0x00);
        assert_eq!(afe.transport().register(REG_BALANCE_CTRL3), 0x00);
        assert!(!afe.is_balancing(3).unwrap());
    }
}
