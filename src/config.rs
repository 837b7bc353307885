//! Driver configuration.

use crate::constants::*;
use crate::error::{AfeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction-time settings for [`crate::Pb7200`].
///
/// Missing fields fall back to the defaults when deserialized, so a config
/// file only needs to name what differs from a stock 4-cell board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfeConfig {
    /// 7-bit bus address
    pub address: u8,
    /// Number of series cells wired to the chip (1-20)
    pub cell_count: u8,
    /// Wait before the first identity probe
    pub startup_settle_ms: u64,
    /// Wait after enabling the ADC
    pub control_settle_ms: u64,
    /// Wait after a reset command
    pub reset_settle_ms: u64,
}

impl Default for AfeConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            cell_count: DEFAULT_CELL_COUNT,
            startup_settle_ms: STARTUP_SETTLE_MS,
            control_settle_ms: CONTROL_SETTLE_MS,
            reset_settle_ms: RESET_SETTLE_MS,
        }
    }
}

impl AfeConfig {
    /// Default settings for a pack of `cell_count` cells.
    pub fn with_cells(cell_count: u8) -> Self {
        Self {
            cell_count,
            ..Self::default()
        }
    }

    /// Drop all settle delays. Meant for simulated devices.
    pub fn without_delays(mut self) -> Self {
        self.startup_settle_ms = 0;
        self.control_settle_ms = 0;
        self.reset_settle_ms = 0;
        self
    }

    /// Parse a JSON config and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_count == 0 || self.cell_count as usize > MAX_CELLS {
            return Err(AfeError::InvalidCellCount(self.cell_count));
        }
        if self.address > 0x7F {
            return Err(AfeError::Config(format!(
                "address {:#04x} is not a 7-bit bus address",
                self.address
            )));
        }
        Ok(())
    }

    pub(crate) fn startup_settle(&self) -> Duration {
        Duration::from_millis(self.startup_settle_ms)
    }

    pub(crate) fn control_settle(&self) -> Duration {
        Duration::from_millis(self.control_settle_ms)
    }

    pub(crate) fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }
}
