//! Protection threshold configuration.
//!
//! Each threshold lives in its own register pair and uses the scale of the
//! quantity it guards. Transfers are best effort: every threshold is tried,
//! and the error names the ones that failed.

use crate::codec::{decode, encode, Domain};
use crate::constants::threshold_register;
use crate::driver::Pb7200;
use crate::error::{AfeError, Result};
use crate::transport::Transport;
use crate::types::{ProtectionConfig, Threshold};
use log::warn;

impl<T: Transport> Pb7200<T> {
    /// Write all five thresholds, high byte first.
    ///
    /// Delay fields are not transmitted; the chip has no delay registers.
    pub fn set_protection_config(&mut self, config: &ProtectionConfig) -> Result<()> {
        let mut failed = Vec::new();
        for threshold in Threshold::ALL {
            let pair = encode(config.threshold(threshold), Domain::from(threshold));
            if let Err(e) = self.write_registers(threshold_register(threshold), &pair) {
                warn!("Writing {:?} threshold failed: {}", threshold, e);
                failed.push(threshold);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AfeError::ProtectionIncomplete {
                failed,
                partial: None,
            })
        }
    }

    /// Read all five thresholds back from the chip.
    ///
    /// Delay fields come back as zero. Every threshold is tried; if some
    /// fail, the error carries the ones that were read in `partial`.
    pub fn protection_config(&mut self) -> Result<ProtectionConfig> {
        let mut config = ProtectionConfig::default();
        let mut failed = Vec::new();
        for threshold in Threshold::ALL {
            match self.read_pair(threshold_register(threshold)) {
                Ok(pair) => config.set_threshold(threshold, decode(pair, Domain::from(threshold))),
                Err(e) => {
                    warn!("Reading {:?} threshold failed: {}", threshold, e);
                    failed.push(threshold);
                }
            }
        }

        if failed.is_empty() {
            Ok(config)
        } else {
            warn!("Partially read protection config: {:?}", config);
            Err(AfeError::ProtectionIncomplete {
                failed,
                partial: Some(config),
            })
        }
    }
}
