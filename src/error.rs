//! Error types for PB7200P80 driver operations.

use crate::types::{ProtectionConfig, RefreshStage, Threshold};
use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, AfeError>;

/// Error types for PB7200P80 communication and validation.
#[derive(Error, Debug)]
pub enum AfeError {
    /// A bus transaction failed at the transport level
    #[error("Bus error at register {register:#04x}: {message}")]
    Bus {
        /// First register of the failed transaction
        register: u8,
        /// Transport error rendered as text
        message: String,
    },

    /// Identity register returned a reserved value (nothing on the bus)
    #[error("Device not found (id {id:#04x})")]
    DeviceNotFound {
        /// Identity byte that was read
        id: u8,
    },

    /// Cell index outside the configured cell count
    #[error("Invalid cell index {index} (configured cells: {cell_count})")]
    InvalidCellIndex {
        /// Requested index
        index: u8,
        /// Configured number of cells
        cell_count: u8,
    },

    /// Temperature sensor index outside the fixed sensor bank
    #[error("Invalid temperature sensor index {index}")]
    InvalidSensorIndex {
        /// Requested index
        index: u8,
    },

    /// Cell count of zero or above the chip maximum
    #[error("Invalid cell count {0} (expected 1-20)")]
    InvalidCellCount(u8),

    /// Bulk read asked for more channels than are available
    #[error("Cannot read {requested} channels, only {available} available")]
    InvalidReadCount {
        /// Channels requested
        requested: u8,
        /// Channels available
        available: u8,
    },

    /// One or more stages of a pack refresh failed; successful stages were kept
    #[error("Refresh incomplete, failed stages: {failed:?}")]
    RefreshIncomplete {
        /// Stages whose bus reads failed
        failed: Vec<RefreshStage>,
    },

    /// One or more protection thresholds could not be transferred
    #[error("Protection config incomplete, failed thresholds: {failed:?}")]
    ProtectionIncomplete {
        /// Thresholds whose register pair transfer failed
        failed: Vec<Threshold>,
        /// On readback, every threshold that was read; failed ones are zero.
        /// `None` for writes.
        partial: Option<ProtectionConfig>,
    },

    /// One or more balancing control registers could not be cleared
    #[error("Balancing registers not cleared: {failed:02X?}")]
    BalancingIncomplete {
        /// Registers whose write failed
        failed: Vec<u8>,
    },

    /// Configuration content rejected
    #[error("Config error: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
