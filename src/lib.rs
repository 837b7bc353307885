//! # PB7200P80 AFE Driver
//!
//! A Rust driver for the PB7200P80 analog front end, the measurement and
//! protection chip of a battery-management system. The chip is reached only
//! through byte registers on a shared bus; this crate maps those registers to
//! typed cell voltages, temperatures, pack current, fault flags, balancing
//! control and protection thresholds.
//!
//! ## Features
//!
//! - Up to 20 series cells and 8 temperature sensors
//! - Cached pack readings with partial-failure aware refresh
//! - Pack statistics (total, min/max/average, delta, temperature extremes, power)
//! - Per-cell and automatic balancing control
//! - Protection threshold configuration
//! - Any register transport: `embedded-hal` I2C buses, or the bundled simulator
//!
//! ## Example
//!
//! ```no_run
//! use pb7200_afe::{sim::SimulatedAfe, AfeConfig, Pb7200};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut afe = Pb7200::new(SimulatedAfe::new(0x72), AfeConfig::with_cells(4))?;
//!     afe.begin()?;
//!     let stats = afe.pack_stats()?;
//!     println!("Pack voltage: {:.3}V, delta {:.1}mV", stats.total_voltage, stats.voltage_delta * 1000.0);
//!     Ok(())
//! }
//! ```

mod balancing;
pub mod codec;
pub mod config;
pub mod constants;
mod diagnostics;
pub mod driver;
pub mod error;
mod protection;
pub mod sim;
pub mod state;
pub mod transport;
pub mod types;

pub use codec::Domain;
pub use config::AfeConfig;
pub use driver::Pb7200;
pub use error::{AfeError, Result};
pub use state::PackState;
pub use transport::{I2cTransport, Transport};
pub use types::*;
