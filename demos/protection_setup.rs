//! Protection Setup Example
//!
//! Programs protection thresholds into a simulated PB7200P80 and reads them
//! back. Thresholds come from a JSON file or from one of the built-in
//! chemistry presets.
//!
//! Usage:
//!   cargo run --example protection_setup                       # Pick a preset
//!   cargo run --example protection_setup -- thresholds.json    # Load from file
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example protection_setup

use inquire::Select;
use log::{error, info, warn};
use pb7200_afe::constants::DEFAULT_CELL_COUNT;
use pb7200_afe::sim::SimulatedAfe;
use pb7200_afe::{AfeConfig, AfeError, Domain, Pb7200, ProtectionConfig, Result, Threshold};

fn nmc_preset() -> ProtectionConfig {
    ProtectionConfig {
        over_voltage_threshold: 4.25,
        under_voltage_threshold: 2.5,
        over_current_threshold: 60.0,
        over_temp_threshold: 65.0,
        under_temp_threshold: -20.0,
        over_voltage_delay_ms: 1000,
        under_voltage_delay_ms: 1000,
        over_current_delay_ms: 10,
    }
}

fn lfp_preset() -> ProtectionConfig {
    ProtectionConfig {
        over_voltage_threshold: 3.65,
        under_voltage_threshold: 2.5,
        over_current_threshold: 100.0,
        over_temp_threshold: 60.0,
        under_temp_threshold: -10.0,
        ..nmc_preset()
    }
}

/// Interactive preset selection using inquire
fn select_preset() -> Result<ProtectionConfig> {
    let presets = vec!["NMC (4.25 V / 2.5 V)", "LFP (3.65 V / 2.5 V)"];
    let selection = Select::new("Select a protection preset:", presets)
        .prompt()
        .map_err(|e| AfeError::Config(format!("Selection cancelled: {}", e)))?;

    if selection.starts_with("LFP") {
        Ok(lfp_preset())
    } else {
        Ok(nmc_preset())
    }
}

fn load_file(path: &str) -> Result<ProtectionConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AfeError::Config(format!("Cannot read {}: {}", path, e)))?;
    Ok(serde_json::from_str(&text)?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let wanted = match std::env::args().nth(1) {
        Some(path) => load_file(&path)?,
        None => select_preset()?,
    };

    let config = AfeConfig::with_cells(DEFAULT_CELL_COUNT);
    let mut afe = Pb7200::new(SimulatedAfe::new(0x72), config)?;
    afe.begin()?;

    info!("Writing protection thresholds...");
    if let Err(e) = afe.set_protection_config(&wanted) {
        error!("Protection setup failed: {}", e);
        return Err(e);
    }
    if wanted.over_voltage_delay_ms != 0 || wanted.over_current_delay_ms != 0 {
        warn!("Protection delays are not programmable on this chip and were not written");
    }

    let applied = afe.protection_config()?;
    info!("=== Protection thresholds ===");
    for threshold in Threshold::ALL {
        let requested = wanted.threshold(threshold);
        let actual = applied.threshold(threshold);
        let unit = match Domain::from(threshold) {
            Domain::Voltage => "V",
            Domain::Current => "A",
            Domain::Temperature => "°C",
        };
        info!(
            "{:<18} requested {:>8.3} {:<2} applied {:>8.3} {}",
            format!("{:?}", threshold),
            requested,
            unit,
            actual,
            unit
        );
    }

    match serde_json::to_string_pretty(&applied) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Could not serialize thresholds: {}", e),
    }
    Ok(())
}
