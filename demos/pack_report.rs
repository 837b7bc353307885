//! Pack Report Example
//!
//! Brings up a simulated PB7200P80, takes a reading and prints:
//! - Per-cell voltages and balancing state
//! - Pack statistics
//! - Temperatures and current
//! - A JSON diagnostics report
//!
//! Usage:
//!   cargo run --example pack_report            # Interactive cell count
//!   cargo run --example pack_report -- 12      # 12-cell pack
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=trace cargo run --example pack_report -- 4

use inquire::CustomType;
use log::{error, info, warn};
use pb7200_afe::constants::*;
use pb7200_afe::sim::SimulatedAfe;
use pb7200_afe::{AfeConfig, AfeError, Pb7200, Result, StatusFlags};

/// Ask for the cell count when none was given on the command line
fn prompt_cell_count() -> Result<u8> {
    CustomType::<u8>::new("Number of series cells:")
        .with_default(DEFAULT_CELL_COUNT)
        .with_help_message("1-20")
        .prompt()
        .map_err(|e| AfeError::Config(format!("Input cancelled: {}", e)))
}

/// A chip with a slightly unbalanced, discharging pack behind it
fn seeded_chip(cell_count: u8) -> SimulatedAfe {
    let mut sim = SimulatedAfe::new(0x72);
    for i in 0..cell_count {
        let spread = f64::from(i % 5) * 0.015;
        sim.set_cell_voltage(i, 3.62 + spread);
    }
    for (i, celsius) in [24.5, 26.0, 25.1, 31.4].into_iter().enumerate() {
        sim.set_temperature(i as u8, celsius);
    }
    sim.set_current(-12.5);
    sim.set_register(REG_STATUS, StatusFlags::READY.bits());
    sim
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cell_count = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u8>()
            .map_err(|e| AfeError::Config(format!("Bad cell count '{}': {}", arg, e)))?,
        None => prompt_cell_count()?,
    };

    let config = AfeConfig::with_cells(cell_count);
    config.validate()?;
    let mut afe = Pb7200::new(seeded_chip(cell_count), config)?;

    if let Err(e) = afe.begin() {
        error!("Start-up failed: {}", e);
        return Err(e);
    }
    info!("PB7200P80 connected, {} cells", afe.cell_count());

    // Top cell of the first group gets bled down
    afe.set_balancing(4.min(cell_count - 1), true)?;

    let stats = afe.pack_stats()?;

    info!("=== Cells ===");
    for index in 0..afe.cell_count() {
        let cell = afe.cell_data(index)?;
        info!(
            "Cell {:2}: {:.3} V{}",
            index + 1,
            cell.voltage,
            if cell.balancing { "  [balancing]" } else { "" }
        );
    }

    info!("=== Pack ===");
    info!("Total voltage:   {:.3} V", stats.total_voltage);
    info!("Average cell:    {:.3} V", stats.avg_cell_voltage);
    info!(
        "Highest cell:    {:.3} V (cell {})",
        stats.max_cell_voltage,
        stats.max_cell_index + 1
    );
    info!(
        "Lowest cell:     {:.3} V (cell {})",
        stats.min_cell_voltage,
        stats.min_cell_index + 1
    );
    info!("Delta:           {:.1} mV", stats.voltage_delta * 1000.0);
    info!("Current:         {:.2} A", stats.current);
    info!("Power:           {:.1} W", stats.power);
    info!(
        "Temperature:     {:.1} to {:.1} °C",
        stats.min_temp, stats.max_temp
    );

    if afe.is_over_voltage()? || afe.is_under_voltage()? {
        warn!("Voltage fault latched: {:?}", afe.state().faults());
    }

    info!("=== Diagnostics ===");
    let report = afe.diagnostics()?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Could not serialize diagnostics: {}", e),
    }

    afe.sleep()?;
    info!("Chip put to sleep");
    Ok(())
}
