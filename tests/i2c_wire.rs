use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use pb7200_afe::constants::*;
use pb7200_afe::{AfeConfig, AfeError, Pb7200, ProtectionConfig};

const ADDR: u8 = DEFAULT_I2C_ADDRESS;

fn config(cells: u8) -> AfeConfig {
    AfeConfig::with_cells(cells).without_delays()
}

#[test]
fn begin_transaction_sequence() {
    let mut temperatures = vec![0u8; 2 * MAX_TEMP_SENSORS];
    temperatures[0] = 0x00;
    temperatures[1] = 0xFA; // 25.0 °C
    let expectations = [
        I2cTransaction::write_read(ADDR, vec![REG_DEVICE_ID], vec![0x72]),
        I2cTransaction::write(ADDR, vec![REG_CONTROL, CONTROL_NORMAL_ADC_ON]),
        I2cTransaction::write_read(ADDR, vec![REG_CELL_VOLTAGE_BASE], vec![0x0E, 0x74, 0x0E, 0x42]),
        I2cTransaction::write_read(ADDR, vec![REG_TEMP_BASE], temperatures),
        I2cTransaction::write_read(ADDR, vec![REG_CURRENT_H], vec![0xFF, 0x06]),
        I2cTransaction::write_read(ADDR, vec![REG_STATUS], vec![0x80]),
        I2cTransaction::write_read(ADDR, vec![REG_FAULT_STATUS], vec![0x00]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut afe = Pb7200::new_i2c(i2c.clone(), config(2)).unwrap();

    afe.begin().unwrap();

    let snapshot = afe.snapshot();
    assert_eq!(afe.state().cell_raw(0), Some(3700));
    assert_eq!(afe.state().cell_raw(1), Some(3650));
    assert!((snapshot.temperatures[0] - 25.0).abs() < 1e-9);
    // 0xFF06 = -250 raw = -2.5 A
    assert!((snapshot.current + 2.5).abs() < 1e-9);

    i2c.done();
}

#[test]
fn absent_device_stops_after_identity_probe() {
    let expectations = [I2cTransaction::write_read(ADDR, vec![REG_DEVICE_ID], vec![0xFF])];
    let mut i2c = I2cMock::new(&expectations);
    let mut afe = Pb7200::new_i2c(i2c.clone(), config(4)).unwrap();

    assert!(matches!(afe.begin(), Err(AfeError::DeviceNotFound { id: 0xFF })));

    i2c.done();
}

#[test]
fn nack_maps_to_bus_error() {
    let expectations = [
        I2cTransaction::write_read(ADDR, vec![REG_DEVICE_ID], vec![0x00]).with_error(ErrorKind::Other),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut afe = Pb7200::new_i2c(i2c.clone(), config(4)).unwrap();

    match afe.device_id() {
        Err(AfeError::Bus { register, message }) => {
            assert_eq!(register, REG_DEVICE_ID);
            assert!(message.contains("Other"));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    i2c.done();
}

#[test]
fn balancing_is_read_modify_write() {
    let expectations = [
        I2cTransaction::write_read(ADDR, vec![REG_BALANCE_CTRL2], vec![0x0C]),
        I2cTransaction::write(ADDR, vec![REG_BALANCE_CTRL2, 0x0E]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut afe = Pb7200::new_i2c(i2c.clone(), config(12)).unwrap();

    afe.set_balancing(9, true).unwrap();

    i2c.done();
}

#[test]
fn protection_thresholds_are_written_high_byte_first() {
    let expectations = [
        I2cTransaction::write(ADDR, vec![REG_CONFIG_OVP, 0x10, 0x68]),
        I2cTransaction::write(ADDR, vec![REG_CONFIG_UVP, 0x09, 0xC4]),
        I2cTransaction::write(ADDR, vec![REG_CONFIG_OCP, 0x17, 0x70]),
        I2cTransaction::write(ADDR, vec![REG_CONFIG_OTP, 0x02, 0x8A]),
        I2cTransaction::write(ADDR, vec![REG_CONFIG_UTP, 0xFF, 0x38]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut afe = Pb7200::new_i2c(i2c.clone(), config(4)).unwrap();

    let protection = ProtectionConfig {
        over_voltage_threshold: 4.2,
        under_voltage_threshold: 2.5,
        over_current_threshold: 60.0,
        over_temp_threshold: 65.0,
        under_temp_threshold: -20.0,
        ..ProtectionConfig::default()
    };
    afe.set_protection_config(&protection).unwrap();

    i2c.done();
}

#[test]
fn shutdown_and_release() {
    let expectations = [I2cTransaction::write(ADDR, vec![REG_SHUTDOWN, SHUTDOWN_COMMAND])];
    let i2c = I2cMock::new(&expectations);
    let mut afe = Pb7200::new_i2c(i2c, config(4)).unwrap();

    afe.shutdown().unwrap();

    let mut i2c = afe.release().release();
    i2c.done();
}
