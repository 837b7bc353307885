//! Register transport boundary.
//!
//! The driver only needs two primitives from the bus: write N bytes starting
//! at a register, and read N bytes starting at a register. Anything that can
//! do that (a real I2C bus, a simulated register file, a test double) can
//! carry the driver.

use embedded_hal::i2c::I2c;
use std::fmt::Debug;

/// Atomic access to contiguous registers.
///
/// Implementations do not interpret the payload and perform no retries; a
/// transaction either completes or returns an error.
pub trait Transport {
    type Error: Debug;

    /// Write `bytes` to consecutive registers starting at `register`.
    fn write_bytes(&mut self, register: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buf` from consecutive registers starting at `register`.
    fn read_bytes(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn write_bytes(&mut self, register: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write_bytes(register, bytes)
    }

    fn read_bytes(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_bytes(register, buf)
    }
}

/// Register transport over an `embedded-hal` I2C bus.
///
/// Writes send the register address followed by the payload in a single
/// transaction; reads send the register address and read back with a
/// repeated start.
pub struct I2cTransport<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cTransport<I2C> {
    /// Wrap a bus, addressing the chip at the 7-bit `address`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Transport for I2cTransport<I2C> {
    type Error = I2C::Error;

    fn write_bytes(&mut self, register: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut frame = Vec::with_capacity(bytes.len() + 1);
        frame.push(register);
        frame.extend_from_slice(bytes);
        self.i2c.write(self.address, &frame)
    }

    fn read_bytes(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[register], buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x55;

    #[test]
    fn write_prefixes_register_address() {
        let expectations = [I2cTransaction::write(ADDR, vec![0x60, 0x10, 0x68])];
        let mut i2c = I2cMock::new(&expectations);
        let mut transport = I2cTransport::new(i2c.clone(), ADDR);

        transport.write_bytes(0x60, &[0x10, 0x68]).unwrap();

        i2c.done();
    }

    #[test]
    fn read_uses_write_read() {
        let expectations = [I2cTransaction::write_read(ADDR, vec![0x48], vec![0xFF, 0x06])];
        let mut i2c = I2cMock::new(&expectations);
        let mut transport = I2cTransport::new(i2c.clone(), ADDR);

        let mut buf = [0u8; 2];
        transport.read_bytes(0x48, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0x06]);

        i2c.done();
    }

    #[test]
    fn bus_errors_are_passed_through() {
        let expectations =
            [I2cTransaction::write_read(ADDR, vec![0x00], vec![0x00]).with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&expectations);
        let mut transport = I2cTransport::new(i2c.clone(), ADDR);

        let mut buf = [0u8; 1];
        assert_eq!(transport.read_bytes(0x00, &mut buf), Err(ErrorKind::Other));

        i2c.done();
    }
}
