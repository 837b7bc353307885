//! In-memory PB7200P80 register file.
//!
//! `SimulatedAfe` answers register reads and writes from a flat 256-byte
//! array, can be told to fail transactions touching chosen registers, and
//! records every write. It backs the test suite and the demos.

use crate::codec::{current_to_raw, temperature_to_raw, voltage_to_raw};
use crate::constants::*;
use crate::transport::Transport;
use std::collections::HashSet;
use thiserror::Error;

const REGISTER_FILE_SIZE: usize = 256;

/// Failure injected by [`SimulatedAfe`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("simulated bus failure at register {register:#04x}")]
pub struct SimError {
    pub register: u8,
}

/// Simulated chip behind a [`Transport`]
#[derive(Debug, Clone)]
pub struct SimulatedAfe {
    registers: [u8; REGISTER_FILE_SIZE],
    failing_reads: HashSet<u8>,
    failing_writes: HashSet<u8>,
    writes: Vec<(u8, Vec<u8>)>,
    reads: usize,
}

impl SimulatedAfe {
    /// A chip answering with identity `device_id`, all other registers zero.
    pub fn new(device_id: u8) -> Self {
        let mut registers = [0u8; REGISTER_FILE_SIZE];
        registers[REG_DEVICE_ID as usize] = device_id;
        Self {
            registers,
            failing_reads: HashSet::new(),
            failing_writes: HashSet::new(),
            writes: Vec::new(),
            reads: 0,
        }
    }

    pub fn register(&self, address: u8) -> u8 {
        self.registers[address as usize]
    }

    pub fn set_register(&mut self, address: u8, value: u8) {
        self.registers[address as usize] = value;
    }

    pub fn set_cell_voltage(&mut self, index: u8, volts: f64) {
        self.set_pair(cell_voltage_register(index), voltage_to_raw(volts).to_be_bytes());
    }

    pub fn set_temperature(&mut self, index: u8, celsius: f64) {
        self.set_pair(temperature_register(index), temperature_to_raw(celsius).to_be_bytes());
    }

    pub fn set_current(&mut self, amps: f64) {
        self.set_pair(REG_CURRENT_H, current_to_raw(amps).to_be_bytes());
    }

    fn set_pair(&mut self, address: u8, bytes: [u8; 2]) {
        self.registers[address as usize] = bytes[0];
        self.registers[address as usize + 1] = bytes[1];
    }

    /// Make every read touching `address` fail.
    pub fn fail_reads_at(&mut self, address: u8) {
        self.failing_reads.insert(address);
    }

    /// Make every write touching `address` fail.
    pub fn fail_writes_at(&mut self, address: u8) {
        self.failing_writes.insert(address);
    }

    pub fn clear_failures(&mut self) {
        self.failing_reads.clear();
        self.failing_writes.clear();
    }

    /// Successful writes in order, as `(register, payload)`.
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Number of read transactions attempted so far.
    pub fn read_count(&self) -> usize {
        self.reads
    }

    /// Addresses touched by a transfer. Transfers running past 0xFF fail
    /// instead of wrapping to 0x00.
    fn span(register: u8, len: usize) -> Result<impl Iterator<Item = u8>, SimError> {
        let end = register as usize + len;
        if end > REGISTER_FILE_SIZE {
            return Err(SimError { register });
        }
        Ok((register as usize..end).map(|address| address as u8))
    }
}

impl Transport for SimulatedAfe {
    type Error = SimError;

    fn write_bytes(&mut self, register: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if let Some(bad) = Self::span(register, bytes.len())?.find(|a| self.failing_writes.contains(a)) {
            return Err(SimError { register: bad });
        }
        for (address, byte) in Self::span(register, bytes.len())?.zip(bytes) {
            self.registers[address as usize] = *byte;
        }
        self.writes.push((register, bytes.to_vec()));
        Ok(())
    }

    fn read_bytes(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.reads += 1;
        if let Some(bad) = Self::span(register, buf.len())?.find(|a| self.failing_reads.contains(a)) {
            return Err(SimError { register: bad });
        }
        for (address, slot) in Self::span(register, buf.len())?.zip(buf.iter_mut()) {
            *slot = self.registers[address as usize];
        }
        Ok(())
    }
}
