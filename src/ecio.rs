/*
 * This file is part of Hyperfan.
 *
 * Copyright (C) 2025 Hyperfan contributors
 *
 * Hyperfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Hyperfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Hyperfan. If not, see <https://www.gnu.org/licenses/>.
 */

//! ECIO register protocol.
//!
//! Each register access is a four-phase handshake on a (register port, value
//! port) pair: a command byte on the register port, the high and low bytes of
//! the 16-bit register offset on the value port, then either the data byte
//! (write) or a result byte read back from the value port (read). Every byte
//! written must be preceded and followed by the controller reporting its input
//! buffer empty; a read result is collected only after the controller reports
//! its output buffer full. Each wait is bounded, so an absent or wedged
//! controller costs at most about a second per phase.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{EcioError, Result};
use crate::port::PortIo;

pub const DEFAULT_REGISTER_PORT: u16 = 0x3F4;
pub const DEFAULT_VALUE_PORT: u16 = 0x3F0;

/// Value reported in place of a byte that could not be read.
pub const BYTE_SENTINEL: u8 = 0xFF;
/// Value reported in place of a word that could not be read.
pub const WORD_SENTINEL: u16 = 0xFFFF;

const COMMAND_READ: u8 = 0xB0;
const COMMAND_WRITE: u8 = 0xB1;

const STATUS_OUTPUT_BUFFER_FULL: u8 = 0x01;
const STATUS_INPUT_BUFFER_FULL: u8 = 0x02;

pub const WAIT_TIMEOUT: Duration = Duration::from_millis(1000);
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handle on one ECIO controller.
///
/// All operations take `&mut self`: a handshake must never interleave with
/// another one on the same port pair.
#[derive(Debug)]
pub struct EcioPort<P: PortIo> {
    register_port: u16,
    value_port: u16,
    io: P,
}

impl<P: PortIo> EcioPort<P> {
    pub fn new(io: P, register_port: u16, value_port: u16) -> Self {
        Self { register_port, value_port, io }
    }

    /// Handle on the default 0x3F4 / 0x3F0 port pair.
    pub fn with_default_ports(io: P) -> Self {
        Self::new(io, DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT)
    }

    pub fn register_port(&self) -> u16 {
        self.register_port
    }

    pub fn value_port(&self) -> u16 {
        self.value_port
    }

    pub fn read_byte(&mut self, offset: u16) -> Result<u8> {
        self.send_address(COMMAND_READ, offset)?;
        self.read_from_value()
    }

    pub fn write_byte(&mut self, offset: u16, value: u8) -> Result<()> {
        self.send_address(COMMAND_WRITE, offset)?;
        self.write_to_value(value)
    }

    /// Little-endian word from `offset` and `offset + 1`. If the second byte
    /// fails the first one is discarded.
    pub fn read_word(&mut self, offset: u16) -> Result<u16> {
        let low = self.read_byte(offset)?;
        let high = self.read_byte(offset.wrapping_add(1))?;
        Ok(u16::from_le_bytes([low, high]))
    }

    pub fn write_word(&mut self, offset: u16, value: u16) -> Result<()> {
        let [low, high] = value.to_le_bytes();
        self.write_byte(offset, low)?;
        self.write_byte(offset.wrapping_add(1), high)
    }

    fn send_address(&mut self, command: u8, offset: u16) -> Result<()> {
        let [high, low] = offset.to_be_bytes();
        self.write_to_register(command)?;
        self.write_to_value(high)?;
        self.write_to_value(low)
    }

    fn write_to_register(&mut self, value: u8) -> Result<()> {
        self.wait_input_buffer_empty()?;
        self.write(self.register_port, value)?;
        self.wait_input_buffer_empty()
    }

    fn write_to_value(&mut self, value: u8) -> Result<()> {
        self.wait_input_buffer_empty()?;
        self.write(self.value_port, value)?;
        self.wait_input_buffer_empty()
    }

    fn read_from_value(&mut self) -> Result<u8> {
        self.wait_output_buffer_full()?;
        self.read(self.value_port)
    }

    fn wait_input_buffer_empty(&mut self) -> Result<()> {
        let port = self.register_port;
        self.wait_status(
            |status| status & STATUS_INPUT_BUFFER_FULL == 0,
            EcioError::InputBufferTimeout { port },
        )
    }

    fn wait_output_buffer_full(&mut self) -> Result<()> {
        let port = self.register_port;
        self.wait_status(
            |status| status & STATUS_OUTPUT_BUFFER_FULL != 0,
            EcioError::OutputBufferTimeout { port },
        )
    }

    fn wait_status(&mut self, ready: impl Fn(u8) -> bool, timeout: EcioError) -> Result<()> {
        let started = Instant::now();
        loop {
            if ready(self.read(self.register_port)?) {
                return Ok(());
            }
            if started.elapsed() > WAIT_TIMEOUT {
                debug!("{}", timeout);
                return Err(timeout);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn read(&mut self, port: u16) -> Result<u8> {
        self.io
            .read_port(port)
            .map_err(|source| EcioError::Port { port, source })
    }

    fn write(&mut self, port: u16, value: u8) -> Result<()> {
        self.io
            .write_port(port, value)
            .map_err(|source| EcioError::Port { port, source })
    }
}
