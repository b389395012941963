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

//! Gigabyte fan controller behind the ECIO port.
//!
//! The firmware exposes two register banks, each gated by a version byte at
//! its base: the primary fan-control bank at 0x900 (carries the enable
//! register that hands fan control between firmware and software) and the
//! optional extra bank at 0xC00 (two temperatures, two tachometers and two
//! duty-cycle controls).

use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ecio::{EcioPort, BYTE_SENTINEL, DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT};
use crate::error::Result;
use crate::port::PortIo;

const CONTROLLER_FAN_CONTROL_AREA: u16 = 0x900;
const CONTROLLER_VERSION_OFFSET: u16 = 0x00;
const CONTROLLER_ENABLE_REGISTER: u16 = 0x47;

const EXTRA_CONTROLLER_FAN_CONTROL_AREA: u16 = 0xC00;
const EXTRA_CONTROLLER_VERSION_OFFSET: u16 = 0x00;

const SUPPORTED_VERSION: u8 = 1;

const TEMPERATURE_OFFSETS: [u16; 2] = [0x2, 0x3];
const FAN_OFFSETS: [u16; 2] = [0xA, 0xC];
const CONTROL_OFFSETS: [u16; 2] = [0x8, 0x9];

/// Time the firmware needs after an enable transition before it reacts to
/// the new mode.
pub const ENABLE_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Enable state observed on the first successful read of the enable register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    #[default]
    Unset,
    Latched(bool),
}

impl InitialState {
    /// Records `value` unless a value is already latched.
    fn latch(&mut self, value: bool) -> bool {
        match self {
            Self::Unset => {
                *self = Self::Latched(value);
                true
            }
            Self::Latched(_) => false,
        }
    }

    pub fn value(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Latched(v) => Some(v),
        }
    }
}

/// Raw duty byte to percent, rounded to the nearest integer.
pub fn control_to_percent(raw: u8) -> f32 {
    (f32::from(raw) * 100.0 / 255.0).round()
}

/// Point-in-time copy of the cached channel readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub register_port: u16,
    pub value_port: u16,
    pub initial_state: InitialState,
    /// °C
    pub temperatures: Vec<Option<f32>>,
    /// Raw tachometer counts
    pub fans: Vec<Option<f32>>,
    /// Percent
    pub controls: Vec<Option<f32>>,
}

pub struct GigabyteController<P: PortIo> {
    port: EcioPort<P>,
    initial_state: InitialState,
    controls: Vec<Option<f32>>,
    fans: Vec<Option<f32>>,
    temperatures: Vec<Option<f32>>,
}

impl<P: PortIo> GigabyteController<P> {
    /// Probes the controller on the default port pair.
    pub fn try_create(io: P) -> Option<Self> {
        Self::try_create_at(io, DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT)
    }

    /// Probes the controller on the given port pair. Returns `None` unless the
    /// primary bank reports a supported version.
    pub fn try_create_at(io: P, register_port: u16, value_port: u16) -> Option<Self> {
        let mut port = EcioPort::new(io, register_port, value_port);

        match port.read_byte(CONTROLLER_FAN_CONTROL_AREA + CONTROLLER_VERSION_OFFSET) {
            Ok(SUPPORTED_VERSION) => {}
            Ok(version) => {
                debug!("ECIO controller at {:#X} reports unsupported version {}", register_port, version);
                return None;
            }
            Err(e) => {
                debug!("ECIO controller probe at {:#X} failed: {}", register_port, e);
                return None;
            }
        }

        let extra = matches!(
            port.read_byte(EXTRA_CONTROLLER_FAN_CONTROL_AREA + EXTRA_CONTROLLER_VERSION_OFFSET),
            Ok(SUPPORTED_VERSION)
        );
        let channels = |n: usize| if extra { vec![None; n] } else { Vec::new() };

        info!(
            "ECIO controller found at ({:#X}, {:#X}), extra bank {}",
            register_port,
            value_port,
            if extra { "present" } else { "absent" }
        );

        Some(Self {
            port,
            initial_state: InitialState::Unset,
            controls: channels(CONTROL_OFFSETS.len()),
            fans: channels(FAN_OFFSETS.len()),
            temperatures: channels(TEMPERATURE_OFFSETS.len()),
        })
    }

    /// Hands fan control to software (`true`) or back to firmware (`false`).
    pub fn enable(&mut self, enabled: bool) -> Result<()> {
        let offset = CONTROLLER_FAN_CONTROL_AREA + CONTROLLER_ENABLE_REGISTER;
        let current = self.port.read_byte(offset)? != 0;

        if self.initial_state.latch(current) {
            debug!("Latched initial enable state: {}", current);
        }

        if current != enabled {
            self.port.write_byte(offset, u8::from(enabled))?;
            info!("ECIO fan control {}", if enabled { "enabled" } else { "disabled" });
            thread::sleep(ENABLE_SETTLE_DELAY);
        }

        Ok(())
    }

    /// Puts the enable register back to the value seen on the first
    /// successful `enable` call. No-op if that never happened.
    pub fn restore(&mut self) {
        if let Some(initial) = self.initial_state.value() {
            if let Err(e) = self.enable(initial) {
                warn!("Failed to restore ECIO enable state to {}: {}", initial, e);
            }
        }
    }

    /// Raw duty byte of control channel `index`, or `0xFF` if the read fails.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.control_count()`.
    pub fn control(&mut self, index: usize) -> u8 {
        let offset = self.control_offset(index);
        self.port.read_byte(offset).unwrap_or(BYTE_SENTINEL)
    }

    /// Writes the raw duty byte of control channel `index`. A failed write is
    /// only logged.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.control_count()`.
    pub fn set_control(&mut self, index: usize, value: u8) {
        let offset = self.control_offset(index);
        if let Err(e) = self.port.write_byte(offset, value) {
            warn!("Failed to write control {} ({:#06X}): {}", index, offset, e);
        }
    }

    /// One polling pass over every channel. Channels whose read fails keep
    /// their previous value.
    pub fn update(&mut self) {
        for (slot, offset) in self.temperatures.iter_mut().zip(TEMPERATURE_OFFSETS) {
            match self.port.read_byte(EXTRA_CONTROLLER_FAN_CONTROL_AREA + offset) {
                Ok(raw) => *slot = Some(f32::from(raw)),
                Err(e) => debug!("temperature {:#X} read failed: {}", offset, e),
            }
        }

        for (slot, offset) in self.fans.iter_mut().zip(FAN_OFFSETS) {
            match self.port.read_word(EXTRA_CONTROLLER_FAN_CONTROL_AREA + offset) {
                Ok(raw) => *slot = Some(f32::from(raw)),
                Err(e) => debug!("fan {:#X} read failed: {}", offset, e),
            }
        }

        for (slot, offset) in self.controls.iter_mut().zip(CONTROL_OFFSETS) {
            match self.port.read_byte(EXTRA_CONTROLLER_FAN_CONTROL_AREA + offset) {
                Ok(raw) => *slot = Some(control_to_percent(raw)),
                Err(e) => debug!("control {:#X} read failed: {}", offset, e),
            }
        }
    }

    pub fn report(&self) -> String {
        format!(
            "Using ECIO port (0x{:X}, 0x{:X})\n",
            self.port.register_port(),
            self.port.value_port()
        )
    }

    pub fn temperatures(&self) -> &[Option<f32>] {
        &self.temperatures
    }

    pub fn fans(&self) -> &[Option<f32>] {
        &self.fans
    }

    pub fn controls(&self) -> &[Option<f32>] {
        &self.controls
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    pub fn has_extra_bank(&self) -> bool {
        !self.controls.is_empty()
    }

    pub fn initial_state(&self) -> InitialState {
        self.initial_state
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            register_port: self.port.register_port(),
            value_port: self.port.value_port(),
            initial_state: self.initial_state,
            temperatures: self.temperatures.clone(),
            fans: self.fans.clone(),
            controls: self.controls.clone(),
        }
    }

    fn control_offset(&self, index: usize) -> u16 {
        assert!(
            index < self.controls.len(),
            "control index out of range: {} (channels: {})",
            index,
            self.controls.len()
        );
        EXTRA_CONTROLLER_FAN_CONTROL_AREA + CONTROL_OFFSETS[index]
    }
}
