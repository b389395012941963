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

//! hyperfan-ecio - driver for Gigabyte embedded controllers on the ECIO port
//!
//! This library speaks the ECIO register handshake over a pair of I/O ports,
//! probes the controller's register banks, and exposes its fan, temperature
//! and duty-cycle channels together with the enable/restore lifecycle.

pub mod config;
pub mod controller;
pub mod ecio;
pub mod error;
pub mod port;
pub mod service;

#[cfg(test)]
pub mod test_utils;

pub use controller::{control_to_percent, ControllerSnapshot, GigabyteController, InitialState};
pub use ecio::{EcioPort, BYTE_SENTINEL, DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT, WORD_SENTINEL};
pub use error::{EcioError, Result};
pub use port::{DevPort, PortIo};
