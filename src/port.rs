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

//! Raw port access.
//!
//! The driver never touches hardware directly; it is handed a [`PortIo`]
//! implementation at construction. On Linux the privileged implementation is
//! [`DevPort`], which goes through `/dev/port` and therefore needs root (or
//! `CAP_SYS_RAWIO`). Tests use in-memory fakes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{EcioError, Result};

pub const DEFAULT_PORT_DEVICE: &str = "/dev/port";

/// Single-byte access to an I/O port.
#[cfg_attr(test, mockall::automock)]
pub trait PortIo {
    fn read_port(&mut self, port: u16) -> io::Result<u8>;
    fn write_port(&mut self, port: u16, value: u8) -> io::Result<()>;
}

impl<T: PortIo + ?Sized> PortIo for Box<T> {
    fn read_port(&mut self, port: u16) -> io::Result<u8> {
        (**self).read_port(port)
    }

    fn write_port(&mut self, port: u16, value: u8) -> io::Result<()> {
        (**self).write_port(port, value)
    }
}

/// Port access through the kernel's `/dev/port` character device, where the
/// file offset is the port number.
#[derive(Debug)]
pub struct DevPort {
    path: PathBuf,
    file: File,
}

impl DevPort {
    pub fn open() -> Result<Self> {
        Self::open_path(DEFAULT_PORT_DEVICE)
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| EcioError::DeviceOpen { path: path.clone(), source })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PortIo for DevPort {
    fn read_port(&mut self, port: u16) -> io::Result<u8> {
        self.file.seek(SeekFrom::Start(u64::from(port)))?;
        let mut buf = [0u8; 1];
        self.file.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn write_port(&mut self, port: u16, value: u8) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(u64::from(port)))?;
        self.file.write_all(&[value])
    }
}
