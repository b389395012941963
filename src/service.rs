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

//! Diagnostic polling session.
//!
//! A session owns the controller for its whole lifetime and puts the enable
//! register back to its pre-session value when it ends, whether it returns
//! normally, fails, or is interrupted.

use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::controller::{ControllerSnapshot, GigabyteController};
use crate::error::{EcioError, Result};
use crate::port::PortIo;

const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Number of polling passes; 0 polls until shutdown is requested.
    pub polls: u32,
    pub interval: Duration,
    pub json: bool,
    /// Take fan control from the firmware for the session.
    pub enable: bool,
    /// Raw duty byte to write to one control channel before polling.
    pub set_control: Option<(usize, u8)>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            polls: 0,
            interval: Duration::from_secs(1),
            json: false,
            enable: false,
            set_control: None,
        }
    }
}

/// Calls `restore()` on the wrapped controller when dropped.
pub struct RestoreGuard<P: PortIo> {
    controller: GigabyteController<P>,
}

impl<P: PortIo> RestoreGuard<P> {
    pub fn new(controller: GigabyteController<P>) -> Self {
        Self { controller }
    }
}

impl<P: PortIo> Deref for RestoreGuard<P> {
    type Target = GigabyteController<P>;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl<P: PortIo> DerefMut for RestoreGuard<P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.controller
    }
}

impl<P: PortIo> Drop for RestoreGuard<P> {
    fn drop(&mut self) {
        debug!("Session ending, restoring initial enable state");
        self.controller.restore();
    }
}

/// One human-readable line for a snapshot.
pub fn format_snapshot(snapshot: &ControllerSnapshot) -> String {
    if snapshot.controls.is_empty() {
        return "extra bank not present".to_string();
    }

    fn fmt(values: &[Option<f32>], prefix: &str, unit: &str) -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Some(v) => format!("{}{}: {:.0}{}", prefix, i + 1, v, unit),
                None => format!("{}{}: --", prefix, i + 1),
            })
            .collect::<Vec<_>>()
            .join("  ")
    }

    format!(
        "{} | {} | {}",
        fmt(&snapshot.temperatures, "temp", " °C"),
        fmt(&snapshot.fans, "fan", ""),
        fmt(&snapshot.controls, "ctrl", "%"),
    )
}

fn write_snapshot(out: &mut impl Write, snapshot: &ControllerSnapshot, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(snapshot)?)?;
    } else {
        writeln!(out, "{}", format_snapshot(snapshot))?;
    }
    Ok(())
}

/// Sleeps for `duration`, returning early once `shutdown` is set.
fn sleep_until_shutdown(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SHUTDOWN_CHECK_INTERVAL.min(deadline - now));
    }
}

pub fn run_session<P: PortIo>(
    controller: GigabyteController<P>,
    opts: &SessionOptions,
    shutdown: &AtomicBool,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = RestoreGuard::new(controller);
    write!(out, "{}", session.report())?;

    if opts.enable {
        session.enable(true)?;
    }

    if let Some((index, raw)) = opts.set_control {
        if index >= session.control_count() {
            return Err(EcioError::config(
                "set_control",
                format!("index {} out of range ({} control channels)", index, session.control_count()),
            ));
        }
        info!("Setting control {} to raw {:#04X}", index, raw);
        session.set_control(index, raw);
    }

    let mut passes = 0u32;
    while !shutdown.load(Ordering::SeqCst) {
        session.update();
        write_snapshot(out, &session.snapshot(), opts.json)?;
        out.flush()?;

        passes += 1;
        if opts.polls != 0 && passes >= opts.polls {
            break;
        }
        sleep_until_shutdown(opts.interval, shutdown);
    }

    info!("Polling session finished after {} pass(es)", passes);
    Ok(())
}
