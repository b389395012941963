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

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ecio::{DEFAULT_REGISTER_PORT, DEFAULT_VALUE_PORT};
use crate::error::{EcioError, Result};
use crate::port::DEFAULT_PORT_DEVICE;

pub const CONFIG_ENV_VAR: &str = "HYPERFAN_ECIO_CONFIG";

const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

fn default_register_port() -> u16 { DEFAULT_REGISTER_PORT }
fn default_value_port() -> u16 { DEFAULT_VALUE_PORT }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_log_level() -> String { "info".to_string() }
fn default_device_path() -> PathBuf { PathBuf::from(DEFAULT_PORT_DEVICE) }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EcioConfig {
    #[serde(default = "default_register_port")]
    pub register_port: u16,
    #[serde(default = "default_value_port")]
    pub value_port: u16,
    /// Delay between polling passes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_device_path")]
    pub device_path: PathBuf,
}

impl Default for EcioConfig {
    fn default() -> Self {
        Self {
            register_port: default_register_port(),
            value_port: default_value_port(),
            poll_interval_ms: default_poll_interval_ms(),
            log_level: default_log_level(),
            device_path: default_device_path(),
        }
    }
}

impl EcioConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(p) = env::var(CONFIG_ENV_VAR) {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    PathBuf::from("/etc/hyperfan/ecio.json")
}

/// Loads and validates the config at `path`. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<EcioConfig> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EcioConfig::default()),
        Err(e) => return Err(e.into()),
    };
    let cfg: EcioConfig = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn load_config() -> Result<EcioConfig> {
    load_config_from(&config_path())
}

pub fn validate_config(cfg: &EcioConfig) -> Result<()> {
    if cfg.register_port == 0 {
        return Err(EcioError::config("register_port", "must be nonzero"));
    }
    if cfg.value_port == 0 {
        return Err(EcioError::config("value_port", "must be nonzero"));
    }
    if cfg.register_port == cfg.value_port {
        return Err(EcioError::config("value_port", "must differ from register_port"));
    }
    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&cfg.poll_interval_ms) {
        return Err(EcioError::config(
            "poll_interval_ms",
            format!("must be within {}..={}", MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        ));
    }
    if !LOG_LEVELS.contains(&cfg.log_level.as_str()) {
        return Err(EcioError::config("log_level", format!("unknown level '{}'", cfg.log_level)));
    }
    if cfg.device_path.as_os_str().is_empty() {
        return Err(EcioError::config("device_path", "must not be empty"));
    }
    Ok(())
}
