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

//! Error type shared by the port driver, the controller and the config loader.

use std::io;
use std::path::PathBuf;

/// Result type alias using EcioError
pub type Result<T> = std::result::Result<T, EcioError>;

#[derive(thiserror::Error, Debug)]
pub enum EcioError {
    // ============================================================================
    // Handshake Errors
    // ============================================================================
    #[error("Timed out waiting for input buffer empty on port {port:#06X}")]
    InputBufferTimeout {
        port: u16,
    },

    #[error("Timed out waiting for output buffer full on port {port:#06X}")]
    OutputBufferTimeout {
        port: u16,
    },

    #[error("Port I/O failed on {port:#06X}: {source}")]
    Port {
        port: u16,
        source: io::Error,
    },

    // ============================================================================
    // Device and Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open port device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    Config {
        field: String,
        reason: String,
    },
}

impl EcioError {
    /// Create an invalid configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by the register handshake itself (as opposed to
    /// configuration or device setup).
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::InputBufferTimeout { .. } | Self::OutputBufferTimeout { .. } | Self::Port { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_uses_hex_port() {
        let err = EcioError::InputBufferTimeout { port: 0x3F4 };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for input buffer empty on port 0x03F4"
        );
        let err = EcioError::OutputBufferTimeout { port: 0x3F4 };
        assert!(err.to_string().contains("output buffer full"));
    }

    #[test]
    fn test_is_handshake() {
        assert!(EcioError::InputBufferTimeout { port: 1 }.is_handshake());
        assert!(EcioError::OutputBufferTimeout { port: 1 }.is_handshake());
        assert!(EcioError::Port {
            port: 1,
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        }
        .is_handshake());
        assert!(!EcioError::config("register_port", "must be nonzero").is_handshake());
    }

    #[test]
    fn test_config_helper() {
        let err = EcioError::config("poll_interval_ms", "too small");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for poll_interval_ms: too small"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<u8>("nope").unwrap_err();
        let err: EcioError = parse_err.into();
        assert!(matches!(err, EcioError::Json(_)));
    }
}
