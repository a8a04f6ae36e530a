// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC connection configuration
//!
//! This module defines where the monitored controller lives and how patient
//! the client is with it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the Modbus TCP link to the PLC.
///
/// # Fields
///
/// * `address` - Host name or IP address of the PLC (default: 127.0.0.1)
/// * `port` - Modbus TCP port (default: 502)
/// * `unit_id` - Modbus unit identifier (default: 1)
/// * `connect_timeout_ms` - Upper bound for opening the link
/// * `read_timeout_ms` - Upper bound for one register read
/// * `reconnect_interval_secs` - Delay between two reconnection attempts
/// * `auto_connect` - Connect as soon as the monitor starts
///
/// # Example
///
/// ```
/// use plc_monitor::config::PlcConfig;
///
/// let plc = PlcConfig {
///     address: "192.168.0.10".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(plc.port, 502);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    pub address: String,
    pub port: u16,
    pub unit_id: u8,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub reconnect_interval_secs: u64,
    pub auto_connect: bool,
}

impl PlcConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 502, // Standard Modbus TCP port
            unit_id: 1,
            connect_timeout_ms: 3000,
            read_timeout_ms: 1000,
            reconnect_interval_secs: 5,
            auto_connect: true,
        }
    }
}
