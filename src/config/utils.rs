// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{validate_parameters, Config};

/// JSON schema of the YAML configuration file
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Highest accepted rounding precision
pub const MAX_DECIMAL_PLACES: u32 = 10;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./plc_monitor --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;
    println!("{}", formatted_schema);
    Ok(())
}

/// Check if a string looks like a usable PLC host
///
/// Accepts IPv4/IPv6 addresses and RFC 1123 host names.
pub fn is_valid_host(host: &str) -> bool {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Validates the configuration against rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Timing**: acquisition interval, timeouts and reconnection interval are non-zero
/// - **Window**: the capacity is at least one point
/// - **Precision**: at most [`MAX_DECIMAL_PLACES`] decimal places
/// - **Port Range**: the PLC port is non-zero
/// - **Host Format**: an unusual PLC host only produces a warning
/// - **Parameters**: inline parameters have unique names, `min <= max` and
///   a register pair that fits the address space
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.acquisition.interval_ms == 0 {
        anyhow::bail!("Acquisition interval must be greater than zero");
    }
    if config.acquisition.window_capacity == 0 {
        anyhow::bail!("Window capacity must be at least one point");
    }
    if config.acquisition.decimal_places > MAX_DECIMAL_PLACES {
        anyhow::bail!(
            "At most {} decimal places are supported, got {}",
            MAX_DECIMAL_PLACES,
            config.acquisition.decimal_places
        );
    }
    if config.plc.port == 0 {
        anyhow::bail!("Invalid PLC port number: {}", config.plc.port);
    }
    if config.plc.connect_timeout_ms == 0 || config.plc.read_timeout_ms == 0 {
        anyhow::bail!("PLC timeouts must be greater than zero");
    }
    if config.plc.reconnect_interval_secs == 0 {
        anyhow::bail!("Reconnection interval must be greater than zero");
    }
    if !is_valid_host(&config.plc.address) {
        warn!("Potentially invalid PLC address: {}", config.plc.address);
    }
    if config.data_log.file_suffix.trim().is_empty() {
        anyhow::bail!("Data log file suffix cannot be empty");
    }

    validate_parameters(&config.parameters.list).context("Invalid inline parameter list")?;

    Ok(())
}
