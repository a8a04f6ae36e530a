// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the PLC monitor
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before it is deserialized.
//!
//! ## Configuration Structure
//!
//! - `plc`: Where the controller is and how to talk to it
//! - `acquisition`: Acquisition cadence and plot window
//! - `data_log`: CSV data log settings
//! - `parameters`: The monitored parameters, inline or from a CSV file
//!
//! ## Usage
//!
//! ```no_run
//! use plc_monitor::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("192.168.0.10".to_string()), // PLC address
//!     Some(502),                        // PLC port
//!     None,                             // Unit id
//!     Some(500),                        // Acquisition interval
//!     None,                             // Window capacity
//!     None,                             // Parameter CSV
//!     None,                             // Log directory
//!     false,                            // Disable data log
//! );
//!
//! let parameters = config.load_parameters().unwrap();
//! println!("Monitoring {} parameter(s)", parameters.len());
//! ```

pub mod acquisition;
pub mod data_log;
pub mod parameters;
pub mod plc;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

pub use acquisition::AcquisitionConfig;
pub use data_log::DataLogConfig;
pub use parameters::{
    load_parameter_csv, validate_parameters, ParameterConfig, ParameterError, ParametersConfig,
};
pub use plc::PlcConfig;
pub use utils::{is_valid_host, output_config_schema, CONFIG_SCHEMA};

/// Root configuration structure of the monitor.
///
/// Every section falls back to its defaults when absent, so an empty file is
/// a valid configuration (with no parameter to monitor).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Link to the monitored PLC.
    #[serde(default)]
    pub plc: PlcConfig,

    /// Acquisition cadence, window size and rounding.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// CSV data log.
    #[serde(default)]
    pub data_log: DataLogConfig,

    /// Monitored parameters.
    #[serde(default)]
    pub parameters: ParametersConfig,

    /// Directory of the file this configuration was loaded from, used to
    /// resolve a relative parameter file.
    #[serde(skip)]
    source_dir: Option<PathBuf>,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// A missing file is created with default values. A file failing schema
    /// validation, deserialization or the specific rules is rejected and a
    /// `.sample.yaml` with default values is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let mut default_config = Self::default();
            default_config.save_to_file(path)?;
            default_config.source_dir = path.parent().map(Path::to_path_buf);
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        if let Err(err) = Self::validate_schema(&contents) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            return Err(err.context(format!("Invalid configuration in {}", path.display())));
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let mut config: Config = match Self::parse(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        config.source_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Validate raw YAML against the embedded JSON schema.
    pub fn validate_schema(contents: &str) -> Result<()> {
        // An empty document is a null value; treat it as an empty mapping
        let yaml_value: serde_yml::Value = if contents.trim().is_empty() {
            serde_yml::Value::Null
        } else {
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?
        };
        let json_value = match serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?
        {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        validator
            .validate(&json_value)
            .map_err(|error| anyhow::anyhow!("Configuration validation failed: {}", error))
    }

    /// Deserialize YAML text, an empty document giving the defaults.
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(contents).context("Failed to deserialize configuration")
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that are provided override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `plc_address` - Host name or IP address of the PLC
    /// * `plc_port` - Modbus TCP port of the PLC
    /// * `unit_id` - Modbus unit identifier
    /// * `interval_ms` - Acquisition period in milliseconds
    /// * `window_capacity` - Points kept before the plot window resets
    /// * `parameter_file` - Parameter CSV, replacing the configured one
    /// * `log_directory` - Directory of the CSV data log
    /// * `no_data_log` - Disable the CSV data log
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        plc_address: Option<String>,
        plc_port: Option<u16>,
        unit_id: Option<u8>,
        interval_ms: Option<u64>,
        window_capacity: Option<usize>,
        parameter_file: Option<PathBuf>,
        log_directory: Option<PathBuf>,
        no_data_log: bool,
    ) {
        if let Some(address) = plc_address {
            debug!("Overriding PLC address from command line: {}", address);
            self.plc.address = address;
        }
        if let Some(port) = plc_port {
            debug!("Overriding PLC port from command line: {}", port);
            self.plc.port = port;
        }
        if let Some(unit_id) = unit_id {
            debug!("Overriding unit id from command line: {}", unit_id);
            self.plc.unit_id = unit_id;
        }
        if let Some(interval) = interval_ms {
            debug!("Overriding acquisition interval from command line: {}", interval);
            self.acquisition.interval_ms = interval;
        }
        if let Some(capacity) = window_capacity {
            debug!("Overriding window capacity from command line: {}", capacity);
            self.acquisition.window_capacity = capacity;
        }
        if let Some(file) = parameter_file {
            debug!("Overriding parameter file from command line: {:?}", file);
            // Relative to the working directory, not to the config file
            let file = std::env::current_dir()
                .map(|cwd| cwd.join(&file))
                .unwrap_or(file);
            self.parameters.file = Some(file);
        }
        if let Some(directory) = log_directory {
            debug!("Overriding data log directory from command line: {:?}", directory);
            self.data_log.directory = directory;
        }
        if no_data_log {
            debug!("Data log disabled from command line");
            self.data_log.enabled = false;
        }
    }

    /// Path of the parameter CSV, resolved against the configuration file directory
    pub fn parameter_file(&self) -> Option<PathBuf> {
        let file = self.parameters.file.as_ref()?;
        match &self.source_dir {
            Some(dir) if file.is_relative() => Some(dir.join(file)),
            _ => Some(file.clone()),
        }
    }

    /// All monitored parameters: inline definitions first, then the CSV file.
    ///
    /// The merged list is validated as a whole (unique names, ranges, addresses).
    pub fn load_parameters(&self) -> Result<Vec<ParameterConfig>> {
        let mut parameters = self.parameters.list.clone();
        if let Some(path) = self.parameter_file() {
            let from_file = load_parameter_csv(&path)?;
            info!(
                "Loaded {} parameter(s) from {}",
                from_file.len(),
                path.display()
            );
            parameters.extend(from_file);
        }
        validate_parameters(&parameters)?;
        Ok(parameters)
    }
}
