// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Monitored parameter configuration
//!
//! Parameters come from the `parameters.list` section of the YAML file, from
//! a CSV file referenced by `parameters.file`, or both (inline entries
//! first). The CSV layout is the one exported by the PLC programming tool:
//!
//! ```text
//! Parameter,Address,Range
//! Temperature,%MW100,0-150
//! Offset,%MW104,-10--5
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Word address prefix used by the PLC tooling
pub const ADDRESS_PREFIX: &str = "%MW";

/// One monitored quantity.
///
/// `address` is the first of the two holding registers carrying the value;
/// `min_value` and `max_value` are the display range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    pub address: u16,
    pub min_value: f64,
    pub max_value: f64,
}

/// The `parameters` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParametersConfig {
    /// Optional parameter CSV, relative paths are resolved against the config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Inline parameter definitions
    pub list: Vec<ParameterConfig>,
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("cannot read parameter file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("parameter file {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("parameter file {path}, line {line}: {message}")]
    Row {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("parameter '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("parameter name cannot be empty")]
    EmptyName,

    #[error("parameter '{name}': min value {min} is greater than max value {max}")]
    InvalidRange { name: String, min: f64, max: f64 },

    #[error("parameter '{name}': register pair at {address} exceeds the address space")]
    InvalidAddress { name: String, address: u16 },
}

/// Parse a word address, with or without the `%MW` prefix.
pub fn parse_address(text: &str) -> Option<u16> {
    let text = text.trim();
    let digits = text.strip_prefix(ADDRESS_PREFIX).unwrap_or(text);
    digits.trim().parse().ok()
}

/// Parse a `min-max` range. Both bounds may be negative (`-10--5`).
pub fn parse_range(text: &str) -> Option<(f64, f64)> {
    let text = text.trim();
    text.char_indices()
        .filter(|(index, c)| *c == '-' && *index > 0)
        .find_map(|(index, _)| {
            let min = text[..index].trim().parse::<f64>().ok()?;
            let max = text[index + 1..].trim().parse::<f64>().ok()?;
            Some((min, max))
        })
}

/// Load parameters from a CSV file with a `Parameter,Address,Range` header.
///
/// Columns are matched by name, so their order does not matter and extra
/// columns are ignored.
pub fn load_parameter_csv(path: &Path) -> Result<Vec<ParameterConfig>, ParameterError> {
    let read_error = |source| ParameterError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_error)?;

    let headers = reader.headers().map_err(read_error)?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .ok_or_else(|| ParameterError::MissingColumn {
                path: path.to_path_buf(),
                column: name,
            })
    };
    let name_col = column("Parameter")?;
    let address_col = column("Address")?;
    let range_col = column("Range")?;

    let mut parameters = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(read_error)?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);
        let row_error = |message: String| ParameterError::Row {
            path: path.to_path_buf(),
            line,
            message,
        };

        let name = record.get(name_col).unwrap_or_default();
        if name.is_empty() {
            return Err(row_error("empty parameter name".to_string()));
        }
        let address_text = record.get(address_col).unwrap_or_default();
        let address = parse_address(address_text)
            .ok_or_else(|| row_error(format!("invalid address '{}'", address_text)))?;
        let range_text = record.get(range_col).unwrap_or_default();
        let (min_value, max_value) = parse_range(range_text)
            .ok_or_else(|| row_error(format!("invalid range '{}'", range_text)))?;

        parameters.push(ParameterConfig {
            name: name.to_string(),
            address,
            min_value,
            max_value,
        });
    }
    Ok(parameters)
}

/// Check the rules shared by every parameter source.
pub fn validate_parameters(parameters: &[ParameterConfig]) -> Result<(), ParameterError> {
    let mut seen = HashSet::new();
    for parameter in parameters {
        if parameter.name.trim().is_empty() {
            return Err(ParameterError::EmptyName);
        }
        if !seen.insert(parameter.name.as_str()) {
            return Err(ParameterError::DuplicateName(parameter.name.clone()));
        }
        if parameter.min_value.is_nan()
            || parameter.max_value.is_nan()
            || parameter.min_value > parameter.max_value
        {
            return Err(ParameterError::InvalidRange {
                name: parameter.name.clone(),
                min: parameter.min_value,
                max: parameter.max_value,
            });
        }
        if parameter.address == u16::MAX {
            return Err(ParameterError::InvalidAddress {
                name: parameter.name.clone(),
                address: parameter.address,
            });
        }
    }
    Ok(())
}
