// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! CSV data log configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where and whether acquired rows are written.
///
/// The log file is named `<YYYY-mm-dd_HH-MM>_<file_suffix>` after the
/// session start time and placed in `directory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLogConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub file_suffix: String,
}

impl Default for DataLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("."),
            file_suffix: "PLC_Data_log.csv".to_string(),
        }
    }
}
