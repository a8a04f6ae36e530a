// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the acquisition cadence and of the plot window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Time interval in milliseconds between two acquisition passes.
    ///
    /// Must be greater than zero.
    pub interval_ms: u64,

    /// Number of points kept on the plot before the window is reset.
    ///
    /// With the default interval, 900 points is a 15 minute window.
    pub window_capacity: usize,

    /// Decimal places kept when rounding decoded values
    pub decimal_places: u32,
}

impl AcquisitionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            window_capacity: 900,
            decimal_places: 3,
        }
    }
}
