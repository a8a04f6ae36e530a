// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Latest decoded values, shared between the scheduler and the readers.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local};
use serde::Serialize;

/// Most recent reading of one parameter; `value` is `None` when the last
/// tick could not read it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentValue {
    pub name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Default)]
struct Latest {
    timestamp: Option<DateTime<Local>>,
    values: Vec<CurrentValue>,
}

/// Thread-safe holder of the last tick's values
#[derive(Debug, Clone, Default)]
pub struct CurrentValues {
    latest: Arc<RwLock<Latest>>,
}

impl CurrentValues {
    /// Start with every parameter marked as "no data".
    pub fn new(names: &[String]) -> Self {
        let values = names
            .iter()
            .map(|name| CurrentValue {
                name: name.clone(),
                value: None,
            })
            .collect();
        Self {
            latest: Arc::new(RwLock::new(Latest {
                timestamp: None,
                values,
            })),
        }
    }

    /// Replace the values with those of a new tick, aligned with the names.
    pub fn update(&self, timestamp: DateTime<Local>, values: &[Option<f64>]) {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        latest.timestamp = Some(timestamp);
        for (current, value) in latest.values.iter_mut().zip(values) {
            current.value = *value;
        }
    }

    pub fn values(&self) -> Vec<CurrentValue> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .iter()
            .find(|current| current.name == name)
            .and_then(|current| current.value)
    }

    /// Time of the last update, `None` before the first tick
    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .timestamp
    }
}
