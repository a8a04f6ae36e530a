// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sliding window controller
//!
//! The plot shows at most `capacity` points. Each acquisition tick advances
//! the point counter; once it reaches the capacity every tracker is cleared
//! and the time origin restarts, while acquisition carries on.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;

use super::tracker::TrackerRegistry;

/// Default number of points kept before a reset (15 minutes at 1 Hz)
pub const DEFAULT_WINDOW_CAPACITY: usize = 900;

/// Position inside the current window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowState {
    pub current_point_count: usize,
    pub window_start_time: DateTime<Local>,
    pub capacity: usize,
}

impl WindowState {
    /// Completion of the window in percent
    pub fn progress(&self) -> f64 {
        self.current_point_count as f64 / self.capacity as f64 * 100.0
    }
}

/// Shared handle on the [`WindowState`]
#[derive(Debug, Clone)]
pub struct WindowController {
    state: Arc<RwLock<WindowState>>,
}

impl WindowController {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(WindowState {
                current_point_count: 0,
                window_start_time: Local::now(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Point index the next sample will be recorded at
    pub fn current_point(&self) -> usize {
        self.snapshot().current_point_count
    }

    /// Run `f` with the current point index, holding off any concurrent
    /// [`reset_all`](Self::reset_all) until it returns.
    pub fn with_current_point<R>(&self, f: impl FnOnce(usize) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(state.current_point_count)
    }

    pub fn capacity(&self) -> usize {
        self.snapshot().capacity
    }

    pub fn snapshot(&self) -> WindowState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Advance by one point.
    ///
    /// ### Returns
    ///
    /// `true` when the window is now full and [`reset_all`](Self::reset_all) is due
    pub fn tick(&self) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.current_point_count += 1;
        state.current_point_count >= state.capacity
    }

    /// Clear every tracker and restart the window from point 0.
    pub fn reset_all(&self, registry: &TrackerRegistry) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        info!(
            "Resetting {}-point window started at {}",
            state.capacity,
            state.window_start_time.format("%H:%M:%S")
        );
        registry.clear_all();
        state.current_point_count = 0;
        state.window_start_time = Local::now();
    }
}
