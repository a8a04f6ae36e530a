// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition module
//!
//! This module turns periodic register reads into time series:
//!
//! - [`AcquisitionScheduler`]: the fixed-cadence acquisition loop
//! - [`TrackerRegistry`] and [`ParameterTracker`]: segmented history per parameter
//! - [`WindowController`]: bounded window with periodic reset
//! - [`LogSink`]: per-tick CSV data log
//! - [`CurrentValues`]: the latest decoded values
//! - [`PlotFrame`]: snapshot of everything needed to draw the chart

pub mod current_values;
pub mod log_sink;
pub mod plot_frame;
pub mod scheduler;
pub mod tracker;
pub mod window;

pub use current_values::{CurrentValue, CurrentValues};
pub use log_sink::{CsvLogSink, LogRow, LogSink, LogSinkError, NullLogSink};
pub use plot_frame::PlotFrame;
pub use scheduler::{AcquisitionScheduler, TickReport};
pub use tracker::{Axis, ParameterTracker, Segment, TrackerError, TrackerRegistry};
pub use window::{WindowController, WindowState};
