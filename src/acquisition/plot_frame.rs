// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Plot frame snapshots
//!
//! A [`PlotFrame`] is everything a renderer needs to draw the dual-axis
//! chart at one instant: the selected series with their colors, the y-limits
//! of each axis, the x tick labels and the status title. Building a frame
//! only reads the registry, so rendering never blocks acquisition for long.

use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;

use super::tracker::{Axis, SelectedSeries, Segment, TrackerRegistry};
use super::window::WindowState;

/// Series colors, left axis first then right axis
pub const PALETTE: [&str; 10] = [
    "blue", "red", "green", "orange", "purple", "brown", "pink", "gray", "olive", "cyan",
];

/// Points between two x tick labels
pub const X_TICK_SPACING: usize = 60;

/// Relative margin added above and below the configured ranges
pub const Y_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: &'static str,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxisFrame {
    pub series: Vec<Series>,
    pub y_limits: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XTick {
    pub point: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotFrame {
    pub title: String,
    pub status: String,
    pub point_count: usize,
    pub capacity: usize,
    pub progress: f64,
    pub active_count: usize,
    pub left: AxisFrame,
    pub right: AxisFrame,
    pub x_ticks: Vec<XTick>,
}

impl PlotFrame {
    /// Build a frame from the current registry and window.
    ///
    /// ### Parameters
    ///
    /// * `status` - Connection status shown in the title
    /// * `interval` - Acquisition period, used to date the x ticks
    /// * `now` - Wall-clock time of the current point
    pub fn build(
        registry: &TrackerRegistry,
        window: &WindowState,
        status: &str,
        interval: Duration,
        now: DateTime<Local>,
    ) -> Self {
        let left_selected = registry.selected_series(Axis::Left);
        let right_selected = registry.selected_series(Axis::Right);
        let right_first_color = left_selected.len();

        let left = axis_frame(left_selected, 0);
        let right = axis_frame(right_selected, right_first_color);
        let active_count = registry.active_count();
        let progress = window.progress();

        Self {
            title: title(status, progress, window, active_count),
            status: status.to_string(),
            point_count: window.current_point_count,
            capacity: window.capacity,
            progress,
            active_count,
            left,
            right,
            x_ticks: x_ticks(window, interval, now),
        }
    }

    /// Whether any series has data to draw
    pub fn has_data(&self) -> bool {
        !self.left.series.is_empty() || !self.right.series.is_empty()
    }
}

/// Series with data get consecutive palette colors starting at `first_color`.
fn axis_frame(selected: Vec<SelectedSeries>, first_color: usize) -> AxisFrame {
    let mut color_index = first_color;
    let mut bounds: Vec<f64> = Vec::new();
    let mut series = Vec::new();

    for SelectedSeries { config, segments } in selected {
        if segments.is_empty() {
            continue;
        }
        bounds.push(config.min_value);
        bounds.push(config.max_value);
        series.push(Series {
            name: config.name,
            color: PALETTE[color_index % PALETTE.len()],
            segments,
        });
        color_index += 1;
    }

    AxisFrame {
        series,
        y_limits: y_limits(&bounds),
    }
}

/// Range of `bounds` widened by [`Y_MARGIN`] on each side
pub fn y_limits(bounds: &[f64]) -> Option<(f64, f64)> {
    let min = bounds.iter().copied().reduce(f64::min)?;
    let max = bounds.iter().copied().reduce(f64::max)?;
    let margin = (max - min) * Y_MARGIN;
    Some((min - margin, max + margin))
}

/// Tick every [`X_TICK_SPACING`] points from 0 to the capacity, labelled with
/// the wall-clock time the point is (or was) acquired at.
///
/// A tick whose time is out of the representable range gets an empty label.
pub fn x_ticks(window: &WindowState, interval: Duration, now: DateTime<Local>) -> Vec<XTick> {
    let step = TimeDelta::from_std(interval).ok();
    (0..=window.capacity)
        .step_by(X_TICK_SPACING)
        .map(|point| XTick {
            point,
            label: tick_time(point, window.current_point_count, step, now)
                .map(|time| time.format("%H:%M").to_string())
                .unwrap_or_default(),
        })
        .collect()
}

fn tick_time(
    point: usize,
    current: usize,
    step: Option<TimeDelta>,
    now: DateTime<Local>,
) -> Option<DateTime<Local>> {
    let offset = i64::try_from(point).ok()? - i64::try_from(current).ok()?;
    let delta = step?.checked_mul(i32::try_from(offset).ok()?)?;
    now.checked_add_signed(delta)
}

pub fn title(status: &str, progress: f64, window: &WindowState, active_count: usize) -> String {
    format!(
        "Real-Time PLC Data Plot [{}] - Progress: {:.1}% ({}/{}) | Active: {} params",
        status, progress, window.current_point_count, window.capacity, active_count
    )
}
