// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Parameter trackers
//!
//! A [`ParameterTracker`] keeps the history of one monitored quantity as a
//! list of [`Segment`]s: one polyline per interval during which the quantity
//! was selected for display. Deselecting closes the running segment, so the
//! plot shows gaps instead of joining unrelated samples.
//!
//! All trackers live in a [`TrackerRegistry`], the single owner of the
//! name to tracker mapping and of the left/right axis selections. The
//! registry is shared between the acquisition scheduler (writer) and the
//! query surface (readers) behind a read/write lock; readers always get
//! copies.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::ParameterConfig;

/// Errors raised by registry lookups
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{0}' is configured more than once")]
    DuplicateParameter(String),
}

/// One contiguous active interval of a parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start_point: usize,
    pub points: Vec<usize>,
    pub values: Vec<f64>,
}

impl Segment {
    fn open(start_point: usize) -> Self {
        Self {
            start_point,
            points: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    fn last_point(&self) -> Option<usize> {
        self.points.last().copied()
    }
}

/// History of one monitored quantity within the current window.
///
/// The tracker is active exactly when it holds an open segment.
#[derive(Debug, Clone)]
pub struct ParameterTracker {
    config: ParameterConfig,
    segments: Vec<Segment>,
    current: Option<Segment>,
}

impl ParameterTracker {
    pub fn new(config: ParameterConfig) -> Self {
        Self {
            config,
            segments: Vec::new(),
            current: None,
        }
    }

    pub fn config(&self) -> &ParameterConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Open an empty segment at `at_point`. No-op when already active.
    pub fn start_plotting(&mut self, at_point: usize) {
        if self.current.is_none() {
            debug!("{}: segment opened at point {}", self.config.name, at_point);
            self.current = Some(Segment::open(at_point));
        }
    }

    /// Close the open segment, keeping it only if it holds data. No-op when inactive.
    pub fn stop_plotting(&mut self, at_point: usize) {
        if let Some(segment) = self.current.take() {
            debug!(
                "{}: segment closed at point {} with {} point(s)",
                self.config.name,
                at_point,
                segment.len()
            );
            if !segment.is_empty() {
                self.segments.push(segment);
            }
        }
    }

    /// Append a sample to the open segment.
    ///
    /// ### Returns
    ///
    /// `false` when inactive, or when `point_index` is not strictly after every
    /// point already recorded
    pub fn add_data_point(&mut self, point_index: usize, value: f64) -> bool {
        let last_completed = self.segments.last().and_then(Segment::last_point);
        let Some(segment) = self.current.as_mut() else {
            return false;
        };
        let last = segment.last_point().or(last_completed);
        if last.is_some_and(|last| point_index <= last) {
            warn!(
                "{}: rejected out of order point {} (last {:?})",
                self.config.name, point_index, last
            );
            return false;
        }
        segment.points.push(point_index);
        segment.values.push(value);
        true
    }

    /// All recorded samples, completed segments first then the open one.
    pub fn all_plot_data(&self) -> (Vec<usize>, Vec<f64>) {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for segment in self.segments.iter().chain(self.current.iter()) {
            points.extend_from_slice(&segment.points);
            values.extend_from_slice(&segment.values);
        }
        (points, values)
    }

    /// Individual polylines: completed segments, then the open one if it holds data.
    pub fn segments(&self) -> Vec<Segment> {
        self.segments
            .iter()
            .chain(self.current.iter().filter(|segment| !segment.is_empty()))
            .cloned()
            .collect()
    }

    /// Drop the history. An active tracker keeps plotting from point 0.
    pub fn clear_all_data(&mut self) {
        self.segments.clear();
        if self.current.is_some() {
            self.current = Some(Segment::open(0));
        }
    }
}

/// Plot axis a parameter can be selected on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    Left,
    Right,
}

/// Read-only copy of one selected series
#[derive(Debug, Clone)]
pub struct SelectedSeries {
    pub config: ParameterConfig,
    pub segments: Vec<Segment>,
}

#[derive(Debug)]
struct Registry {
    order: Vec<String>,
    trackers: HashMap<String, ParameterTracker>,
    left: Vec<String>,
    right: Vec<String>,
}

impl Registry {
    fn tracker_mut(&mut self, name: &str) -> Result<&mut ParameterTracker, TrackerError> {
        self.trackers
            .get_mut(name)
            .ok_or_else(|| TrackerError::UnknownParameter(name.to_string()))
    }

    fn tracker(&self, name: &str) -> Result<&ParameterTracker, TrackerError> {
        self.trackers
            .get(name)
            .ok_or_else(|| TrackerError::UnknownParameter(name.to_string()))
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut Vec<String> {
        match axis {
            Axis::Left => &mut self.left,
            Axis::Right => &mut self.right,
        }
    }

    fn axis(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::Left => &self.left,
            Axis::Right => &self.right,
        }
    }

    fn is_selected(&self, name: &str) -> bool {
        self.left.iter().chain(self.right.iter()).any(|n| n == name)
    }

    /// Bring the tracker's active flag in line with its axis selections.
    fn sync_activity(&mut self, name: &str, at_point: usize) -> Result<(), TrackerError> {
        let selected = self.is_selected(name);
        let tracker = self.tracker_mut(name)?;
        if selected {
            tracker.start_plotting(at_point);
        } else {
            tracker.stop_plotting(at_point);
        }
        Ok(())
    }
}

/// Shared owner of every [`ParameterTracker`], keyed by parameter name.
///
/// Cloning shares the same trackers.
#[derive(Debug, Clone)]
pub struct TrackerRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl TrackerRegistry {
    /// Create one inactive tracker per configured parameter.
    ///
    /// ### Errors
    ///
    /// [`TrackerError::DuplicateParameter`] if two parameters share a name
    pub fn new(configs: &[ParameterConfig]) -> Result<Self, TrackerError> {
        let mut order = Vec::with_capacity(configs.len());
        let mut trackers = HashMap::with_capacity(configs.len());
        for config in configs {
            if trackers.contains_key(&config.name) {
                return Err(TrackerError::DuplicateParameter(config.name.clone()));
            }
            order.push(config.name.clone());
            trackers.insert(config.name.clone(), ParameterTracker::new(config.clone()));
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(Registry {
                order,
                trackers,
                left: Vec::new(),
                right: Vec::new(),
            })),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parameter configurations in configuration order
    pub fn configs(&self) -> Vec<ParameterConfig> {
        let registry = self.read();
        registry
            .order
            .iter()
            .filter_map(|name| registry.trackers.get(name))
            .map(|tracker| tracker.config().clone())
            .collect()
    }

    pub fn is_active(&self, name: &str) -> Result<bool, TrackerError> {
        Ok(self.read().tracker(name)?.is_active())
    }

    /// Number of parameters selected on at least one axis
    pub fn active_count(&self) -> usize {
        self.read()
            .trackers
            .values()
            .filter(|tracker| tracker.is_active())
            .count()
    }

    /// Parameter names selected on `axis`, in selection order
    pub fn axis_selection(&self, axis: Axis) -> Vec<String> {
        self.read().axis(axis).to_vec()
    }

    /// Enable or disable a parameter.
    ///
    /// Enabling a parameter not yet selected on any axis puts it on the left
    /// axis. Disabling removes it from both axes.
    pub fn set_active(&self, name: &str, active: bool, at_point: usize) -> Result<(), TrackerError> {
        let mut registry = self.write();
        registry.tracker(name)?;
        if active {
            if !registry.is_selected(name) {
                registry.left.push(name.to_string());
            }
        } else {
            registry.left.retain(|n| n != name);
            registry.right.retain(|n| n != name);
        }
        registry.sync_activity(name, at_point)
    }

    /// Select or deselect a parameter on one axis.
    ///
    /// The tracker stays active while it is selected on the other axis.
    pub fn select_axis(
        &self,
        name: &str,
        axis: Axis,
        selected: bool,
        at_point: usize,
    ) -> Result<(), TrackerError> {
        let mut registry = self.write();
        registry.tracker(name)?;
        let names = registry.axis_mut(axis);
        let present = names.iter().any(|n| n == name);
        if selected && !present {
            names.push(name.to_string());
        } else if !selected {
            names.retain(|n| n != name);
        }
        registry.sync_activity(name, at_point)
    }

    /// Append one tick of values, aligned with [`configs`](Self::configs).
    ///
    /// Absent values and inactive trackers are skipped.
    pub fn append_tick(&self, point_index: usize, values: &[Option<f64>]) {
        let mut registry = self.write();
        let Registry {
            order, trackers, ..
        } = &mut *registry;
        for (name, value) in order.iter().zip(values) {
            if let (Some(value), Some(tracker)) = (value, trackers.get_mut(name)) {
                tracker.add_data_point(point_index, *value);
            }
        }
    }

    /// Concatenated samples of one parameter
    pub fn plot_data(&self, name: &str) -> Result<(Vec<usize>, Vec<f64>), TrackerError> {
        Ok(self.read().tracker(name)?.all_plot_data())
    }

    /// Individual polylines of one parameter
    pub fn segments(&self, name: &str) -> Result<Vec<Segment>, TrackerError> {
        Ok(self.read().tracker(name)?.segments())
    }

    /// Snapshot of every series selected on `axis`, in selection order
    pub fn selected_series(&self, axis: Axis) -> Vec<SelectedSeries> {
        let registry = self.read();
        registry
            .axis(axis)
            .iter()
            .filter_map(|name| registry.trackers.get(name))
            .map(|tracker| SelectedSeries {
                config: tracker.config().clone(),
                segments: tracker.segments(),
            })
            .collect()
    }

    /// Clear the history of every tracker, keeping the selections.
    pub fn clear_all(&self) {
        let mut registry = self.write();
        for tracker in registry.trackers.values_mut() {
            tracker.clear_all_data();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ParameterConfig {
        ParameterConfig {
            name: name.to_string(),
            address: 100,
            min_value: 0.0,
            max_value: 100.0,
        }
    }

    #[test]
    fn test_segments_follow_activation() {
        let mut tracker = ParameterTracker::new(config("P"));
        tracker.start_plotting(0);
        for point in 0..3 {
            assert!(tracker.add_data_point(point, point as f64));
        }
        tracker.stop_plotting(3);
        tracker.start_plotting(5);
        assert!(tracker.add_data_point(5, 5.0));
        assert!(tracker.add_data_point(6, 6.0));

        let (points, values) = tracker.all_plot_data();
        assert_eq!(points, vec![0, 1, 2, 5, 6]);
        assert_eq!(values, vec![0.0, 1.0, 2.0, 5.0, 6.0]);

        let segments = tracker.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].points, vec![0, 1, 2]);
        assert_eq!(segments[1].start_point, 5);
        assert_eq!(segments[1].points, vec![5, 6]);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut tracker = ParameterTracker::new(config("P"));
        tracker.stop_plotting(0);
        assert!(!tracker.is_active());

        tracker.start_plotting(0);
        tracker.add_data_point(0, 1.0);
        tracker.start_plotting(1);
        assert!(tracker.add_data_point(1, 2.0));
        assert_eq!(tracker.segments().len(), 1);

        tracker.stop_plotting(2);
        tracker.stop_plotting(2);
        assert!(!tracker.is_active());
        assert_eq!(tracker.segments().len(), 1);
        assert_eq!(tracker.all_plot_data().0, vec![0, 1]);
    }

    #[test]
    fn test_inactive_and_out_of_order_points_are_rejected() {
        let mut tracker = ParameterTracker::new(config("P"));
        assert!(!tracker.add_data_point(0, 1.0));

        tracker.start_plotting(3);
        assert!(tracker.add_data_point(3, 1.0));
        assert!(!tracker.add_data_point(3, 2.0));
        assert!(!tracker.add_data_point(2, 2.0));
        tracker.stop_plotting(4);

        // A new segment cannot go back before the previous one
        tracker.start_plotting(0);
        assert!(!tracker.add_data_point(1, 1.0));
        assert!(tracker.add_data_point(4, 1.0));
    }

    #[test]
    fn test_segment_opened_past_the_window_still_records() {
        // Activation seen at the last point of a window that was reset since
        let mut tracker = ParameterTracker::new(config("P"));
        tracker.start_plotting(3);
        for point in 0..3 {
            assert!(tracker.add_data_point(point, point as f64));
        }
        assert_eq!(tracker.all_plot_data().0, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_segment_is_discarded_on_stop() {
        let mut tracker = ParameterTracker::new(config("P"));
        tracker.start_plotting(0);
        tracker.stop_plotting(4);
        assert!(tracker.segments().is_empty());
        assert_eq!(tracker.all_plot_data(), (vec![], vec![]));
    }

    #[test]
    fn test_clear_reopens_active_tracker_at_zero() {
        let mut tracker = ParameterTracker::new(config("P"));
        tracker.start_plotting(10);
        tracker.add_data_point(10, 1.0);
        tracker.clear_all_data();
        assert!(tracker.is_active());
        assert!(tracker.segments().is_empty());
        assert!(tracker.add_data_point(0, 2.0));

        let mut idle = ParameterTracker::new(config("Q"));
        idle.clear_all_data();
        assert!(!idle.is_active());
    }

    #[test]
    fn test_registry_rejects_duplicates_and_unknown_names() {
        let result = TrackerRegistry::new(&[config("A"), config("A")]);
        assert_eq!(
            result.unwrap_err(),
            TrackerError::DuplicateParameter("A".into())
        );

        let registry = TrackerRegistry::new(&[config("A")]).unwrap();
        assert_eq!(
            registry.set_active("B", true, 0),
            Err(TrackerError::UnknownParameter("B".into()))
        );
        assert!(registry.plot_data("B").is_err());
    }

    #[test]
    fn test_append_tick_feeds_active_trackers_in_config_order() {
        let registry = TrackerRegistry::new(&[config("A"), config("B"), config("C")]).unwrap();
        registry.set_active("A", true, 0).unwrap();
        registry.set_active("C", true, 0).unwrap();

        registry.append_tick(0, &[Some(1.0), Some(2.0), None]);
        registry.append_tick(1, &[Some(1.5), Some(2.5), Some(3.5)]);

        assert_eq!(registry.plot_data("A").unwrap(), (vec![0, 1], vec![1.0, 1.5]));
        assert_eq!(registry.plot_data("B").unwrap(), (vec![], vec![]));
        assert_eq!(registry.plot_data("C").unwrap(), (vec![1], vec![3.5]));
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn test_axis_selection_keeps_tracker_active_while_selected() {
        let registry = TrackerRegistry::new(&[config("A"), config("B")]).unwrap();
        registry.select_axis("A", Axis::Left, true, 0).unwrap();
        registry.select_axis("A", Axis::Right, true, 0).unwrap();
        registry.select_axis("B", Axis::Right, true, 0).unwrap();
        assert_eq!(registry.axis_selection(Axis::Right), vec!["A", "B"]);

        registry.append_tick(0, &[Some(1.0), Some(2.0)]);
        registry.select_axis("A", Axis::Left, false, 1).unwrap();
        assert!(registry.is_active("A").unwrap());
        registry.append_tick(1, &[Some(1.1), Some(2.1)]);
        assert_eq!(registry.segments("A").unwrap().len(), 1);

        registry.select_axis("A", Axis::Right, false, 2).unwrap();
        assert!(!registry.is_active("A").unwrap());
        assert_eq!(registry.plot_data("A").unwrap().0, vec![0, 1]);
        assert_eq!(registry.selected_series(Axis::Right).len(), 1);
    }

    #[test]
    fn test_set_active_uses_left_axis_and_clears_both() {
        let registry = TrackerRegistry::new(&[config("A")]).unwrap();
        registry.set_active("A", true, 0).unwrap();
        assert_eq!(registry.axis_selection(Axis::Left), vec!["A"]);

        registry.select_axis("A", Axis::Right, true, 0).unwrap();
        registry.set_active("A", true, 0).unwrap();
        assert_eq!(registry.axis_selection(Axis::Left), vec!["A"]);

        registry.set_active("A", false, 1).unwrap();
        assert!(registry.axis_selection(Axis::Left).is_empty());
        assert!(registry.axis_selection(Axis::Right).is_empty());
        assert!(!registry.is_active("A").unwrap());
    }

    #[test]
    fn test_clear_all_keeps_selection() {
        let registry = TrackerRegistry::new(&[config("A")]).unwrap();
        registry.set_active("A", true, 0).unwrap();
        registry.append_tick(0, &[Some(4.0)]);
        registry.append_tick(1, &[Some(5.0)]);

        registry.clear_all();
        assert!(registry.is_active("A").unwrap());
        assert_eq!(registry.plot_data("A").unwrap(), (vec![], vec![]));

        registry.append_tick(0, &[Some(6.0)]);
        assert_eq!(registry.plot_data("A").unwrap(), (vec![0], vec![6.0]));
    }
}
