// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Query surface of a running monitor
//!
//! [`PlcMonitor`] is what a display layer holds: it reads the connection
//! status, the latest values and the plot data, toggles parameters and
//! drives connect/disconnect. It shares its handles with the acquisition
//! scheduler and never blocks on acquisition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use log::info;

use crate::acquisition::{
    scheduler::status_text, AcquisitionScheduler, Axis, CurrentValue, CurrentValues, LogSink,
    PlotFrame, Segment, TrackerError, TrackerRegistry, WindowController, WindowState,
};
use crate::config::ParameterConfig;
use crate::modbus::{ConnectionManager, ConnectionState, TransportConnector};

/// Cloneable handle on the monitor state
#[derive(Clone)]
pub struct PlcMonitor {
    connection: ConnectionManager,
    registry: TrackerRegistry,
    window: WindowController,
    current: CurrentValues,
    interval: Duration,
}

impl PlcMonitor {
    /// Build the shared state for `parameters`.
    ///
    /// ### Errors
    ///
    /// [`TrackerError::DuplicateParameter`] if two parameters share a name
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        parameters: &[ParameterConfig],
        retry_interval: Duration,
        window_capacity: usize,
        interval: Duration,
    ) -> Result<Self, TrackerError> {
        let names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
        Ok(Self {
            connection: ConnectionManager::new(connector, retry_interval),
            registry: TrackerRegistry::new(parameters)?,
            window: WindowController::new(window_capacity),
            current: CurrentValues::new(&names),
            interval,
        })
    }

    /// Scheduler feeding this monitor, writing its rows to `sink`
    pub fn scheduler(&self, sink: Box<dyn LogSink>) -> AcquisitionScheduler {
        AcquisitionScheduler::new(
            self.connection.clone(),
            self.registry.clone(),
            self.window.clone(),
            self.current.clone(),
            sink,
        )
        .with_interval(self.interval)
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn status_label(&self) -> &'static str {
        self.connection.status_label()
    }

    /// Values of the last tick, `None` standing for "no data"
    pub fn current_values(&self) -> Vec<CurrentValue> {
        self.current.values()
    }

    pub fn parameters(&self) -> Vec<ParameterConfig> {
        self.registry.configs()
    }

    pub fn plot_data(&self, name: &str) -> Result<(Vec<usize>, Vec<f64>), TrackerError> {
        self.registry.plot_data(name)
    }

    pub fn segments(&self, name: &str) -> Result<Vec<Segment>, TrackerError> {
        self.registry.segments(name)
    }

    /// Enable or disable a parameter from the next point on.
    pub fn set_active(&self, name: &str, active: bool) -> Result<(), TrackerError> {
        self.window
            .with_current_point(|point| self.registry.set_active(name, active, point))
    }

    /// Select or deselect a parameter on one plot axis.
    pub fn select_axis(&self, name: &str, axis: Axis, selected: bool) -> Result<(), TrackerError> {
        self.window.with_current_point(|point| {
            self.registry.select_axis(name, axis, selected, point)
        })
    }

    pub fn window(&self) -> WindowState {
        self.window.snapshot()
    }

    /// Snapshot of the chart as it should be drawn now
    pub fn plot_frame(&self) -> PlotFrame {
        PlotFrame::build(
            &self.registry,
            &self.window.snapshot(),
            &status_text(&self.connection),
            self.interval,
            Local::now(),
        )
    }

    /// Connect to the PLC, falling back to background reconnection on failure.
    pub async fn connect(&self, host: &str, port: u16) -> bool {
        let connected = self.connection.connect(host, port).await;
        if !connected {
            info!("Starting reconnection attempts...");
            self.connection.ensure_reconnecting();
        }
        connected
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }
}
