// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition scheduler
//!
//! One [`AcquisitionScheduler::tick`] is one acquisition pass:
//!
//! 1. liveness check (or kick the reconnection when the link is down)
//! 2. read and decode every parameter in configuration order
//! 3. write the log row and publish the current values
//! 4. feed the active trackers at the current point index
//! 5. advance the window, rendering and resetting it when full
//!
//! A failure on one parameter never affects the others and nothing here is
//! fatal: an unreadable value is simply absent for this tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use tokio::time::{interval, MissedTickBehavior};

use super::current_values::CurrentValues;
use super::log_sink::{LogRow, LogSink};
use super::plot_frame::PlotFrame;
use super::tracker::TrackerRegistry;
use super::window::WindowController;
use crate::modbus::decoder::{decode_register_pair, to_engineering, REGISTER_COUNT};
use crate::modbus::{ConnectionManager, ConnectionState, ReadError};

/// Default acquisition period
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Default rounding of decoded values
pub const DEFAULT_DECIMAL_PLACES: u32 = 3;

/// Outcome of one acquisition pass
#[derive(Debug, Clone)]
pub struct TickReport {
    pub timestamp: DateTime<Local>,
    /// Point index the values were recorded at
    pub point: usize,
    /// One entry per parameter, in configuration order
    pub values: Vec<Option<f64>>,
    /// Frame rendered just before the window reset, if this tick filled it
    pub completed_frame: Option<PlotFrame>,
}

impl TickReport {
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }
}

/// Drives the acquisition cadence.
pub struct AcquisitionScheduler {
    connection: ConnectionManager,
    registry: TrackerRegistry,
    window: WindowController,
    current: CurrentValues,
    sink: Box<dyn LogSink>,
    interval: Duration,
    decimal_places: u32,
}

impl AcquisitionScheduler {
    pub fn new(
        connection: ConnectionManager,
        registry: TrackerRegistry,
        window: WindowController,
        current: CurrentValues,
        sink: Box<dyn LogSink>,
    ) -> Self {
        Self {
            connection,
            registry,
            window,
            current,
            sink,
            interval: DEFAULT_INTERVAL,
            decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_decimal_places(mut self, decimal_places: u32) -> Self {
        self.decimal_places = decimal_places;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one acquisition pass.
    ///
    /// Returns `None` when no parameter is configured; the window does not
    /// advance in that case.
    pub async fn tick(&mut self) -> Option<TickReport> {
        match self.connection.state() {
            ConnectionState::Connected => {
                if !self.connection.check_liveness().await {
                    warn!("PLC liveness check failed");
                }
            }
            ConnectionState::Disconnected => self.connection.ensure_reconnecting(),
            ConnectionState::Reconnecting | ConnectionState::ManuallyDisconnected => {}
        }

        let configs = self.registry.configs();
        if configs.is_empty() {
            debug!("No parameter configured, skipping acquisition");
            return None;
        }

        let mut values = Vec::with_capacity(configs.len());
        for config in &configs {
            values.push(self.read_parameter(&config.name, config.address).await);
        }

        let timestamp = Local::now();
        let row = LogRow {
            timestamp,
            values: values.clone(),
        };
        if let Err(e) = self.sink.write_row(&row) {
            warn!("Could not write data log row: {}", e);
        }
        self.current.update(timestamp, &values);

        let point = self.window.current_point();
        self.registry.append_tick(point, &values);

        let completed_frame = if self.window.tick() {
            let frame = PlotFrame::build(
                &self.registry,
                &self.window.snapshot(),
                &self.status_text(),
                self.interval,
                timestamp,
            );
            info!("{}", frame.title);
            self.window.reset_all(&self.registry);
            Some(frame)
        } else {
            None
        };

        Some(TickReport {
            timestamp,
            point,
            values,
            completed_frame,
        })
    }

    async fn read_parameter(&self, name: &str, address: u16) -> Option<f64> {
        let words = match self.connection.read_registers(address, REGISTER_COUNT).await {
            Ok(words) => words,
            Err(ReadError::NotConnected) => return None,
            Err(e) => {
                warn!("{}: {}", name, e);
                return None;
            }
        };
        match decode_register_pair(&words) {
            Ok(raw) => Some(to_engineering(raw, self.decimal_places)),
            Err(e) => {
                warn!("{}: cannot decode register {}: {}", name, address, e);
                None
            }
        }
    }

    fn status_text(&self) -> String {
        status_text(&self.connection)
    }

    /// Tick on a fixed period until `running` is cleared.
    ///
    /// Passes never overlap; a late pass delays the following ones instead
    /// of bursting to catch up.
    pub async fn run(mut self, running: Arc<AtomicBool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Acquisition started, period {:?}", self.interval);

        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if let Some(report) = self.tick().await {
                debug!(
                    "Point {}: {}/{} value(s) read",
                    report.point,
                    report.present_count(),
                    report.values.len()
                );
            }
        }
        info!("Acquisition stopped");
    }
}

/// Title status: "Connected" while the link is up, the status label otherwise
pub fn status_text(connection: &ConnectionManager) -> String {
    if connection.is_connected() {
        "Connected".to_string()
    } else {
        connection.status_label().to_string()
    }
}
