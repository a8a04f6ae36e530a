// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::acquisition::{CsvLogSink, LogSink, NullLogSink};
use crate::config::Config;
use crate::modbus::TcpConnector;
use crate::monitor::PlcMonitor;

/// Period of the console status line
const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the set of background tasks of a running monitor
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    monitor: Option<PlcMonitor>,
    console: bool,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            monitor: None,
            console: true,
        }
    }

    /// Enable or disable the console status line
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Monitor handle, available once [`launch`](Self::launch) succeeded
    pub fn monitor(&self) -> Option<&PlcMonitor> {
        self.monitor.as_ref()
    }

    /// Launch all configured tasks based on configuration
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let parameters = config
            .load_parameters()
            .context("Failed to load the monitored parameters")?;
        if parameters.is_empty() {
            warn!("No parameter configured, nothing will be acquired");
        }

        let connector = TcpConnector::new(
            config.plc.unit_id,
            config.plc.connect_timeout(),
            config.plc.read_timeout(),
        );
        let monitor = PlcMonitor::new(
            Arc::new(connector),
            &parameters,
            config.plc.reconnect_interval(),
            config.acquisition.window_capacity,
            config.acquisition.interval(),
        )?;

        if config.plc.auto_connect {
            monitor.connect(&config.plc.address, config.plc.port).await;
        }

        let sink = Self::open_log_sink(config, &parameters);
        self.start_acquisition(&monitor, sink, config.acquisition.decimal_places);
        if self.console {
            self.start_status_renderer(&monitor);
        }

        self.monitor = Some(monitor);
        Ok(())
    }

    /// Open the CSV log; a log that cannot be created only disables logging.
    fn open_log_sink(
        config: &Config,
        parameters: &[crate::config::ParameterConfig],
    ) -> Box<dyn LogSink> {
        if !config.data_log.enabled {
            info!("Data log disabled");
            return Box::new(NullLogSink);
        }
        let names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
        match CsvLogSink::create(
            &config.data_log.directory,
            &config.data_log.file_suffix,
            &names,
            Local::now(),
        ) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                warn!("Could not create data log, continuing without it: {}", e);
                Box::new(NullLogSink)
            }
        }
    }

    /// Start the acquisition scheduler task
    fn start_acquisition(
        &mut self,
        monitor: &PlcMonitor,
        sink: Box<dyn LogSink>,
        decimal_places: u32,
    ) {
        info!("Starting data acquisition task");
        let scheduler = monitor.scheduler(sink).with_decimal_places(decimal_places);
        let running = self.running.clone();
        let task = tokio::spawn(async move {
            scheduler.run(running).await;
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Start the task printing the status line every second
    fn start_status_renderer(&mut self, monitor: &PlcMonitor) {
        debug!("Starting console status renderer");
        let monitor = monitor.clone();
        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                println!("{}", render_status(&monitor));
                time::sleep(RENDER_INTERVAL).await;
            }
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete, then close the PLC link
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Err(e)) => log::error!("Task failed: {}", e),
                Err(e) => log::error!("Task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        if let Some(monitor) = self.monitor {
            monitor.disconnect().await;
        }
        Ok(())
    }
}

/// Two-line console rendering: the plot title, then every current value
pub fn render_status(monitor: &PlcMonitor) -> String {
    let frame = monitor.plot_frame();
    let values = monitor
        .current_values()
        .into_iter()
        .map(|current| match current.value {
            Some(value) => format!("{} = {}", current.name, value),
            None => format!("{} = no data", current.name),
        })
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{}\n  {}", frame.title, values)
}
