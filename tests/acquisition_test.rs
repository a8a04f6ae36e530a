// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end acquisition against a simulated PLC

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::time;

use plc_monitor::acquisition::{Axis, CsvLogSink, NullLogSink};
use plc_monitor::config::ParameterConfig;
use plc_monitor::modbus::{simulator, ConnectionState, SimulatedPlc, TcpConnector};
use plc_monitor::PlcMonitor;

fn parameter(name: &str, address: u16, min_value: f64, max_value: f64) -> ParameterConfig {
    ParameterConfig {
        name: name.to_string(),
        address,
        min_value,
        max_value,
    }
}

async fn start_simulator(plc: SimulatedPlc) -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(simulator::serve(listener, plc));
    Ok(port)
}

fn monitor(parameters: &[ParameterConfig], capacity: usize, interval: Duration) -> PlcMonitor {
    let connector = TcpConnector::new(1, Duration::from_secs(2), Duration::from_secs(1));
    PlcMonitor::new(
        Arc::new(connector),
        parameters,
        Duration::from_secs(5),
        capacity,
        interval,
    )
    .unwrap()
}

#[tokio::test]
async fn test_window_of_five_points_then_reset() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let plc = SimulatedPlc::with_values(&[(10, 0.0)]);
    let port = start_simulator(plc.clone()).await?;

    let monitor = monitor(&[parameter("P", 10, 0.0, 10.0)], 5, Duration::from_secs(1));
    let mut scheduler = monitor.scheduler(Box::new(NullLogSink));
    assert!(monitor.connect("127.0.0.1", port).await);
    monitor.set_active("P", true)?;

    let mut last_frame = None;
    for value in 1..=5 {
        plc.set_value(10, value as f32);
        let report = scheduler.tick().await.expect("parameters configured");
        last_frame = report.completed_frame;
    }

    let frame = last_frame.expect("window completed on the fifth tick");
    let series = &frame.left.series[0];
    assert_eq!(series.name, "P");
    assert_eq!(series.segments[0].points, vec![0, 1, 2, 3, 4]);
    assert_eq!(series.segments[0].values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(frame.title.contains("Progress: 100.0% (5/5)"));

    assert_eq!(monitor.plot_data("P")?, (vec![], vec![]));
    assert_eq!(monitor.window().current_point_count, 0);

    monitor.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn test_csv_log_has_one_row_per_tick() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let plc = SimulatedPlc::with_values(&[(100, 21.1234), (102, 1.5)]);
    let port = start_simulator(plc.clone()).await?;
    let dir = tempdir()?;

    let parameters = [
        parameter("Temperature", 100, 0.0, 150.0),
        parameter("Pressure", 102, 0.0, 10.0),
        parameter("Missing", 200, 0.0, 1.0),
    ];
    let names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    let sink = CsvLogSink::create(dir.path(), "PLC_Data_log.csv", &names, Local::now())?;
    let log_path = sink.path().to_path_buf();

    let monitor = monitor(&parameters, 900, Duration::from_secs(1));
    let mut scheduler = monitor.scheduler(Box::new(sink));
    assert!(monitor.connect("127.0.0.1", port).await);

    scheduler.tick().await.expect("parameters configured");
    plc.remove(102);
    scheduler.tick().await.expect("parameters configured");

    let content = fs::read_to_string(&log_path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Timestamp,Temperature,Pressure,Missing");
    assert!(lines[1].ends_with(",21.123,1.5,"), "row: {}", lines[1]);
    assert!(lines[2].ends_with(",21.123,,"), "row: {}", lines[2]);
    assert_eq!(monitor.connection_status(), ConnectionState::Connected);

    monitor.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn test_run_loop_acquires_until_stopped() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let plc = SimulatedPlc::with_values(&[(0, 5.0), (2, 7.0)]);
    let port = start_simulator(plc).await?;

    let monitor = monitor(
        &[parameter("A", 0, 0.0, 10.0), parameter("B", 2, 0.0, 10.0)],
        900,
        Duration::from_millis(50),
    );
    assert!(monitor.connect("127.0.0.1", port).await);
    monitor.select_axis("A", Axis::Left, true)?;
    monitor.select_axis("B", Axis::Right, true)?;

    let running = Arc::new(AtomicBool::new(true));
    let task = tokio::spawn(monitor.scheduler(Box::new(NullLogSink)).run(running.clone()));
    time::sleep(Duration::from_millis(400)).await;
    running.store(false, Ordering::SeqCst);
    time::timeout(Duration::from_secs(2), task).await??;

    let (points, values) = monitor.plot_data("A")?;
    assert!(points.len() >= 3, "only {} point(s) acquired", points.len());
    assert!(points.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(values.iter().all(|value| *value == 5.0));

    let frame = monitor.plot_frame();
    assert_eq!(frame.left.series[0].color, "blue");
    assert_eq!(frame.right.series[0].color, "red");
    assert_eq!(frame.active_count, 2);

    monitor.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn test_values_are_absent_while_plc_is_down() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let monitor = monitor(&[parameter("A", 0, 0.0, 1.0)], 900, Duration::from_secs(1));
    let mut scheduler = monitor.scheduler(Box::new(NullLogSink));
    assert!(!monitor.connect("127.0.0.1", port).await);

    let report = scheduler.tick().await.expect("parameters configured");
    assert_eq!(report.values, vec![None]);
    assert_eq!(monitor.current_values()[0].value, None);
    assert_eq!(monitor.window().current_point_count, 1);

    monitor.disconnect().await;
    Ok(())
}
