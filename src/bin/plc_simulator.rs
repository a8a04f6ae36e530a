// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated PLC serving the configured parameters
//!
//! Every parameter gets a slow sine wave spanning its configured range, so
//! the monitor can be exercised without a real controller.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time;

use plc_monitor::config::{load_parameter_csv, Config, ParameterConfig};
use plc_monitor::modbus::{simulator, SimulatedPlc};

/// Modbus TCP server simulating a PLC
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port to listen on
    #[arg(long, default_value_t = 502)]
    port: u16,

    /// Configuration file providing the parameters
    #[arg(long, conflicts_with = "parameters")]
    config: Option<PathBuf>,

    /// Parameter CSV file (Parameter,Address,Range)
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Period of the simulated signals in seconds
    #[arg(long, default_value_t = 120.0)]
    period_secs: f64,

    /// Update interval in milliseconds
    #[arg(long, default_value_t = 500)]
    update_ms: u64,
}

/// Value of `parameter` at `elapsed` seconds, phase shifted by `index`
fn simulated_value(parameter: &ParameterConfig, index: usize, elapsed: f64, period: f64) -> f32 {
    let middle = (parameter.min_value + parameter.max_value) / 2.0;
    let amplitude = (parameter.max_value - parameter.min_value) / 2.0 * 0.8;
    let phase = index as f64 * PI / 4.0;
    (middle + amplitude * (2.0 * PI * elapsed / period + phase).sin()) as f32
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    let parameters = match (&args.config, &args.parameters) {
        (Some(path), _) => Config::from_file(path)?.load_parameters()?,
        (None, Some(path)) => load_parameter_csv(path)?,
        (None, None) => Vec::new(),
    };
    info!("Simulating {} parameter(s)", parameters.len());

    let plc = SimulatedPlc::new();
    for (index, parameter) in parameters.iter().enumerate() {
        plc.set_value(parameter.address, simulated_value(parameter, index, 0.0, args.period_secs));
        info!("  {} at %MW{}", parameter.name, parameter.address);
    }

    let listener = TcpListener::bind((args.address.as_str(), args.port))
        .await
        .with_context(|| format!("Cannot bind {}:{}", args.address, args.port))?;
    let server = tokio::spawn(simulator::serve(listener, plc.clone()));

    let updater_plc = plc.clone();
    let period = args.period_secs.max(1.0);
    let update = Duration::from_millis(args.update_ms.max(10));
    let updater = tokio::spawn(async move {
        let start = time::Instant::now();
        let mut ticker = time::interval(update);
        loop {
            ticker.tick().await;
            let elapsed = start.elapsed().as_secs_f64();
            for (index, parameter) in parameters.iter().enumerate() {
                let value = simulated_value(parameter, index, elapsed, period);
                updater_plc.set_value(parameter.address, value);
                debug!("{} = {}", parameter.name, value);
            }
        }
    });

    println!("Press Ctrl+C to stop the simulator");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down simulator...");
    updater.abort();
    server.abort();
    Ok(())
}
