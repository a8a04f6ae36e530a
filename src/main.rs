// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point of the PLC register monitor

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::signal;

use plc_monitor::config::{self, Config};
use plc_monitor::daemon::Daemon;

/// Real-time monitor of PLC process values over Modbus TCP
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// PLC host name or IP address
    #[arg(short = 'a', long)]
    plc_address: Option<String>,

    /// PLC Modbus TCP port
    #[arg(short = 'p', long)]
    plc_port: Option<u16>,

    /// Modbus unit identifier
    #[arg(long)]
    unit_id: Option<u8>,

    /// Acquisition period in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of points kept before the plot window resets
    #[arg(long)]
    window_capacity: Option<usize>,

    /// Parameter CSV file (Parameter,Address,Range)
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Directory of the CSV data log
    #[arg(long)]
    log_directory: Option<PathBuf>,

    /// Do not write the CSV data log
    #[arg(long)]
    no_data_log: bool,

    /// Do not print the status line every second
    #[arg(long)]
    no_console: bool,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        let config = Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        let parameters = config.load_parameters()?;
        println!(
            "Configuration file is valid: {} ({} parameter(s))",
            validate_path.display(),
            parameters.len()
        );
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(
        args.plc_address.clone(),
        args.plc_port,
        args.unit_id,
        args.interval_ms,
        args.window_capacity,
        args.parameters.clone(),
        args.log_directory.clone(),
        args.no_data_log,
    );
    config::utils::validate_specific_rules(&config)?;

    info!(
        "Monitoring PLC at {}:{} every {} ms",
        config.plc.address, config.plc.port, config.acquisition.interval_ms
    );
    let mut daemon = Daemon::new().with_console(!args.no_console);
    daemon.launch(&config).await?;

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, terminating monitor");
        }
        Err(err) => {
            eprintln!("Error waiting for shutdown signal: {}", err);
        }
    }
    daemon.shutdown();
    daemon.join().await?;
    Ok(())
}
