// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! One-shot client reading and decoding PLC `REAL` values

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use plc_monitor::config::parameters::parse_address;
use plc_monitor::modbus::decoder::{decode_register_pair, to_engineering, REGISTER_COUNT};
use plc_monitor::modbus::{RegisterTransport, TcpConnector, TransportConnector};

/// Read register pairs from a PLC and print them as floats
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// PLC address
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// PLC Modbus TCP port
    #[arg(long, default_value_t = 502)]
    port: u16,

    /// Modbus unit identifier
    #[arg(long, default_value_t = 1)]
    unit_id: u8,

    /// First register of the value, with or without the %MW prefix
    #[arg(long, default_value = "%MW0")]
    register: String,

    /// Number of consecutive values to read
    #[arg(long, default_value_t = 1)]
    count: u16,

    /// Decimal places of the printed values
    #[arg(long, default_value_t = 3)]
    decimal_places: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let first = parse_address(&args.register)
        .with_context(|| format!("Invalid register address '{}'", args.register))?;

    println!("Connecting to PLC at {}:{}", args.address, args.port);
    let connector = TcpConnector::new(args.unit_id, Duration::from_secs(3), Duration::from_secs(1));
    let mut transport = connector.open(&args.address, args.port).await?;

    for index in 0..args.count {
        let address = index
            .checked_mul(REGISTER_COUNT)
            .and_then(|offset| first.checked_add(offset))
            .context("Register address out of range")?;
        match transport.read_holding_registers(address, REGISTER_COUNT).await {
            Ok(words) => {
                let value = decode_register_pair(&words)?;
                println!(
                    "%MW{}: {:04X} {:04X} = {}",
                    address,
                    words[0],
                    words[1],
                    to_engineering(value, args.decimal_places)
                );
            }
            Err(e) => println!("%MW{}: {}", address, e),
        }
    }

    transport.close().await;
    Ok(())
}
