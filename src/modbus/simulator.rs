// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated PLC
//!
//! A Modbus TCP server exposing an in-memory register bank. It stands in for
//! a real controller during development and in the integration tests: floats
//! are stored as register pairs with the same word order the monitor decodes.
//!
//! Holding registers are readable and writable, input registers mirror the
//! holding bank read-only. Reading or writing an unmapped register answers
//! `IllegalDataAddress`, any other function code answers `IllegalFunction`.

use std::{
    collections::HashMap,
    future,
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use super::decoder::{decode_f32, encode_f32};

/// In-memory controller shared by every client connection
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlc {
    registers: Arc<Mutex<HashMap<u16, u16>>>,
}

impl SimulatedPlc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller pre-loaded with `(address, value)` floats.
    pub fn with_values(values: &[(u16, f32)]) -> Self {
        let plc = Self::new();
        for (address, value) in values {
            plc.set_value(*address, *value);
        }
        plc
    }

    /// Store `value` in the register pair starting at `address`.
    pub fn set_value(&self, address: u16, value: f32) {
        let [high, low] = encode_f32(value);
        let mut registers = self.lock();
        registers.insert(address, high);
        registers.insert(address.wrapping_add(1), low);
    }

    /// Float currently held by the register pair at `address`, if mapped
    pub fn value(&self, address: u16) -> Option<f32> {
        let registers = self.lock();
        let high = registers.get(&address)?;
        let low = registers.get(&address.wrapping_add(1))?;
        Some(decode_f32(*high, *low))
    }

    /// Unmap the register pair at `address`; later reads answer an exception.
    pub fn remove(&self, address: u16) {
        let mut registers = self.lock();
        registers.remove(&address);
        registers.remove(&address.wrapping_add(1));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u16, u16>> {
        self.registers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl tokio_modbus::server::Service for SimulatedPlc {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                register_read(&self.lock(), addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::ReadInputRegisters(addr, cnt) => {
                register_read(&self.lock(), addr, cnt).map(Response::ReadInputRegisters)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                register_write(&mut self.lock(), addr, &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => {
                register_write(&mut self.lock(), addr, std::slice::from_ref(&value))
                    .map(|_| Response::WriteSingleRegister(addr, value))
            }
            _ => {
                error!("Simulated PLC: unimplemented function code in request {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    (0..cnt)
        .map(|offset| {
            let reg_addr = addr.wrapping_add(offset);
            registers.get(&reg_addr).copied().ok_or_else(|| {
                debug!("Simulated PLC: read of unmapped register {}", reg_addr);
                ExceptionCode::IllegalDataAddress
            })
        })
        .collect()
}

/// Only already mapped registers can be written.
fn register_write(
    registers: &mut HashMap<u16, u16>,
    addr: u16,
    values: &[u16],
) -> Result<(), ExceptionCode> {
    let targets: Vec<u16> = (0..values.len())
        .map(|offset| addr.wrapping_add(offset as u16))
        .collect();
    if let Some(missing) = targets.iter().find(|reg| !registers.contains_key(reg)) {
        debug!("Simulated PLC: write to unmapped register {}", missing);
        return Err(ExceptionCode::IllegalDataAddress);
    }
    for (reg_addr, value) in targets.into_iter().zip(values) {
        registers.insert(reg_addr, *value);
    }
    Ok(())
}

/// Serve Modbus TCP requests for `plc` on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, plc: SimulatedPlc) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Simulated PLC listening on {}", addr);
    }
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr| {
        let plc = plc.clone();
        async move {
            debug!("Simulated PLC: client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(plc.clone()))
            })
        }
    };

    let on_process_error = |err| {
        error!("Simulated PLC error: {err}");
    };

    server.serve(&on_connected, on_process_error).await
}
