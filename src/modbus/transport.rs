// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register transports
//!
//! The connection manager never talks to a socket directly. It asks a
//! [`TransportConnector`] to open a [`RegisterTransport`] and keeps the handle
//! until it faults. The production implementation is Modbus TCP through
//! `tokio-modbus`; tests plug in scripted fakes.
//!
//! Errors are split in two kinds, mirroring the Modbus protocol itself:
//! an exception response means the PLC is alive and refused one request,
//! anything else means the link itself is gone.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio::net::lookup_host;
use tokio::time::timeout;
use tokio_modbus::prelude::*;

/// Failure of a single transport operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The controller answered with a Modbus exception code
    #[error("exception response: {0}")]
    Exception(String),

    /// The link is broken, timed out or could not be established
    #[error("{0}")]
    Fault(String),
}

/// An open link to a controller able to read holding registers
#[async_trait]
pub trait RegisterTransport: Send {
    /// Read `count` holding registers starting at `address`.
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    /// Close the link. Errors are ignored, the handle is dropped afterwards.
    async fn close(&mut self);
}

/// Factory for [`RegisterTransport`] handles
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a new link to `host:port`.
    ///
    /// Failures are always reported as [`TransportError::Fault`].
    async fn open(&self, host: &str, port: u16)
        -> Result<Box<dyn RegisterTransport>, TransportError>;
}

/// Modbus TCP connector backed by `tokio-modbus`
#[derive(Debug, Clone)]
pub struct TcpConnector {
    unit_id: u8,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector addressing `unit_id` with the given timeouts.
    pub fn new(unit_id: u8, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            unit_id,
            connect_timeout,
            read_timeout,
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(3), Duration::from_secs(1))
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    async fn open(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn RegisterTransport>, TransportError> {
        let target = format!("{}:{}", host, port);
        let unit = Slave(self.unit_id);

        let connecting = async {
            let socket_addr = lookup_host(target.as_str())
                .await
                .map_err(|e| TransportError::Fault(format!("cannot resolve {}: {}", target, e)))?
                .next()
                .ok_or_else(|| TransportError::Fault(format!("no address found for {}", target)))?;
            debug!("Opening Modbus TCP link to {} (unit {})", socket_addr, unit.0);
            tcp::connect_slave(socket_addr, unit)
                .await
                .map_err(|e| TransportError::Fault(format!("cannot connect to {}: {}", target, e)))
        };

        let ctx = timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| {
                TransportError::Fault(format!(
                    "connection to {} timed out after {:?}",
                    target, self.connect_timeout
                ))
            })??;

        Ok(Box::new(TcpTransport {
            ctx,
            read_timeout: self.read_timeout,
        }))
    }
}

/// A connected Modbus TCP client context
pub struct TcpTransport {
    ctx: tokio_modbus::client::Context,
    read_timeout: Duration,
}

#[async_trait]
impl RegisterTransport for TcpTransport {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        match timeout(
            self.read_timeout,
            self.ctx.read_holding_registers(address, count),
        )
        .await
        {
            Err(_) => Err(TransportError::Fault(format!(
                "no response within {:?}",
                self.read_timeout
            ))),
            Ok(Err(err)) => Err(TransportError::Fault(err.to_string())),
            Ok(Ok(Err(code))) => Err(TransportError::Exception(format!("{:?}", code))),
            Ok(Ok(Ok(words))) => Ok(words),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ctx.disconnect().await {
            debug!("Error while closing Modbus link: {}", e);
        }
    }
}
