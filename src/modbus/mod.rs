// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! The monitor is a Modbus TCP client (master) polling holding registers of a
//! PLC (slave). This module holds everything that talks Modbus:
//!
//! ## Key Components
//!
//! - [`ConnectionManager`]: owns the link, its state machine and the
//!   background reconnection task
//! - [`decoder`]: register pair to `f32` conversion
//! - [`transport`]: the socket seam, `tokio-modbus` in production
//! - [`SimulatedPlc`]: an in-memory Modbus TCP server used for development
//!   and tests
//!
//! ## Register Map
//!
//! Each monitored parameter is a `REAL` stored in two consecutive holding
//! registers, high word first. Register 0 is read by the liveness check and
//! may be unmapped: an exception response still proves the PLC is reachable.

pub mod connection;
pub mod decoder;
pub mod simulator;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState, ReadError};
pub use decoder::{decode_register_pair, DecodeError, REGISTER_COUNT};
pub use simulator::SimulatedPlc;
pub use transport::{RegisterTransport, TcpConnector, TransportConnector, TransportError};
