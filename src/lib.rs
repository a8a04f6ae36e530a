// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC monitor library
//!
//! This library polls floating-point process values from a PLC over Modbus TCP,
//! tracks them as segmented trend series and logs every acquisition to CSV.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration, parameter lists and validation
//! - [`modbus`]: register decoding, transports and the connection manager
//! - [`acquisition`]: trackers, sliding window, log sink and the scheduler
//! - [`monitor`]: the query surface used by renderers
//! - [`daemon`]: background task orchestration

pub mod acquisition;
pub mod config;
pub mod daemon;
pub mod modbus;
pub mod monitor;

pub use monitor::PlcMonitor;
