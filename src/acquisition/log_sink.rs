// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data log sink
//!
//! Each acquisition tick produces one [`LogRow`]. The CSV sink appends it to
//! `<directory>/<YYYY-mm-dd_HH-MM>_<suffix>`, one column per parameter in
//! configuration order. Absent values are written as empty fields so columns
//! stay aligned.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;
use thiserror::Error;

/// Timestamp format of the first column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prefix format of the log file name
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// One acquisition tick
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub timestamp: DateTime<Local>,
    pub values: Vec<Option<f64>>,
}

impl LogRow {
    /// Fields as written to the log, timestamp first
    pub fn fields(&self) -> Vec<String> {
        std::iter::once(self.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .chain(
                self.values
                    .iter()
                    .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
            )
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("I/O error on data log: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error on data log: {0}")]
    Csv(#[from] csv::Error),

    #[error("row has {got} value(s), the log has {expected} parameter column(s)")]
    ColumnMismatch { expected: usize, got: usize },
}

/// Destination of acquisition rows.
///
/// The scheduler holding a sink runs on a spawned task, hence `Send + Sync`.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    fn write_row(&mut self, row: &LogRow) -> Result<(), LogSinkError>;
}

/// Sink discarding every row, used when the data log is disabled
#[derive(Debug, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn write_row(&mut self, _row: &LogRow) -> Result<(), LogSinkError> {
        Ok(())
    }
}

/// CSV file sink
pub struct CsvLogSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    columns: usize,
}

impl CsvLogSink {
    /// Log file path for a session started at `started`
    pub fn file_path(directory: &Path, suffix: &str, started: DateTime<Local>) -> PathBuf {
        directory.join(format!(
            "{}_{}",
            started.format(FILE_TIMESTAMP_FORMAT),
            suffix
        ))
    }

    /// Open (or create) the log for a session started at `started`.
    ///
    /// The directory is created if needed. The header is only written when
    /// the file is new or empty.
    pub fn create(
        directory: &Path,
        suffix: &str,
        parameter_names: &[String],
        started: DateTime<Local>,
    ) -> Result<Self, LogSinkError> {
        fs::create_dir_all(directory)?;
        let path = Self::file_path(directory, suffix, started);
        Self::open(&path, parameter_names)
    }

    /// Append to the log at `path`.
    pub fn open(path: &Path, parameter_names: &[String]) -> Result<Self, LogSinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            let header =
                std::iter::once("Timestamp").chain(parameter_names.iter().map(String::as_str));
            writer.write_record(header)?;
            writer.flush()?;
            info!("Created data log {}", path.display());
        } else {
            info!("Appending to data log {}", path.display());
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            columns: parameter_names.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for CsvLogSink {
    fn write_row(&mut self, row: &LogRow) -> Result<(), LogSinkError> {
        if row.values.len() != self.columns {
            return Err(LogSinkError::ColumnMismatch {
                expected: self.columns,
                got: row.values.len(),
            });
        }
        self.writer.write_record(row.fields())?;
        self.writer.flush()?;
        Ok(())
    }
}
