//! Telemetry acquisition module
//!
//! The engine never touches files directly. It asks a [`SampleProvider`] for
//! the samples of one table within one window and works on the returned
//! in-memory series.

pub mod csv_table;

pub use csv_table::CsvTableProvider;

use crate::types::{SampleSeries, TimeWindow};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Table '{table}' not found ({})", .path.display())]
    TableNotFound { table: String, path: PathBuf },

    #[error("Column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("Table '{0}' has no header row")]
    EmptyTable(String),

    #[error("I/O error reading table '{table}': {source}")]
    Io {
        table: String,
        source: std::io::Error,
    },
}

// ============================================================================
// Provider Interface
// ============================================================================

/// Read-only source of device samples.
///
/// Implementations must return samples ordered by timestamp, restricted to
/// `window` (inclusive). Cells that cannot be read become
/// [`RawValue::Unreadable`](crate::types::RawValue::Unreadable); they never
/// fail the whole read.
pub trait SampleProvider: Send + Sync {
    fn read(
        &self,
        table: &str,
        channels: &[&str],
        window: &TimeWindow,
    ) -> Result<SampleSeries, AcquisitionError>;
}

impl<P: SampleProvider + ?Sized> SampleProvider for &P {
    fn read(
        &self,
        table: &str,
        channels: &[&str],
        window: &TimeWindow,
    ) -> Result<SampleSeries, AcquisitionError> {
        (**self).read(table, channels, window)
    }
}

impl<P: SampleProvider + ?Sized> SampleProvider for Box<P> {
    fn read(
        &self,
        table: &str,
        channels: &[&str],
        window: &TimeWindow,
    ) -> Result<SampleSeries, AcquisitionError> {
        (**self).read(table, channels, window)
    }
}

// ============================================================================
// In-Memory Provider
// ============================================================================

/// Provider backed by series already in memory.
///
/// Channels are not checked: a channel missing from a sample reads as
/// unreadable, exactly like a sensor dropout.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    tables: HashMap<String, SampleSeries>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, series: SampleSeries) {
        self.tables.insert(table.to_string(), series);
    }

    pub fn with_table(mut self, table: &str, series: SampleSeries) -> Self {
        self.insert(table, series);
        self
    }
}

impl SampleProvider for MemoryProvider {
    fn read(
        &self,
        table: &str,
        _channels: &[&str],
        window: &TimeWindow,
    ) -> Result<SampleSeries, AcquisitionError> {
        self.tables
            .get(table)
            .map(|series| series.window(window))
            .ok_or_else(|| AcquisitionError::TableNotFound {
                table: table.to_string(),
                path: PathBuf::from(table),
            })
    }
}
