//! CSV Telemetry Table Provider
//!
//! Reads the shipboard logger's export format: one CSV file per table, a
//! timestamp column (`csvTime` by default) plus one column per sensor
//! channel. Sensor cells hold a number or the literal `error` token.
//!
//! Rows are parsed leniently. A row with an unparsable timestamp is skipped
//! and counted; an unparsable sensor cell becomes `RawValue::Unreadable` and
//! the row is kept.

use super::{AcquisitionError, SampleProvider};
use crate::config::DataConfig;
use crate::types::{parse_timestamp, RawValue, Sample, SampleSeries, TimeWindow};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
/// Returns owned strings because quoted fields need unquoting.
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

/// One raw line without its terminator, or `None` if it is not UTF-8.
fn decode_line(raw: &[u8]) -> Option<&str> {
    std::str::from_utf8(strip_terminator(raw)).ok()
}

// ============================================================================
// Column Mapping
// ============================================================================

/// Header positions of the timestamp column and each requested channel
#[derive(Debug, Clone)]
struct ColumnMap {
    time: usize,
    channels: Vec<(String, usize)>,
}

impl ColumnMap {
    fn from_header(
        header: &str,
        table: &str,
        time_column: &str,
        channels: &[&str],
    ) -> Result<Self, AcquisitionError> {
        let columns = csv_split(header.trim_start_matches('\u{feff}'));
        let find = |name: &str| columns.iter().position(|c| c.trim() == name);

        let time = find(time_column).ok_or_else(|| AcquisitionError::MissingColumn {
            table: table.to_string(),
            column: time_column.to_string(),
        })?;

        let channels = channels
            .iter()
            .map(|&ch| {
                find(ch)
                    .map(|idx| (ch.to_string(), idx))
                    .ok_or_else(|| AcquisitionError::MissingColumn {
                        table: table.to_string(),
                        column: ch.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { time, channels })
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Row counts from one table read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Rows inside the window
    pub kept: usize,
    /// Rows outside the window
    pub outside: usize,
    /// Rows dropped for an unparsable timestamp
    pub bad_timestamp: usize,
    /// Rows dropped for invalid UTF-8
    pub bad_encoding: usize,
}

/// Reads `<dir>/<table>.csv` on every call; nothing is cached between queries.
#[derive(Debug, Clone)]
pub struct CsvTableProvider {
    dir: PathBuf,
    time_column: String,
    timestamp_format: String,
    unreadable_token: String,
}

impl CsvTableProvider {
    pub fn new(data: &DataConfig) -> Self {
        Self {
            dir: data.dir.clone(),
            time_column: data.time_column.clone(),
            timestamp_format: data.timestamp_format.clone(),
            unreadable_token: data.unreadable_token.clone(),
        }
    }

    /// Provider over `dir` with the default cell conventions.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(&DataConfig {
            dir: dir.as_ref().to_path_buf(),
            ..DataConfig::default()
        })
    }

    /// File backing `table`. A trailing `.csv` in the table name is accepted.
    pub fn table_path(&self, table: &str) -> PathBuf {
        if Path::new(table)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            self.dir.join(table)
        } else {
            self.dir.join(format!("{table}.csv"))
        }
    }

    fn parse_time(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, &self.timestamp_format)
            .ok()
            .or_else(|| parse_timestamp(raw))
    }

    /// Read a table and report row statistics alongside the series.
    pub fn read_with_stats(
        &self,
        table: &str,
        channels: &[&str],
        window: &TimeWindow,
    ) -> Result<(SampleSeries, ReadStats), AcquisitionError> {
        let path = self.table_path(table);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AcquisitionError::TableNotFound {
                table: table.to_string(),
                path: path.clone(),
            },
            _ => AcquisitionError::Io {
                table: table.to_string(),
                source: e,
            },
        })?;

        let io_err = |source| AcquisitionError::Io {
            table: table.to_string(),
            source,
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf).map_err(io_err)? == 0 {
            return Err(AcquisitionError::EmptyTable(table.to_string()));
        }
        let header = String::from_utf8_lossy(strip_terminator(&buf)).into_owned();
        let columns = ColumnMap::from_header(&header, table, &self.time_column, channels)?;

        let mut samples = Vec::new();
        let mut stats = ReadStats::default();
        let mut line_num = 1usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).map_err(io_err)? == 0 {
                break;
            }
            line_num += 1;

            let Some(line) = decode_line(&buf) else {
                if stats.bad_encoding < 10 {
                    tracing::warn!(table, line = line_num, "Row is not valid UTF-8, skipped");
                }
                stats.bad_encoding += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }

            let fields = csv_split(line);
            let Some(timestamp) = fields.get(columns.time).and_then(|raw| self.parse_time(raw))
            else {
                if stats.bad_timestamp < 10 {
                    tracing::warn!(table, line = line_num, "Unparsable timestamp, row skipped");
                }
                stats.bad_timestamp += 1;
                continue;
            };

            if !window.contains(timestamp) {
                stats.outside += 1;
                continue;
            }

            let sample = columns
                .channels
                .iter()
                .fold(Sample::new(timestamp), |sample, (name, idx)| {
                    let value = fields.get(*idx).map_or(RawValue::Unreadable, |cell| {
                        RawValue::parse(cell, &self.unreadable_token)
                    });
                    sample.with(name, value)
                });
            samples.push(sample);
            stats.kept += 1;
        }

        tracing::debug!(
            table,
            window = %window,
            kept = stats.kept,
            outside = stats.outside,
            bad_timestamp = stats.bad_timestamp,
            bad_encoding = stats.bad_encoding,
            "Table read"
        );

        Ok((SampleSeries::new(samples), stats))
    }
}

impl SampleProvider for CsvTableProvider {
    fn read(
        &self,
        table: &str,
        channels: &[&str],
        window: &TimeWindow,
    ) -> Result<SampleSeries, AcquisitionError> {
        self.read_with_stats(table, channels, window)
            .map(|(series, _)| series)
    }
}
