//! Completeness auditing against the one-minute logging grid

use crate::config::defaults::{GRID_STEP_SECS, REPORT_DECIMALS};
use crate::types::{truncate_to_minute, TimeWindow};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// Grid points in the window
    pub expected: usize,
    pub missing_count: usize,
    /// `missing_count / expected`, exact
    pub missing_ratio: f64,
    /// Percentage, rounded for display
    pub missing_percent: f64,
    /// Missing grid minutes, ascending
    pub missing: Vec<NaiveDateTime>,
}

/// Expected sample minutes: `start + k * 60s` for every point not after
/// `end`, each truncated to the minute.
pub fn expected_grid(window: &TimeWindow) -> Vec<NaiveDateTime> {
    if !window.is_ordered() {
        return Vec::new();
    }
    let step = Duration::seconds(GRID_STEP_SECS);
    let mut grid = Vec::new();
    let mut point = window.start;
    while point <= window.end {
        grid.push(truncate_to_minute(point));
        point += step;
    }
    grid
}

/// Compare the expected grid for `window` with observed timestamps.
///
/// Observed timestamps are truncated to the minute, so sub-minute jitter
/// never reads as a gap. Observations outside the grid are ignored.
pub fn audit<I>(window: &TimeWindow, observed: I) -> CompletenessReport
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let seen: HashSet<NaiveDateTime> = observed.into_iter().map(truncate_to_minute).collect();
    let grid = expected_grid(window);
    let missing: Vec<NaiveDateTime> = grid.iter().copied().filter(|m| !seen.contains(m)).collect();

    let missing_ratio = if grid.is_empty() {
        0.0
    } else {
        missing.len() as f64 / grid.len() as f64
    };

    CompletenessReport {
        expected: grid.len(),
        missing_count: missing.len(),
        missing_ratio,
        missing_percent: round_to(missing_ratio * 100.0, REPORT_DECIMALS),
        missing,
    }
}
