//! Episode pairing, merging and uptime summaries
//!
//! On/off edges from any detector become closed `[start, end]` intervals
//! here, and intervals from several subsystems are fused into work episodes.

use crate::types::{DeviceEvent, DurationBreakdown, EventKind, WorkEpisode};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Merge was called with nothing to merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no intervals to merge")]
pub struct EmptyIntervalList;

/// Pair each PowerOn with the next PowerOff.
///
/// An off edge with no pending on edge is ignored, and an on edge never
/// closed inside the series produces nothing. A repeated on edge restarts the
/// pending interval. Phase events are skipped.
pub fn pair_edges(events: &[DeviceEvent]) -> Vec<WorkEpisode> {
    let mut episodes = Vec::new();
    let mut pending = None;
    for event in events {
        match event.kind {
            EventKind::PowerOn => pending = Some(event.timestamp),
            EventKind::PowerOff => {
                if let Some(start) = pending.take() {
                    episodes.push(WorkEpisode::new(start, event.timestamp));
                }
            }
            _ => {}
        }
    }
    episodes
}

/// Fuse interval lists into sorted, pairwise disjoint work episodes.
///
/// Intervals that overlap or touch (next start equal to current end) are
/// fused into one.
pub fn merge_episodes<I>(intervals: I) -> Result<Vec<WorkEpisode>, EmptyIntervalList>
where
    I: IntoIterator<Item = WorkEpisode>,
{
    let mut sorted: Vec<WorkEpisode> = intervals.into_iter().collect();
    sorted.sort_by_key(|e| e.start);

    let mut iter = sorted.into_iter();
    let mut current = iter.next().ok_or(EmptyIntervalList)?;
    let mut merged = Vec::new();

    for next in iter {
        if next.start <= current.end {
            current.end = current.end.max(next.end);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    Ok(merged)
}

// ============================================================================
// Uptime
// ============================================================================

/// Cycle count and durations of a device's on-episodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeSummary {
    pub cycles: usize,
    /// Whole minutes of each cycle, in order
    pub per_cycle_minutes: Vec<i64>,
    pub total: DurationBreakdown,
}

impl UptimeSummary {
    pub fn from_episodes(episodes: &[WorkEpisode]) -> Self {
        let total = episodes
            .iter()
            .fold(Duration::zero(), |acc, e| acc + e.duration());
        Self {
            cycles: episodes.len(),
            per_cycle_minutes: episodes.iter().map(|e| e.duration().num_minutes()).collect(),
            total: DurationBreakdown::from_duration(total),
        }
    }
}

/// Uptime over the closed on/off cycles found in `events`.
pub fn summarize_uptime(events: &[DeviceEvent]) -> UptimeSummary {
    UptimeSummary::from_episodes(&pair_edges(events))
}
