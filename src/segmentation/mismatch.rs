//! Redundant angle sensor disagreement audit
//!
//! The two A-frame angle sensors should read the same. An interval opens at
//! the first sample where both are readable and differ by more than the
//! tolerance, and closes at the sample before the first one that is back in
//! tolerance or unreadable. An interval that never closes inside the series
//! is not reported.

use crate::types::SampleSeries;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MismatchInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Largest absolute disagreement seen inside the interval
    pub max_difference: f64,
}

/// Intervals where `|a - b| > tolerance`.
pub fn angle_mismatches(
    series: &SampleSeries,
    channel_a: &str,
    channel_b: &str,
    tolerance: f64,
) -> Vec<MismatchInterval> {
    let mut intervals = Vec::new();
    let mut open: Option<MismatchInterval> = None;
    let mut previous: Option<NaiveDateTime> = None;

    for sample in series.iter() {
        let difference = match (sample.value(channel_a), sample.value(channel_b)) {
            (Some(a), Some(b)) => Some((a - b).abs()),
            _ => None,
        };

        match difference {
            Some(d) if d > tolerance => match open.as_mut() {
                Some(interval) => {
                    interval.end = sample.timestamp;
                    interval.max_difference = interval.max_difference.max(d);
                }
                None => {
                    open = Some(MismatchInterval {
                        start: sample.timestamp,
                        end: sample.timestamp,
                        max_difference: d,
                    });
                }
            },
            _ => {
                if let Some(mut interval) = open.take() {
                    interval.end = previous.unwrap_or(interval.end);
                    intervals.push(interval);
                }
            }
        }
        previous = Some(sample.timestamp);
    }

    if let Some(unclosed) = open {
        tracing::debug!(start = %unclosed.start, "Mismatch still open at end of series, dropped");
    }

    tracing::debug!(
        samples = series.len(),
        intervals = intervals.len(),
        tolerance,
        "Angle sensors audited"
    );
    intervals
}
