//! Segmentation engine core
//!
//! Pure, synchronous passes over an in-memory [`SampleSeries`](crate::types::SampleSeries):
//!
//! - `presence`: dual-channel power edges and Rise / Peak / Steady labels
//! - `switching`: single-channel on/off edges and last-high-current marks
//! - `swing`: arm swing counting under three policies
//! - `episodes`: edge pairing, work-episode merging, uptime summaries
//! - `completeness`: missing-minute audit against the logging grid
//! - `reducer`: min / max / mean / sum and energy integration
//! - `mismatch`: redundant angle sensor disagreement
//!
//! Every pass reads only its input and returns a fresh result, so any number
//! of passes can run concurrently.

pub mod completeness;
pub mod episodes;
pub mod mismatch;
pub mod presence;
pub mod reducer;
pub mod swing;
pub mod switching;

pub use completeness::{audit, expected_grid, CompletenessReport};
pub use episodes::{merge_episodes, pair_edges, summarize_uptime, EmptyIntervalList, UptimeSummary};
pub use mismatch::{angle_mismatches, MismatchInterval};
pub use presence::{CurrentPhaseClassifier, CurrentReport, PhaseConfig};
pub use reducer::{integrate_energy_kwh, Extremum, ReduceOp, Reduction, WindowStats};
pub use swing::SwingPolicy;
pub use switching::{detect_switches, detect_with_load, HighCurrentMark, SwitchReport};

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(33.3333, 2), 33.33);
        assert_eq!(round_to(2.675, 1), 2.7);
        assert_eq!(round_to(-1.005, 0), -1.0);
    }
}
