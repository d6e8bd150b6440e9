//! deckwatch: shipboard deck-machinery telemetry analysis
//!
//! Turns raw, noisy, irregularly sampled logger readings into device
//! events, swing counts, work episodes and completeness figures.
//!
//! ## Architecture
//!
//! - **Acquisition**: `SampleProvider` reads one table over one window (CSV or in-memory)
//! - **Segmentation**: pure state-machine passes over a `SampleSeries`
//! - **Engine**: resolves devices through the vessel registry and runs one pass per query
//! - **Config**: device registry and audit tolerances from TOML

pub mod acquisition;
pub mod config;
pub mod engine;
pub mod segmentation;
pub mod types;

// Re-export configuration
pub use config::{DeviceSpec, VesselConfig};

// Re-export commonly used types
pub use types::{
    DeviceEvent, DurationBreakdown, EventKind, Phase, PhaseMark, RawValue, Sample, SampleSeries,
    Side, TimeWindow, WorkEpisode,
};

// Re-export acquisition
pub use acquisition::{AcquisitionError, CsvTableProvider, MemoryProvider, SampleProvider};

// Re-export engine
pub use engine::{EngineError, TelemetryEngine, WorkTime};

// Re-export segmentation results
pub use segmentation::{
    CompletenessReport, CurrentReport, MismatchInterval, PhaseConfig, ReduceOp, SwingPolicy,
    SwitchReport, UptimeSummary,
};
