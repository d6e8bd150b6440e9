//! Shared data structures for deck machinery telemetry
//!
//! - Sample Series: timestamped raw readings per channel (`RawValue`)
//! - Events: power edges and current-phase labels
//! - Episodes: powered / work intervals and their duration figures

mod sample;
mod event;
mod episode;

pub use sample::*;
pub use event::*;
pub use episode::*;
