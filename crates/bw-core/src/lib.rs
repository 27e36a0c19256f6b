//! bw-core: Shared sample types for BlockWave
//!
//! This crate provides the foundational types used across all BlockWave crates:
//! - `SampleCount` for 64-bit sample arithmetic
//! - `SampleFormat` tags and conversion routines
//! - `SampleBuffer`, a format-tagged buffer of native sample bytes
//! - time ↔ sample rounding helpers
//! - `CancelFlag` for long-running edits

mod buffer;
mod cancel;
mod format;
mod time;

pub use buffer::*;
pub use cancel::*;
pub use format::*;
pub use time::*;

/// Sample index or length on a track timeline.
///
/// Always 64-bit: long tracks at high rates overflow 32-bit indices.
pub type SampleCount = u64;
