//! Time ↔ sample conversion

use crate::SampleCount;

/// Convert seconds to a sample index using round-half-up.
///
/// Negative times map to 0.
#[inline]
pub fn time_to_samples(seconds: f64, rate: f64) -> SampleCount {
    let samples = (seconds * rate + 0.5).floor();
    if samples <= 0.0 { 0 } else { samples as SampleCount }
}

/// Like [`time_to_samples`] but clamped to `[0, limit]`
#[inline]
pub fn time_to_samples_clamped(seconds: f64, rate: f64, limit: SampleCount) -> SampleCount {
    time_to_samples(seconds, rate).min(limit)
}

#[inline]
pub fn samples_to_time(samples: SampleCount, rate: f64) -> f64 {
    samples as f64 / rate
}
