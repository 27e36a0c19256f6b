//! Summary computation
//!
//! Bottom-up reduction:
//! - samples → 256-sample frames
//! - 256 fine frames → one 64K-sample frame
//! - fine frames → whole-block statistics
//!
//! min and max are exact at every level. rms is combined as the
//! sample-count-weighted root mean square of the child frames.

use crate::format::{BlockStats, COARSE_FRAME_SAMPLES, FINE_FRAME_SAMPLES, SummaryFrame};

/// Both summary levels plus whole-block statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub coarse: Vec<SummaryFrame>,
    pub fine: Vec<SummaryFrame>,
    pub stats: BlockStats,
}

impl Summary {
    pub fn compute(samples: &[f32]) -> Self {
        let fine: Vec<SummaryFrame> = samples.chunks(FINE_FRAME_SAMPLES).map(frame_of).collect();

        let fines_per_coarse = COARSE_FRAME_SAMPLES / FINE_FRAME_SAMPLES;
        let coarse = fine
            .chunks(fines_per_coarse)
            .enumerate()
            .map(|(i, group)| {
                let first = i * fines_per_coarse;
                combine(
                    group
                        .iter()
                        .enumerate()
                        .map(|(j, f)| (*f, fine_frame_len(samples.len(), first + j))),
                )
            })
            .collect();

        let stats = stats_from_fine(&fine, samples.len());
        Self {
            coarse,
            fine,
            stats,
        }
    }
}

/// Exact statistics over a run of samples
pub fn frame_of(samples: &[f32]) -> SummaryFrame {
    if samples.is_empty() {
        return SummaryFrame::SILENT;
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut sum_sq = 0.0f64;

    for &s in samples {
        min = min.min(s);
        max = max.max(s);
        sum_sq += s as f64 * s as f64;
    }

    SummaryFrame {
        min,
        max,
        rms: (sum_sq / samples.len() as f64).sqrt() as f32,
    }
}

/// Merge frames weighted by the number of samples each covers
pub fn combine(frames: impl IntoIterator<Item = (SummaryFrame, usize)>) -> SummaryFrame {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut sum_sq = 0.0f64;
    let mut total = 0usize;

    for (frame, count) in frames {
        if count == 0 {
            continue;
        }
        min = min.min(frame.min);
        max = max.max(frame.max);
        sum_sq += frame.rms as f64 * frame.rms as f64 * count as f64;
        total += count;
    }

    if total == 0 {
        return SummaryFrame::SILENT;
    }

    SummaryFrame {
        min,
        max,
        rms: (sum_sq / total as f64).sqrt() as f32,
    }
}

/// Samples covered by fine frame `index` of a block of `len` samples
#[inline]
pub fn fine_frame_len(len: usize, index: usize) -> usize {
    len.saturating_sub(index * FINE_FRAME_SAMPLES)
        .min(FINE_FRAME_SAMPLES)
}

/// Whole-block statistics from the fine summary level
pub fn stats_from_fine(fine: &[SummaryFrame], len: usize) -> BlockStats {
    combine(
        fine.iter()
            .enumerate()
            .map(|(i, f)| (*f, fine_frame_len(len, i))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_counts() {
        let samples = vec![0.25f32; 70_000];
        let summary = Summary::compute(&samples);
        assert_eq!(summary.fine.len(), 70_000usize.div_ceil(256));
        assert_eq!(summary.coarse.len(), 2);
    }

    #[test]
    fn test_exact_extrema() {
        let mut samples: Vec<f32> = (0..10_000).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        samples[7777] = 0.9;
        samples[123] = -0.8;

        let summary = Summary::compute(&samples);
        assert_eq!(summary.stats.max, 0.9);
        assert_eq!(summary.stats.min, -0.8);
        assert_eq!(summary.fine[7777 / 256].max, 0.9);
        assert_eq!(summary.coarse[0].min, -0.8);
    }

    #[test]
    fn test_weighted_rms() {
        // 256 samples of 1.0 followed by a short frame of 0.0
        let mut samples = vec![1.0f32; 256];
        samples.extend(std::iter::repeat_n(0.0, 256));
        let summary = Summary::compute(&samples);
        assert_relative_eq!(summary.stats.rms, 0.5f32.sqrt(), epsilon = 1e-6);

        let short = combine([(SummaryFrame::new(0.0, 1.0, 1.0), 3), (SummaryFrame::SILENT, 1)]);
        assert_relative_eq!(short.rms, 0.75f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_empty() {
        let summary = Summary::compute(&[]);
        assert!(summary.fine.is_empty());
        assert_eq!(summary.stats, SummaryFrame::SILENT);
    }
}
