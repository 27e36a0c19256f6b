//! Per-pixel waveform summaries

use bw_core::SampleCount;
use bw_store::{COARSE_FRAME_SAMPLES, FINE_FRAME_SAMPLES, SummaryFrame, SummaryLevel};

use super::Sequence;
use crate::SequenceResult;

/// Min / max / rms per pixel column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveDisplay {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
    pub rms: Vec<f32>,
}

impl WaveDisplay {
    fn zeroed(pixels: usize) -> Self {
        Self {
            min: vec![0.0; pixels],
            max: vec![0.0; pixels],
            rms: vec![0.0; pixels],
        }
    }

    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }
}

#[derive(Clone, Copy)]
struct Column {
    min: f32,
    max: f32,
    sum_sq: f64,
    count: usize,
}

impl Column {
    const EMPTY: Self = Self {
        min: f32::MAX,
        max: f32::MIN,
        sum_sq: 0.0,
        count: 0,
    };

    fn add(&mut self, frame: SummaryFrame, count: usize) {
        self.min = self.min.min(frame.min);
        self.max = self.max.max(frame.max);
        self.sum_sq += (frame.rms as f64) * (frame.rms as f64) * count as f64;
        self.count += count;
    }
}

impl Sequence {
    /// Summarize the sample ranges between consecutive `where_` entries.
    ///
    /// `where_` holds `pixels + 1` sample positions. The summary level is
    /// picked from the samples per pixel: raw samples below 256, the 256
    /// summary below 65536, the 64K summary above. Each frame goes to the
    /// pixel containing its first sample; pixels past the end read 0.
    pub fn get_wave_display(&self, where_: &[SampleCount]) -> SequenceResult<WaveDisplay> {
        let pixels = where_.len().saturating_sub(1);
        let mut display = WaveDisplay::zeroed(pixels);
        if pixels == 0 || self.blocks.is_empty() {
            return Ok(display);
        }

        let s0 = where_[0].min(self.num_samples);
        let s1 = where_[pixels].min(self.num_samples);
        if s0 >= s1 {
            return Ok(display);
        }

        let samples_per_pixel = (where_[pixels].saturating_sub(where_[0])) as f64 / pixels as f64;
        let level = if samples_per_pixel >= COARSE_FRAME_SAMPLES as f64 {
            Some(SummaryLevel::Coarse)
        } else if samples_per_pixel >= FINE_FRAME_SAMPLES as f64 {
            Some(SummaryLevel::Fine)
        } else {
            None
        };

        let mut columns = vec![Column::EMPTY; pixels];
        let mut pixel = 0usize;
        let mut place = |pos: SampleCount, frame: SummaryFrame, count: usize| {
            while pixel + 1 < pixels && where_[pixel + 1] <= pos {
                pixel += 1;
            }
            columns[pixel].add(frame, count);
        };

        let mut b = self.find_block(s0);
        while b < self.blocks.len() && self.blocks[b].start < s1 {
            let block = &self.blocks[b];
            let from = (s0.max(block.start) - block.start) as usize;
            let to = (s1.min(block.end()) - block.start) as usize;

            match level {
                None => {
                    let samples = self.read_block(block, from, to - from)?.to_f32();
                    for (i, &v) in samples.iter().enumerate() {
                        let pos = block.start + (from + i) as SampleCount;
                        place(pos, SummaryFrame::new(v, v, v.abs()), 1);
                    }
                }
                Some(level) => {
                    let spf = level.samples_per_frame();
                    let first = from / spf;
                    let last = (to - 1) / spf;
                    let frames = block.file.read_summary_frames(level, first, last - first + 1)?;
                    for (k, frame) in frames.into_iter().enumerate() {
                        let frame_start = (first + k) * spf;
                        let count = spf.min(block.file.len() - frame_start);
                        let pos = (block.start + frame_start as SampleCount).max(s0);
                        place(pos, frame, count);
                    }
                }
            }
            b += 1;
        }

        for (i, column) in columns.iter().enumerate() {
            if column.count == 0 {
                continue;
            }
            display.min[i] = column.min;
            display.max[i] = column.max;
            display.rms[i] = (column.sum_sq / column.count as f64).sqrt() as f32;
        }
        Ok(display)
    }
}
