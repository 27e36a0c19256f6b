//! .auf Block File Format
//!
//! File structure:
//! ```text
//! +----------------------------------------+
//! | Header tag (20 ASCII bytes)            |
//! +----------------------------------------+
//! | 64K summary: frames64K × {min,max,rms} |
//! +----------------------------------------+
//! | 256 summary: frames256 × {min,max,rms} |
//! +----------------------------------------+
//! | Raw samples: len × sample_size         |
//! |   (absent for alias blocks)            |
//! +----------------------------------------+
//! ```
//!
//! `frames64K = ceil(max_samples / 65536)`, `frames256 = frames64K * 256`.
//! Every frame is three little-endian f32. Frames past the end of the
//! block's data are zero-filled, so the raw-sample offset depends only on
//! the configured maximum block length.

use std::io::Read;

use crate::{StorageError, StorageResult};

// ═══════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════

/// Format generation tag at the top of every block file
pub const HEADER_TAG: [u8; 20] = *b"BlockWaveBlockFile01";

pub const HEADER_TAG_LEN: usize = HEADER_TAG.len();

/// Samples per fine summary frame
pub const FINE_FRAME_SAMPLES: usize = 256;

/// Samples per coarse summary frame
pub const COARSE_FRAME_SAMPLES: usize = 65536;

/// Bytes per summary frame (min, max, rms as f32)
pub const BYTES_PER_FRAME: usize = 12;

/// File extension for block files
pub const BLOCK_EXTENSION: &str = "auf";

// ═══════════════════════════════════════════════════════════════════════════
// SUMMARY LEVEL
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
    /// 256 samples per frame
    Fine,
    /// 65536 samples per frame
    Coarse,
}

impl SummaryLevel {
    #[inline]
    pub const fn samples_per_frame(self) -> usize {
        match self {
            SummaryLevel::Fine => FINE_FRAME_SAMPLES,
            SummaryLevel::Coarse => COARSE_FRAME_SAMPLES,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LAYOUT
// ═══════════════════════════════════════════════════════════════════════════

/// Summary table sizes and offsets for a given maximum block length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLayout {
    pub max_samples: usize,
    pub frames_64k: usize,
    pub frames_256: usize,
}

impl SummaryLayout {
    pub fn for_max_samples(max_samples: usize) -> Self {
        let frames_64k = max_samples.div_ceil(COARSE_FRAME_SAMPLES).max(1);
        Self {
            max_samples,
            frames_64k,
            frames_256: frames_64k * (COARSE_FRAME_SAMPLES / FINE_FRAME_SAMPLES),
        }
    }

    /// Frames reserved on disk for a level
    pub fn capacity(&self, level: SummaryLevel) -> usize {
        match level {
            SummaryLevel::Fine => self.frames_256,
            SummaryLevel::Coarse => self.frames_64k,
        }
    }

    /// Byte offset of the first frame of a level
    pub fn offset(&self, level: SummaryLevel) -> usize {
        match level {
            SummaryLevel::Coarse => HEADER_TAG_LEN,
            SummaryLevel::Fine => HEADER_TAG_LEN + self.frames_64k * BYTES_PER_FRAME,
        }
    }

    /// Header + both summaries; raw samples start here
    pub fn header_len(&self) -> usize {
        HEADER_TAG_LEN + (self.frames_64k + self.frames_256) * BYTES_PER_FRAME
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SUMMARY FRAME
// ═══════════════════════════════════════════════════════════════════════════

/// min / max / rms over a run of samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryFrame {
    pub min: f32,
    pub max: f32,
    pub rms: f32,
}

/// Whole-block statistics share the frame layout
pub type BlockStats = SummaryFrame;

impl SummaryFrame {
    /// Reported for blocks whose data is not available yet
    pub const PLACEHOLDER: Self = Self {
        min: -1.0,
        max: 1.0,
        rms: 0.707,
    };

    pub const SILENT: Self = Self {
        min: 0.0,
        max: 0.0,
        rms: 0.0,
    };

    pub fn new(min: f32, max: f32, rms: f32) -> Self {
        Self { min, max, rms }
    }

    /// Convert to bytes (little-endian)
    pub fn to_bytes(&self) -> [u8; BYTES_PER_FRAME] {
        let mut bytes = [0u8; BYTES_PER_FRAME];
        bytes[0..4].copy_from_slice(&self.min.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.max.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.rms.to_le_bytes());
        bytes
    }

    /// Convert from bytes (little-endian)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            min: f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            max: f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            rms: f32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HEADER I/O
// ═══════════════════════════════════════════════════════════════════════════

/// Serialize header tag and both summary levels, zero-padded to the layout
pub fn encode_header(
    layout: &SummaryLayout,
    coarse: &[SummaryFrame],
    fine: &[SummaryFrame],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(layout.header_len());
    bytes.extend_from_slice(&HEADER_TAG);
    write_level(&mut bytes, coarse, layout.frames_64k);
    write_level(&mut bytes, fine, layout.frames_256);
    bytes
}

fn write_level(bytes: &mut Vec<u8>, frames: &[SummaryFrame], capacity: usize) {
    for frame in frames.iter().take(capacity) {
        bytes.extend_from_slice(&frame.to_bytes());
    }
    let padding = capacity.saturating_sub(frames.len()) * BYTES_PER_FRAME;
    bytes.resize(bytes.len() + padding, 0);
}

/// Read and validate the header tag
pub fn read_header_tag(reader: &mut impl Read, name: &str) -> StorageResult<()> {
    let mut tag = [0u8; HEADER_TAG_LEN];
    reader
        .read_exact(&mut tag)
        .map_err(|e| StorageError::InvalidBlockFile {
            name: name.to_string(),
            reason: format!("header too short: {}", e),
        })?;
    if tag != HEADER_TAG {
        return Err(StorageError::InvalidBlockFile {
            name: name.to_string(),
            reason: "invalid header tag".to_string(),
        });
    }
    Ok(())
}

/// Decode `count` consecutive frames
pub fn decode_frames(bytes: &[u8], count: usize) -> Vec<SummaryFrame> {
    bytes
        .chunks_exact(BYTES_PER_FRAME)
        .take(count)
        .map(SummaryFrame::from_bytes)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
