//! Sample format tags and scalar conversion

use serde::{Deserialize, Serialize};

/// Native storage format of sample data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SampleFormat {
    /// 16-bit signed integer, 2 bytes
    Int16,
    /// 24-bit signed integer, stored in 4 bytes
    Int24,
    /// 32-bit IEEE float, 4 bytes
    #[default]
    Float32,
}

const INT16_SCALE: f32 = 32768.0;
const INT24_SCALE: f32 = 8_388_608.0;
const INT24_MIN: i32 = -8_388_608;
const INT24_MAX: i32 = 8_388_607;

impl SampleFormat {
    /// Bytes occupied by one sample on disk and in memory
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 | SampleFormat::Float32 => 4,
        }
    }

    /// Stable integer code used in project records
    #[inline]
    pub const fn code(self) -> u32 {
        match self {
            SampleFormat::Int16 => 0x0002_0001,
            SampleFormat::Int24 => 0x0004_0001,
            SampleFormat::Float32 => 0x0004_000F,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0002_0001 => Some(SampleFormat::Int16),
            0x0004_0001 => Some(SampleFormat::Int24),
            0x0004_000F => Some(SampleFormat::Float32),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::Int16 => "16-bit PCM",
            SampleFormat::Int24 => "24-bit PCM",
            SampleFormat::Float32 => "32-bit float",
        }
    }

    /// Decode one sample starting at `bytes[0]` to a float in [-1, 1]
    #[inline]
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        match self {
            SampleFormat::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / INT16_SCALE,
            SampleFormat::Int24 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / INT24_SCALE
            }
            SampleFormat::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Encode a float into `out[..self.size()]`, clamping on the integer side
    #[inline]
    pub fn write_f32(self, value: f32, out: &mut [u8]) {
        match self {
            SampleFormat::Int16 => {
                let v = (value * INT16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32);
                out[..2].copy_from_slice(&(v as i16).to_le_bytes());
            }
            SampleFormat::Int24 => {
                let v = (value * INT24_SCALE).round().clamp(INT24_MIN as f32, INT24_MAX as f32);
                out[..4].copy_from_slice(&(v as i32).to_le_bytes());
            }
            SampleFormat::Float32 => out[..4].copy_from_slice(&value.to_le_bytes()),
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
