//! External sample sources for alias and on-demand blocks

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use bw_core::SampleCount;
use hound::{SampleFormat as WavSampleFormat, WavReader};

use crate::{StorageError, StorageResult};

/// Something that can produce float samples of one channel on request.
///
/// Implementations must be cheap to call repeatedly: alias blocks decode
/// on every read, pending blocks decode once on a worker thread.
pub trait DecodeSource: Send + Sync + Debug {
    /// File the samples come from
    fn path(&self) -> &Path;

    /// Decode `len` frames of `channel` starting at frame `start`
    fn decode(&self, start: SampleCount, len: usize, channel: u16) -> StorageResult<Vec<f32>>;
}

/// WAV file read through `hound`
#[derive(Debug, Clone)]
pub struct WavSource {
    path: PathBuf,
}

impl WavSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> StorageResult<WavReader<std::io::BufReader<std::fs::File>>> {
        WavReader::open(&self.path).map_err(|e| match e {
            hound::Error::IoError(_) => StorageError::AliasSourceMissing(self.path.clone()),
            other => StorageError::from(other),
        })
    }

    /// Channel count and length in frames
    pub fn info(&self) -> StorageResult<(u16, SampleCount)> {
        let reader = self.open()?;
        Ok((reader.spec().channels, reader.duration() as SampleCount))
    }
}

impl DecodeSource for WavSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self, start: SampleCount, len: usize, channel: u16) -> StorageResult<Vec<f32>> {
        let mut reader = self.open()?;
        let spec = reader.spec();
        if channel >= spec.channels {
            return Err(StorageError::Wav(format!(
                "channel {} out of range for {} ({} channels)",
                channel,
                self.path.display(),
                spec.channels
            )));
        }

        let start_frame = u32::try_from(start)
            .map_err(|_| StorageError::Wav(format!("frame offset {} too large", start)))?;
        reader
            .seek(start_frame)
            .map_err(|_| StorageError::AliasSourceMissing(self.path.clone()))?;

        let channels = spec.channels as usize;
        let wanted = len * channels;
        let mut out = Vec::with_capacity(len);

        match spec.sample_format {
            WavSampleFormat::Float => {
                for (i, sample) in reader.samples::<f32>().take(wanted).enumerate() {
                    let sample = sample?;
                    if i % channels == channel as usize {
                        out.push(sample);
                    }
                }
            }
            WavSampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                for (i, sample) in reader.samples::<i32>().take(wanted).enumerate() {
                    let sample = sample?;
                    if i % channels == channel as usize {
                        out.push(sample as f32 / scale);
                    }
                }
            }
        }

        if out.len() < len {
            log::warn!(
                "[Source] {} ended early: wanted {} frames at {}, got {}",
                self.path.display(),
                len,
                start,
                out.len()
            );
            out.resize(len, 0.0);
        }

        Ok(out)
    }
}
