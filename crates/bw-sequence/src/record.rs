//! Saved sequence, track and project state

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bw_core::{SampleCount, SampleFormat};
use bw_store::{BlockRecord, DirManager, StorageError};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::sequence::{SeqBlock, Sequence};
use crate::{SequenceError, SequenceResult};

// ═══════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════

/// One block of a saved sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveBlockRecord {
    pub start: SampleCount,
    pub len: SampleCount,
    pub block: BlockRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    #[serde(rename = "maxsamples")]
    pub max_samples: usize,
    /// [`SampleFormat::code`]
    #[serde(rename = "sampleformat")]
    pub sample_format: u32,
    #[serde(rename = "numsamples")]
    pub num_samples: SampleCount,
    pub blocks: Vec<WaveBlockRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub name: String,
    pub rate: f64,
    pub offset: f64,
    pub sequence: SequenceRecord,
    #[serde(default)]
    pub envelope: Envelope,
}

/// Everything needed to reopen a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub tracks: Vec<TrackRecord>,
}

impl ProjectRecord {
    /// Load from JSON file
    pub fn load(path: &Path) -> SequenceResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> SequenceResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Blocks that could not be found while loading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Names of block files replaced by silence
    pub missing: Vec<String>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.missing.extend(other.missing);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SEQUENCE PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════

impl Sequence {
    /// Describe every block, moving temp block files into the project directory
    pub fn to_record(&self) -> SequenceResult<SequenceRecord> {
        let mut blocks = Vec::with_capacity(self.blocks().len());
        for block in self.blocks() {
            blocks.push(WaveBlockRecord {
                start: block.start,
                len: block.len(),
                block: self.dir().save_block_file(&block.file)?,
            });
        }
        Ok(SequenceRecord {
            max_samples: self.max_samples(),
            sample_format: self.format().code(),
            num_samples: self.num_samples(),
            blocks,
        })
    }

    /// Rebuild a sequence, sharing blocks already registered in `dir`.
    ///
    /// Missing block files become silence and are listed in the report; a
    /// block array that does not cover `num_samples` is rejected.
    pub fn from_record(
        dir: &Arc<DirManager>,
        record: &SequenceRecord,
    ) -> SequenceResult<(Sequence, LoadReport)> {
        let format = SampleFormat::from_code(record.sample_format).ok_or_else(|| {
            SequenceError::InvalidRecord(format!("unknown sample format {:#010x}", record.sample_format))
        })?;
        if record.max_samples == 0 {
            return Err(SequenceError::InvalidRecord("maxsamples is zero".to_string()));
        }

        let mut sequence = Sequence::with_max_samples(dir, format, record.max_samples);
        let layout = sequence.layout();
        let mut report = LoadReport::default();
        let mut blocks = Vec::with_capacity(record.blocks.len());

        for entry in &record.blocks {
            let len = usize::try_from(entry.len).map_err(|_| {
                SequenceError::InvalidRecord(format!("block length {} too large", entry.len))
            })?;
            let file = match dir.load_block_file(&entry.block, len, format, layout) {
                Ok(file) => file,
                Err(StorageError::MissingBlockFile(name)) => {
                    log::warn!("[Sequence] Block file {} missing; substituting {} samples of silence", name, len);
                    report.missing.push(name);
                    dir.new_silent_block_file(len, format, layout)
                }
                Err(e) => return Err(e.into()),
            };
            blocks.push(SeqBlock {
                start: entry.start,
                file,
            });
        }

        sequence.restore(blocks, record.num_samples);
        sequence.consistency_check("load")?;
        Ok((sequence, report))
    }
}
