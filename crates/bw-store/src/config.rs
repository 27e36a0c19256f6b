//! Storage configuration

use std::fs;
use std::path::{Path, PathBuf};

use bw_core::SampleFormat;
use serde::{Deserialize, Serialize};

use crate::StorageResult;
use crate::format::SummaryLayout;

/// Default maximum size of the raw-sample region of one block file
pub const DEFAULT_MAX_DISK_BLOCK_SIZE: usize = 1024 * 1024;

/// Block storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Raw-sample bytes per block; sets block length and summary sizes
    pub max_disk_block_size: usize,
    /// Where blocks live until a project directory is set
    pub temp_dir: PathBuf,
    /// Worker threads for on-demand decoding
    pub decode_workers: usize,
    /// Remove leftover block files from the temp directory on open
    pub clean_temp_on_open: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_disk_block_size: DEFAULT_MAX_DISK_BLOCK_SIZE,
            temp_dir: default_temp_dir(),
            decode_workers: 2,
            clean_temp_on_open: true,
        }
    }
}

fn default_temp_dir() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("blockwave")
        .join("temp")
}

impl StorageConfig {
    /// Config rooted at a specific temp directory
    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            ..Self::default()
        }
    }

    /// Maximum block length in samples for a format
    pub fn max_samples(&self, format: SampleFormat) -> usize {
        (self.max_disk_block_size / format.size()).max(1)
    }

    pub fn layout(&self, format: SampleFormat) -> SummaryLayout {
        SummaryLayout::for_max_samples(self.max_samples(format))
    }

    pub fn load(path: &Path) -> StorageResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
