//! bw-store: Block file storage for BlockWave
//!
//! Provides:
//! - The `.auf` block file format with 256 / 64K summaries
//! - `BlockFile` in owned, alias, pending-decode and silent flavors
//! - `DirManager`, the ref-counted, deduplicating block directory
//! - `BlockHandle`, the counted reference held by sequences
//! - A decode worker pool for on-demand blocks

mod blockfile;
mod config;
mod decode;
mod dir;
mod error;
mod format;
mod handle;
mod record;
mod source;
mod summary;

pub use blockfile::{AliasInfo, BlockFile, BlockKind, DataState, PendingInfo};
pub use config::{DEFAULT_MAX_DISK_BLOCK_SIZE, StorageConfig};
pub use dir::DirManager;
pub use error::*;
pub use format::{
    BLOCK_EXTENSION, BYTES_PER_FRAME, BlockStats, COARSE_FRAME_SAMPLES, FINE_FRAME_SAMPLES,
    HEADER_TAG, HEADER_TAG_LEN, SummaryFrame, SummaryLayout, SummaryLevel,
};
pub use handle::BlockHandle;
pub use record::BlockRecord;
pub use source::{DecodeSource, WavSource};
pub use summary::{Summary, combine, frame_of};
