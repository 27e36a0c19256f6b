//! bw-sequence: Block-array editing for BlockWave
//!
//! Provides:
//! - `Sequence`, the copy-on-write block array for one channel
//! - Consistency checking and block dumps
//! - `Envelope`, the gain curve that follows track edits
//! - `WaveTrack`, time-based editing with a per-track lock
//! - Sequence, track and project records

mod envelope;
mod error;
mod record;
mod sequence;
mod track;

pub use envelope::{EnvPoint, Envelope};
pub use error::*;
pub use record::{LoadReport, ProjectRecord, SequenceRecord, TrackRecord, WaveBlockRecord};
pub use sequence::{SeqBlock, Sequence, WaveDisplay};
pub use track::WaveTrack;
