//! Block files
//!
//! A block file is one immutable run of samples and its two-level summary,
//! stored under a generated name in the temp or project directory. The
//! storage strategy is an enum:
//! - `Owned`: header, summaries and raw samples on disk
//! - `Alias`: header and summaries on disk, samples re-read from an external WAV
//! - `Pending`: filled in by a decode worker; placeholder values until then
//! - `Silent`: no file at all, reads as zeros
//!
//! Reference counting and registration are done by [`DirManager`](crate::DirManager);
//! a block file never deletes itself.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use bw_core::{SampleBuffer, SampleCount, SampleFormat};
use parking_lot::{Mutex, RwLock};

use crate::format::{
    BYTES_PER_FRAME, BlockStats, FINE_FRAME_SAMPLES, SummaryFrame, SummaryLayout, SummaryLevel,
    decode_frames, encode_header, read_header_tag,
};
use crate::source::{DecodeSource, WavSource};
use crate::summary::{Summary, combine, frame_of, stats_from_fine};
use crate::{StorageError, StorageResult};

// ═══════════════════════════════════════════════════════════════════════════
// DATA STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Whether a block's samples and summary can be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataState {
    /// Samples and summary are on disk (or implicit, for silent blocks)
    Ready = 0,
    /// Waiting for a decode worker
    Pending = 1,
    /// Decode failed; reads return placeholders forever
    Failed = 2,
}

impl From<u8> for DataState {
    fn from(v: u8) -> Self {
        match v {
            0 => DataState::Ready,
            1 => DataState::Pending,
            _ => DataState::Failed,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BLOCK KIND
// ═══════════════════════════════════════════════════════════════════════════

/// Location of aliased samples in an external file
#[derive(Debug, Clone, PartialEq)]
pub struct AliasInfo {
    pub path: PathBuf,
    /// First frame in the external file
    pub start: SampleCount,
    pub channel: u16,
}

/// Source of an on-demand decoded block
#[derive(Debug, Clone)]
pub struct PendingInfo {
    pub source: Arc<dyn DecodeSource>,
    pub start: SampleCount,
    pub channel: u16,
}

#[derive(Debug, Clone)]
pub enum BlockKind {
    Owned,
    Alias(AliasInfo),
    Pending(PendingInfo),
    Silent,
}

// ═══════════════════════════════════════════════════════════════════════════
// BLOCK FILE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct BlockFile {
    name: String,
    path: RwLock<PathBuf>,
    len: usize,
    format: SampleFormat,
    layout: SummaryLayout,
    kind: BlockKind,
    /// Published once: at construction, or by the decode worker before `state` flips
    stats: OnceLock<BlockStats>,
    state: AtomicU8,
    locked: AtomicBool,
    refs: AtomicUsize,
    source_missing: AtomicBool,
    /// Serializes decode completion between the worker and synchronous callers
    decode_lock: Mutex<()>,
}

impl BlockFile {
    fn with_kind(
        name: String,
        path: PathBuf,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
        kind: BlockKind,
        state: DataState,
    ) -> Self {
        Self {
            name,
            path: RwLock::new(path),
            len,
            format,
            layout,
            kind,
            stats: OnceLock::new(),
            state: AtomicU8::new(state as u8),
            locked: AtomicBool::new(false),
            refs: AtomicUsize::new(1),
            source_missing: AtomicBool::new(false),
            decode_lock: Mutex::new(()),
        }
    }

    fn ready(mut self, stats: BlockStats) -> Self {
        // Freshly constructed, so the cell is empty
        let _ = self.stats.set(stats);
        *self.state.get_mut() = DataState::Ready as u8;
        self
    }

    /// Write samples and summary to `path`
    pub(crate) fn create(
        name: String,
        path: PathBuf,
        data: &SampleBuffer,
        layout: SummaryLayout,
    ) -> StorageResult<Self> {
        let summary = Summary::compute(&data.to_f32());
        let header = encode_header(&layout, &summary.coarse, &summary.fine);
        write_block(&path, &header, Some(data.as_bytes()))?;

        Ok(Self::with_kind(
            name,
            path,
            data.len(),
            data.format(),
            layout,
            BlockKind::Owned,
            DataState::Ready,
        )
        .ready(summary.stats))
    }

    /// Decode the aliased range once and write only header + summary
    pub(crate) fn create_alias(
        name: String,
        path: PathBuf,
        alias: AliasInfo,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> StorageResult<Self> {
        let decoded = WavSource::new(&alias.path).decode(alias.start, len, alias.channel)?;
        // Summaries must describe the samples exactly as reads will return them
        let quantized = SampleBuffer::from_f32(format, &decoded).to_f32();
        let summary = Summary::compute(&quantized);
        let header = encode_header(&layout, &summary.coarse, &summary.fine);
        write_block(&path, &header, None)?;

        Ok(Self::with_kind(
            name,
            path,
            len,
            format,
            layout,
            BlockKind::Alias(alias),
            DataState::Ready,
        )
        .ready(summary.stats))
    }

    pub(crate) fn pending(
        name: String,
        path: PathBuf,
        info: PendingInfo,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> Self {
        Self::with_kind(
            name,
            path,
            len,
            format,
            layout,
            BlockKind::Pending(info),
            DataState::Pending,
        )
    }

    pub(crate) fn silent(
        name: String,
        path: PathBuf,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> Self {
        Self::with_kind(
            name,
            path,
            len,
            format,
            layout,
            BlockKind::Silent,
            DataState::Ready,
        )
        .ready(SummaryFrame::SILENT)
    }

    /// Open an existing owned block (also used for decoded blocks saved as plain files)
    pub(crate) fn open(
        name: String,
        path: PathBuf,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> StorageResult<Self> {
        let stats = read_stats(&path, &name, len, &layout)?;

        let expected = (layout.header_len() + len * format.size()) as u64;
        let actual = fs::metadata(&path)?.len();
        if actual != expected {
            return Err(StorageError::InvalidBlockFile {
                name,
                reason: format!("expected {} bytes, found {}", expected, actual),
            });
        }

        Ok(
            Self::with_kind(name, path, len, format, layout, BlockKind::Owned, DataState::Ready)
                .ready(stats),
        )
    }

    pub(crate) fn open_alias(
        name: String,
        path: PathBuf,
        alias: AliasInfo,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> StorageResult<Self> {
        let stats = read_stats(&path, &name, len, &layout)?;
        Ok(Self::with_kind(
            name,
            path,
            len,
            format,
            layout,
            BlockKind::Alias(alias),
            DataState::Ready,
        )
        .ready(stats))
    }

    /// Full copy under a new name; used for locked blocks
    pub(crate) fn duplicate(&self, name: String, path: PathBuf) -> StorageResult<Self> {
        let kind = match &self.kind {
            BlockKind::Silent => {
                return Ok(Self::silent(name, path, self.len, self.format, self.layout));
            }
            BlockKind::Pending(_) if !self.is_data_available() => {
                return Err(StorageError::DataNotAvailable(self.name.clone()));
            }
            BlockKind::Pending(_) | BlockKind::Owned => BlockKind::Owned,
            BlockKind::Alias(alias) => BlockKind::Alias(alias.clone()),
        };

        let source = self.path();
        fs::copy(&source, &path).map_err(|e| StorageError::CreateFailed {
            path: path.clone(),
            source: e,
        })?;

        Ok(
            Self::with_kind(name, path, self.len, self.format, self.layout, kind, DataState::Ready)
                .ready(self.stats()),
        )
    }

    // ───────────────────────────────────────────────────────────────────────
    // Attributes
    // ───────────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> PathBuf {
        self.path.read().clone()
    }

    /// Length in samples
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn layout(&self) -> SummaryLayout {
        self.layout
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, BlockKind::Alias(_))
    }

    pub fn is_silent(&self) -> bool {
        matches!(self.kind, BlockKind::Silent)
    }

    pub fn alias_info(&self) -> Option<&AliasInfo> {
        match &self.kind {
            BlockKind::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    /// Whether this block has a file on disk once its data is available
    pub fn has_file(&self) -> bool {
        !self.is_silent()
    }

    pub fn data_state(&self) -> DataState {
        DataState::from(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_data_available(&self) -> bool {
        self.data_state() == DataState::Ready
    }

    /// Whole-block statistics; placeholder while data is unavailable
    pub fn stats(&self) -> BlockStats {
        if !self.is_data_available() {
            return SummaryFrame::PLACEHOLDER;
        }
        self.stats.get().copied().unwrap_or(SummaryFrame::PLACEHOLDER)
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub(crate) fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement; returns the remaining count
    pub(crate) fn sub_ref(&self) -> usize {
        self.refs.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Set after a read found the aliased file missing
    pub fn is_source_missing(&self) -> bool {
        self.source_missing.load(Ordering::Relaxed)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Reads
    // ───────────────────────────────────────────────────────────────────────

    fn check_range(&self, start: usize, len: usize) -> StorageResult<()> {
        debug_assert!(
            start + len <= self.len,
            "read [{}, {}) past end of {} ({} samples)",
            start,
            start + len,
            self.name,
            self.len
        );
        if start + len > self.len {
            return Err(StorageError::OutOfBounds {
                start,
                len,
                block_len: self.len,
            });
        }
        Ok(())
    }

    /// Read `len` samples at block-relative `start` in the block's format
    pub fn read_data(&self, start: usize, len: usize) -> StorageResult<SampleBuffer> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(SampleBuffer::new(self.format));
        }

        match &self.kind {
            BlockKind::Owned => self.read_raw(start, len),
            BlockKind::Pending(_) if self.is_data_available() => self.read_raw(start, len),
            BlockKind::Pending(_) | BlockKind::Silent => {
                Ok(SampleBuffer::zeroed(self.format, len))
            }
            BlockKind::Alias(alias) => self.read_alias(alias, start, len),
        }
    }

    fn read_raw(&self, start: usize, len: usize) -> StorageResult<SampleBuffer> {
        let size = self.format.size();
        let mut file = File::open(&*self.path.read())?;
        file.seek(SeekFrom::Start(
            (self.layout.header_len() + start * size) as u64,
        ))?;

        let mut bytes = vec![0u8; len * size];
        file.read_exact(&mut bytes)?;
        Ok(SampleBuffer::from_bytes(self.format, bytes))
    }

    fn read_alias(&self, alias: &AliasInfo, start: usize, len: usize) -> StorageResult<SampleBuffer> {
        match WavSource::new(&alias.path).decode(alias.start + start as SampleCount, len, alias.channel)
        {
            Ok(samples) => {
                self.source_missing.store(false, Ordering::Relaxed);
                Ok(SampleBuffer::from_f32(self.format, &samples))
            }
            Err(err) => {
                if matches!(err, StorageError::AliasSourceMissing(_)) {
                    self.source_missing.store(true, Ordering::Relaxed);
                }
                Err(err)
            }
        }
    }

    /// All used frames of one summary level
    pub fn read_summary(&self, level: SummaryLevel) -> StorageResult<Vec<SummaryFrame>> {
        let count = self.len.div_ceil(level.samples_per_frame());
        self.read_summary_frames(level, 0, count)
    }

    /// Frames `[first, first + count)` of one summary level
    pub fn read_summary_frames(
        &self,
        level: SummaryLevel,
        first: usize,
        count: usize,
    ) -> StorageResult<Vec<SummaryFrame>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if self.is_silent() {
            return Ok(vec![SummaryFrame::SILENT; count]);
        }
        if !self.is_data_available() {
            return Ok(vec![SummaryFrame::PLACEHOLDER; count]);
        }
        if first + count > self.layout.capacity(level) {
            return Err(StorageError::OutOfBounds {
                start: first,
                len: count,
                block_len: self.layout.capacity(level),
            });
        }

        let mut file = File::open(&*self.path.read())?;
        file.seek(SeekFrom::Start(
            (self.layout.offset(level) + first * BYTES_PER_FRAME) as u64,
        ))?;
        let mut bytes = vec![0u8; count * BYTES_PER_FRAME];
        file.read_exact(&mut bytes)?;
        Ok(decode_frames(&bytes, count))
    }

    /// Exact min/max (and weighted rms) over block-relative `[start, start + len)`.
    ///
    /// Fully covered fine frames come from the summary; only the partial
    /// frames at either edge are read from sample data.
    pub fn min_max_range(&self, start: usize, len: usize) -> StorageResult<BlockStats> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(SummaryFrame::SILENT);
        }
        if start == 0 && len == self.len {
            return Ok(self.stats());
        }
        if self.is_silent() {
            return Ok(SummaryFrame::SILENT);
        }
        if !self.is_data_available() {
            return Ok(SummaryFrame::PLACEHOLDER);
        }

        let end = start + len;
        let first_full = start.div_ceil(FINE_FRAME_SAMPLES);
        let last_full = end / FINE_FRAME_SAMPLES;

        if first_full >= last_full {
            return Ok(frame_of(&self.read_data(start, len)?.to_f32()));
        }

        let mut parts = Vec::new();

        let head_end = first_full * FINE_FRAME_SAMPLES;
        if start < head_end {
            let head = self.read_data(start, head_end - start)?;
            parts.push((frame_of(&head.to_f32()), head.len()));
        }

        let frames = self.read_summary_frames(SummaryLevel::Fine, first_full, last_full - first_full)?;
        parts.extend(frames.into_iter().map(|f| (f, FINE_FRAME_SAMPLES)));

        let tail_start = last_full * FINE_FRAME_SAMPLES;
        if end > tail_start {
            let tail = self.read_data(tail_start, end - tail_start)?;
            parts.push((frame_of(&tail.to_f32()), tail.len()));
        }

        Ok(combine(parts))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Decode completion and file management
    // ───────────────────────────────────────────────────────────────────────

    pub(crate) fn pending_info(&self) -> Option<&PendingInfo> {
        match &self.kind {
            BlockKind::Pending(info) => Some(info),
            _ => None,
        }
    }

    /// Decode a pending block on the calling thread unless it is already ready.
    ///
    /// Used before block content is rewritten, so placeholder zeros never
    /// become real samples. A block whose decode failed has no data to give.
    pub fn ensure_decoded(&self) -> StorageResult<()> {
        match self.data_state() {
            DataState::Ready => Ok(()),
            DataState::Failed => Err(StorageError::DataNotAvailable(self.name.clone())),
            DataState::Pending => {
                let Some(info) = self.pending_info() else {
                    return Ok(());
                };
                log::debug!("[BlockFile] Decoding {} on demand", self.name);
                let samples = info.source.decode(info.start, self.len, info.channel)?;
                self.complete_decode(&samples)
            }
        }
    }

    /// Write decoded samples and publish them to readers.
    ///
    /// The first completion wins; later ones are dropped.
    pub(crate) fn complete_decode(&self, samples: &[f32]) -> StorageResult<()> {
        let _guard = self.decode_lock.lock();
        if self.is_data_available() {
            return Ok(());
        }
        let data = SampleBuffer::from_f32(self.format, samples);
        let summary = Summary::compute(&data.to_f32());
        let header = encode_header(&self.layout, &summary.coarse, &summary.fine);

        let path = self.path();
        write_block(&path, &header, Some(data.as_bytes()))?;

        let _ = self.stats.set(summary.stats);
        self.state.store(DataState::Ready as u8, Ordering::Release);
        Ok(())
    }

    /// Mark a still-pending block as failed
    pub(crate) fn fail_decode(&self) {
        let _guard = self.decode_lock.lock();
        let _ = self.state.compare_exchange(
            DataState::Pending as u8,
            DataState::Failed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Move the backing file, falling back to copy + remove across filesystems
    pub(crate) fn move_to(&self, new_path: PathBuf) -> StorageResult<()> {
        let mut path = self.path.write();
        if *path == new_path {
            return Ok(());
        }
        if self.has_file() && path.exists() {
            if fs::rename(&*path, &new_path).is_err() {
                fs::copy(&*path, &new_path).map_err(|e| StorageError::CreateFailed {
                    path: new_path.clone(),
                    source: e,
                })?;
                fs::remove_file(&*path)?;
            }
        }
        *path = new_path;
        Ok(())
    }

    /// Delete the backing file, if any
    pub(crate) fn remove_file(&self) {
        if !self.has_file() {
            return;
        }
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("[BlockFile] Could not delete {}: {}", path.display(), e),
        }
    }
}

fn write_block(path: &Path, header: &[u8], data: Option<&[u8]>) -> StorageResult<()> {
    let create_failed = |e: std::io::Error| StorageError::CreateFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(path).map_err(create_failed)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(header).map_err(create_failed)?;
    if let Some(data) = data {
        writer.write_all(data).map_err(create_failed)?;
    }
    writer.flush().map_err(create_failed)?;
    Ok(())
}

fn read_stats(path: &Path, name: &str, len: usize, layout: &SummaryLayout) -> StorageResult<BlockStats> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::MissingBlockFile(name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    read_header_tag(&mut file, name)?;

    let count = len.div_ceil(FINE_FRAME_SAMPLES);
    if count > layout.frames_256 {
        return Err(StorageError::InvalidBlockFile {
            name: name.to_string(),
            reason: format!("{} samples exceed block capacity {}", len, layout.max_samples),
        });
    }

    file.seek(SeekFrom::Start(layout.offset(SummaryLevel::Fine) as u64))?;
    let mut bytes = vec![0u8; count * BYTES_PER_FRAME];
    file.read_exact(&mut bytes)
        .map_err(|e| StorageError::InvalidBlockFile {
            name: name.to_string(),
            reason: format!("truncated summary: {}", e),
        })?;

    Ok(stats_from_fine(&decode_frames(&bytes, count), len))
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i % 1000) as f32 / 1000.0) - 0.5).collect()
    }

    fn make_block(dir: &Path, samples: &[f32]) -> BlockFile {
        let layout = SummaryLayout::for_max_samples(4096);
        let data = SampleBuffer::from_f32(SampleFormat::Float32, samples);
        BlockFile::create("b00001.auf".into(), dir.join("b00001.auf"), &data, layout).unwrap()
    }

    #[test]
    fn test_create_writes_layout() {
        let dir = tempdir().unwrap();
        let block = make_block(dir.path(), &ramp(3000));

        let layout = block.layout();
        let size = fs::metadata(block.path()).unwrap().len() as usize;
        assert_eq!(size, layout.header_len() + 3000 * 4);
        assert_eq!(block.len(), 3000);
        assert_eq!(block.ref_count(), 1);
        assert!(block.is_data_available());
    }

    #[test]
    fn test_read_data_window() {
        let dir = tempdir().unwrap();
        let samples = ramp(3000);
        let block = make_block(dir.path(), &samples);

        let window = block.read_data(1234, 100).unwrap();
        assert_eq!(window.to_f32(), samples[1234..1334].to_vec());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "past end")]
    fn test_read_past_end_asserts() {
        let dir = tempdir().unwrap();
        let block = make_block(dir.path(), &ramp(10));
        let _ = block.read_data(5, 6);
    }

    #[test]
    fn test_summary_levels() {
        let dir = tempdir().unwrap();
        let samples = ramp(3000);
        let block = make_block(dir.path(), &samples);

        let fine = block.read_summary(SummaryLevel::Fine).unwrap();
        assert_eq!(fine.len(), 3000usize.div_ceil(256));
        assert_eq!(fine[0], frame_of(&samples[..256]));

        let coarse = block.read_summary(SummaryLevel::Coarse).unwrap();
        assert_eq!(coarse.len(), 1);
        assert_eq!(coarse[0].min, block.stats().min);
        assert_eq!(coarse[0].max, block.stats().max);
    }

    #[test]
    fn test_min_max_range_is_exact() {
        let dir = tempdir().unwrap();
        let mut samples = ramp(3000);
        samples[700] = 0.95;
        samples[2999] = -0.99;
        let block = make_block(dir.path(), &samples);

        for &(start, len) in &[(0, 3000), (10, 5), (100, 900), (255, 2), (257, 2743), (699, 2)] {
            let got = block.min_max_range(start, len).unwrap();
            let expected = frame_of(&samples[start..start + len]);
            assert_eq!(got.min, expected.min, "min over [{}, +{})", start, len);
            assert_eq!(got.max, expected.max, "max over [{}, +{})", start, len);
        }
    }

    #[test]
    fn test_open_recomputes_same_stats() {
        let dir = tempdir().unwrap();
        let block = make_block(dir.path(), &ramp(3000));
        let stats = block.stats();

        let reopened = BlockFile::open(
            block.name().to_string(),
            block.path(),
            3000,
            SampleFormat::Float32,
            block.layout(),
        )
        .unwrap();
        assert_eq!(reopened.stats(), stats);
    }

    #[test]
    fn test_open_missing() {
        let dir = tempdir().unwrap();
        let err = BlockFile::open(
            "b00042.auf".into(),
            dir.path().join("b00042.auf"),
            10,
            SampleFormat::Float32,
            SummaryLayout::for_max_samples(4096),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::MissingBlockFile(name) if name == "b00042.auf"));
    }

    #[test]
    fn test_open_wrong_length() {
        let dir = tempdir().unwrap();
        let block = make_block(dir.path(), &ramp(100));
        let err = BlockFile::open(
            block.name().to_string(),
            block.path(),
            99,
            SampleFormat::Float32,
            block.layout(),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidBlockFile { .. }));
    }

    #[test]
    fn test_silent_block() {
        let dir = tempdir().unwrap();
        let block = BlockFile::silent(
            "b00002.auf".into(),
            dir.path().join("b00002.auf"),
            500,
            SampleFormat::Int16,
            SummaryLayout::for_max_samples(4096),
        );
        assert!(!block.path().exists());
        assert_eq!(block.stats(), SummaryFrame::SILENT);
        assert!(block.read_data(0, 500).unwrap().to_f32().iter().all(|&s| s == 0.0));
        assert_eq!(block.read_summary(SummaryLevel::Fine).unwrap().len(), 2);
    }

    #[test]
    fn test_move_to() {
        let dir = tempdir().unwrap();
        let block = make_block(dir.path(), &ramp(100));
        let old = block.path();
        let target = dir.path().join("project");
        fs::create_dir(&target).unwrap();

        block.move_to(target.join(block.name())).unwrap();
        assert!(!old.exists());
        assert!(block.path().exists());
        assert_eq!(block.read_data(0, 100).unwrap().len(), 100);
    }
}
