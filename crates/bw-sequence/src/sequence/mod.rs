//! Sequence - block-array storage for one audio channel
//!
//! A sequence is an ordered array of blocks, each a run of samples backed by
//! one shared [`BlockFile`](bw_store::BlockFile). Blocks are sorted,
//! contiguous, and cover exactly `[0, num_samples)`.
//!
//! Block content is never changed in place. Every edit runs in two phases:
//! 1. read what it needs and write every replacement block (fallible)
//! 2. splice the new blocks into the array and shift later starts (infallible)
//!
//! so a failed write leaves the array exactly as it was, and blocks written
//! by the abandoned edit are released when their handles drop.

mod check;
mod display;
mod edit;

pub use display::WaveDisplay;

use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use bw_core::{CancelFlag, SampleBuffer, SampleCount, SampleFormat};
use bw_store::{
    BlockHandle, BlockKind, BlockStats, DataState, DecodeSource, DirManager, StorageError,
    SummaryLayout, combine,
};

use crate::{SequenceError, SequenceResult};

// ═══════════════════════════════════════════════════════════════════════════
// SEQ BLOCK
// ═══════════════════════════════════════════════════════════════════════════

/// One entry of the block array
#[derive(Debug, Clone)]
pub struct SeqBlock {
    /// First sample covered, in sequence coordinates
    pub start: SampleCount,
    pub file: BlockHandle,
}

impl SeqBlock {
    #[inline]
    pub fn len(&self) -> SampleCount {
        self.file.len() as SampleCount
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }

    /// One past the last sample covered
    #[inline]
    pub fn end(&self) -> SampleCount {
        self.start + self.len()
    }

    /// Cached whole-block min / max / rms
    pub fn stats(&self) -> BlockStats {
        self.file.stats()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SEQUENCE
// ═══════════════════════════════════════════════════════════════════════════

/// Cloning is cheap: the clone shares every block file by reference.
#[derive(Clone)]
pub struct Sequence {
    dir: Arc<DirManager>,
    format: SampleFormat,
    max_samples: usize,
    min_samples: usize,
    layout: SummaryLayout,
    blocks: Vec<SeqBlock>,
    num_samples: SampleCount,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("format", &self.format)
            .field("max_samples", &self.max_samples)
            .field("num_samples", &self.num_samples)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl Sequence {
    /// Empty sequence with the block size configured on `dir`
    pub fn new(dir: &Arc<DirManager>, format: SampleFormat) -> Self {
        let max_samples = dir.config().max_samples(format);
        Self::with_max_samples(dir, format, max_samples)
    }

    /// Empty sequence with an explicit maximum block length
    pub fn with_max_samples(dir: &Arc<DirManager>, format: SampleFormat, max_samples: usize) -> Self {
        let max_samples = max_samples.max(2);
        Self {
            dir: Arc::clone(dir),
            format,
            max_samples,
            min_samples: max_samples / 2,
            layout: SummaryLayout::for_max_samples(max_samples),
            blocks: Vec::new(),
            num_samples: 0,
        }
    }

    /// Empty sequence with the same directory, format and block size
    pub fn empty_like(&self) -> Self {
        Self::with_max_samples(&self.dir, self.format, self.max_samples)
    }

    pub fn dir(&self) -> &Arc<DirManager> {
        &self.dir
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn layout(&self) -> SummaryLayout {
        self.layout
    }

    pub fn num_samples(&self) -> SampleCount {
        self.num_samples
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }

    pub fn blocks(&self) -> &[SeqBlock] {
        &self.blocks
    }

    /// Change the format of an empty sequence; false if it holds samples
    pub fn set_sample_format(&mut self, format: SampleFormat) -> bool {
        if !self.blocks.is_empty() {
            return false;
        }
        self.format = format;
        true
    }

    /// Install a loaded block array; the caller runs the consistency check
    pub(crate) fn restore(&mut self, blocks: Vec<SeqBlock>, num_samples: SampleCount) {
        self.blocks = blocks;
        self.num_samples = num_samples;
    }

    // ───────────────────────────────────────────────────────────────────────
    // Lookup
    // ───────────────────────────────────────────────────────────────────────

    /// Index of the block containing sample `pos`.
    ///
    /// `pos == 0` is block 0 and `pos == num_samples` is the last block.
    /// The sequence must not be empty.
    pub fn find_block(&self, pos: SampleCount) -> usize {
        debug_assert!(!self.blocks.is_empty(), "find_block on empty sequence");
        debug_assert!(pos <= self.num_samples, "find_block({}) past end", pos);

        if pos == 0 || self.blocks.len() < 2 {
            return 0;
        }
        if pos >= self.num_samples {
            return self.blocks.len() - 1;
        }
        // Blocks are sorted by start; last block whose start is <= pos
        self.blocks.partition_point(|b| b.start <= pos) - 1
    }

    fn check_range(&self, start: SampleCount, len: SampleCount) -> SequenceResult<()> {
        match start.checked_add(len) {
            Some(end) if end <= self.num_samples => Ok(()),
            _ => Err(SequenceError::OutOfRange {
                start,
                len,
                num_samples: self.num_samples,
            }),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Block I/O
    // ───────────────────────────────────────────────────────────────────────

    /// Read part of one block in this sequence's format.
    ///
    /// A missing alias source reads as silence and a block still waiting for
    /// its decoder reads as placeholder zeros.
    fn read_block(&self, block: &SeqBlock, start: usize, len: usize) -> SequenceResult<SampleBuffer> {
        match block.file.read_data(start, len) {
            Ok(data) if data.format() == self.format => Ok(data),
            Ok(data) => Ok(data.convert(self.format)),
            Err(StorageError::AliasSourceMissing(path)) => {
                log::warn!(
                    "[Sequence] Alias source {} missing; block {} reads as silence",
                    path.display(),
                    block.file.name()
                );
                Ok(SampleBuffer::zeroed(self.format, len))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read part of a block whose samples go into a new block.
    ///
    /// Pending blocks are decoded first; a failed decode is an error.
    fn read_source(&self, block: &SeqBlock, start: usize, len: usize) -> SequenceResult<SampleBuffer> {
        block.file.ensure_decoded()?;
        self.read_block(block, start, len)
    }

    fn read_whole(&self, block: &SeqBlock) -> SequenceResult<SampleBuffer> {
        self.read_source(block, 0, block.file.len())
    }

    /// Whether a block can be shared as is: same directory, format and layout
    fn can_share(&self, handle: &BlockHandle) -> bool {
        Arc::ptr_eq(handle.dir(), &self.dir)
            && handle.format() == self.format
            && handle.layout() == self.layout
    }

    /// Write a new block holding `data` at `start`
    fn write_block(&self, start: SampleCount, data: &SampleBuffer) -> SequenceResult<SeqBlock> {
        let file = if data.format() == self.format {
            self.dir.new_block_file(data, self.layout)?
        } else {
            self.dir.new_block_file(&data.convert(self.format), self.layout)?
        };
        Ok(SeqBlock { start, file })
    }

    /// Take a reference to a block for this sequence.
    ///
    /// Compatible blocks go through copy-on-reference; blocks from another
    /// directory, format or block size are rewritten here.
    fn adopt(&self, handle: &BlockHandle) -> SequenceResult<BlockHandle> {
        if self.can_share(handle) {
            return Ok(self.dir.copy_block_file(handle)?);
        }
        handle.ensure_decoded()?;
        let data = match handle.read_data(0, handle.len()) {
            Ok(data) => data.convert(self.format),
            Err(StorageError::AliasSourceMissing(_)) => SampleBuffer::zeroed(self.format, handle.len()),
            Err(e) => return Err(e.into()),
        };
        Ok(self.dir.new_block_file(&data, self.layout)?)
    }

    /// Replace `range` with `pieces`, moving every later block by `added - removed`
    fn splice(
        &mut self,
        range: Range<usize>,
        pieces: Vec<SeqBlock>,
        added: SampleCount,
        removed: SampleCount,
    ) {
        for block in &mut self.blocks[range.end..] {
            block.start = block.start + added - removed;
        }
        self.blocks.splice(range, pieces);
        self.num_samples = self.num_samples + added - removed;
    }

    // ───────────────────────────────────────────────────────────────────────
    // Get / Set
    // ───────────────────────────────────────────────────────────────────────

    /// Read `len` samples starting at `start`
    pub fn get(&self, start: SampleCount, len: SampleCount) -> SequenceResult<SampleBuffer> {
        self.gather(start, len, false)
    }

    /// `get`, optionally decoding pending blocks instead of reading placeholders
    fn gather(&self, start: SampleCount, len: SampleCount, decode: bool) -> SequenceResult<SampleBuffer> {
        self.check_range(start, len)?;
        let mut out = SampleBuffer::with_capacity(self.format, len as usize);
        if len == 0 {
            return Ok(out);
        }

        let end = start + len;
        let mut b = self.find_block(start);
        let mut pos = start;
        while pos < end {
            let block = &self.blocks[b];
            let offset = (pos - block.start) as usize;
            let count = (block.end().min(end) - pos) as usize;
            let part = if decode {
                self.read_source(block, offset, count)?
            } else {
                self.read_block(block, offset, count)?
            };
            out.extend_from(&part);
            pos += count as SampleCount;
            b += 1;
        }
        Ok(out)
    }

    /// Overwrite `[start, start + len)` with `data`, or with silence if `None`.
    ///
    /// Each touched block is rewritten to a new block file; other owners of
    /// the old files keep the old content.
    pub fn set(
        &mut self,
        start: SampleCount,
        len: SampleCount,
        data: Option<&SampleBuffer>,
    ) -> SequenceResult<()> {
        self.check_range(start, len)?;
        if let Some(data) = data {
            if (data.len() as SampleCount) < len {
                return Err(SequenceError::BufferTooShort {
                    needed: len,
                    got: data.len() as SampleCount,
                });
            }
        }
        if len == 0 {
            return Ok(());
        }

        let end = start + len;
        let first = self.find_block(start);
        let mut replaced = Vec::new();
        let mut b = first;
        let mut pos = start;

        while pos < end {
            let block = &self.blocks[b];
            let offset = (pos - block.start) as usize;
            let count = (block.end().min(end) - pos) as usize;
            let src_offset = (pos - start) as usize;

            let content = if offset == 0 && count == block.file.len() {
                match data {
                    Some(data) => data.slice(src_offset, count),
                    None => SampleBuffer::zeroed(self.format, count),
                }
            } else {
                let mut buf = self.read_whole(block)?;
                match data {
                    Some(data) => buf.write_at(offset, &data.slice(src_offset, count)),
                    None => buf.silence_range(offset, count),
                }
                buf
            };

            replaced.push(self.write_block(block.start, &content)?);
            pos += count as SampleCount;
            b += 1;
        }

        self.splice(first..b, replaced, 0, 0);
        self.check_after("set")
    }

    /// Overwrite a range with silence
    pub fn set_silence(&mut self, start: SampleCount, len: SampleCount) -> SequenceResult<()> {
        self.set(start, len, None)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Append
    // ───────────────────────────────────────────────────────────────────────

    /// Append samples at the end.
    ///
    /// An undersized last block is topped up to `max_samples` first; the rest
    /// is written in `max_samples` chunks.
    pub fn append(&mut self, data: &SampleBuffer) -> SequenceResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len();
        let mut pieces = Vec::new();
        let mut replace_last = false;
        let mut offset = 0usize;
        let mut pos = self.num_samples;

        if let Some(last) = self.blocks.last() {
            let last_len = last.file.len();
            if last_len < self.min_samples {
                let add = (self.max_samples - last_len).min(len);
                let mut buf = self.read_whole(last)?;
                buf.extend_from(&data.slice(0, add));
                pieces.push(self.write_block(last.start, &buf)?);
                replace_last = true;
                offset = add;
                pos += add as SampleCount;
            }
        }

        while offset < len {
            let count = self.max_samples.min(len - offset);
            pieces.push(self.write_block(pos, &data.slice(offset, count))?);
            offset += count;
            pos += count as SampleCount;
        }

        let end = self.blocks.len();
        let range = if replace_last { end - 1..end } else { end..end };
        self.splice(range, pieces, len as SampleCount, 0);
        self.check_after("append")
    }

    /// Append a stream of buffers, polling `cancel` between them.
    ///
    /// Either every chunk is appended or, on error or cancel, none is.
    pub fn append_chunks<I>(&mut self, chunks: I, cancel: &CancelFlag) -> SequenceResult<()>
    where
        I: IntoIterator<Item = SampleBuffer>,
    {
        let mut staged = self.clone();
        for chunk in chunks {
            if cancel.is_cancelled() {
                log::info!("[Sequence] Append cancelled after {} samples", staged.num_samples - self.num_samples);
                return Err(SequenceError::Cancelled);
            }
            staged.append(&chunk)?;
        }
        *self = staged;
        Ok(())
    }

    /// Append an existing block by reference (duplicated if locked)
    pub fn append_block(&mut self, handle: &BlockHandle) -> SequenceResult<()> {
        if handle.is_empty() {
            return Ok(());
        }
        let file = self.adopt(handle)?;
        let added = file.len() as SampleCount;
        let end = self.blocks.len();
        let piece = SeqBlock {
            start: self.num_samples,
            file,
        };
        self.splice(end..end, vec![piece], added, 0);
        self.check_after("append_block")
    }

    /// Append `len` frames of `channel` from an external WAV without copying samples
    pub fn append_alias(
        &mut self,
        path: &Path,
        start: SampleCount,
        len: SampleCount,
        channel: u16,
    ) -> SequenceResult<()> {
        let mut pieces = Vec::new();
        let mut offset: SampleCount = 0;
        while offset < len {
            let count = (self.max_samples as SampleCount).min(len - offset) as usize;
            let file = self.dir.new_alias_block_file(
                path,
                start + offset,
                count,
                channel,
                self.format,
                self.layout,
            )?;
            pieces.push(SeqBlock {
                start: self.num_samples + offset,
                file,
            });
            offset += count as SampleCount;
        }

        let end = self.blocks.len();
        self.splice(end..end, pieces, len, 0);
        self.check_after("append_alias")
    }

    /// Append blocks that decode in the background; they read as
    /// placeholders until their worker finishes
    pub fn append_pending(
        &mut self,
        source: Arc<dyn DecodeSource>,
        start: SampleCount,
        len: SampleCount,
        channel: u16,
    ) -> SequenceResult<()> {
        let mut pieces = Vec::new();
        let mut offset: SampleCount = 0;
        while offset < len {
            let count = (self.max_samples as SampleCount).min(len - offset) as usize;
            let file = self.dir.new_pending_block_file(
                Arc::clone(&source),
                start + offset,
                count,
                channel,
                self.format,
                self.layout,
            );
            pieces.push(SeqBlock {
                start: self.num_samples + offset,
                file,
            });
            offset += count as SampleCount;
        }

        let end = self.blocks.len();
        self.splice(end..end, pieces, len, 0);
        self.check_after("append_pending")
    }

    // ───────────────────────────────────────────────────────────────────────
    // Blocking
    // ───────────────────────────────────────────────────────────────────────

    /// Split `data` into `ceil(len / max_samples)` near-equal blocks starting at `start`
    pub fn blockify(&self, start: SampleCount, data: &SampleBuffer) -> SequenceResult<Vec<SeqBlock>> {
        let len = data.len();
        if len == 0 {
            return Ok(Vec::new());
        }

        let num = len.div_ceil(self.max_samples);
        let mut blocks = Vec::with_capacity(num);
        for i in 0..num {
            let from = i * len / num;
            let to = (i + 1) * len / num;
            blocks.push(self.write_block(start + from as SampleCount, &data.slice(from, to - from))?);
        }
        Ok(blocks)
    }

    /// Length of a read starting at `start` that ends on a block boundary
    pub fn best_block_size(&self, start: SampleCount) -> usize {
        if start >= self.num_samples {
            return self.max_samples;
        }

        let mut b = self.find_block(start);
        let mut result = (self.blocks[b].end() - start) as usize;
        while result < self.min_samples
            && b + 1 < self.blocks.len()
            && self.blocks[b + 1].file.len() + result <= self.max_samples
        {
            b += 1;
            result += self.blocks[b].file.len();
        }
        result
    }

    /// Samples to append so the last block reaches `max_samples`
    pub fn ideal_append_len(&self) -> usize {
        match self.blocks.last() {
            Some(last) if last.file.len() < self.max_samples => self.max_samples - last.file.len(),
            _ => self.max_samples,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Whole-sequence operations
    // ───────────────────────────────────────────────────────────────────────

    /// Mark every block as part of a saved state
    pub fn lock(&self) {
        for block in &self.blocks {
            block.file.lock();
        }
    }

    pub fn unlock(&self) {
        for block in &self.blocks {
            block.file.unlock();
        }
    }

    /// Rewrite every owned block in `format`, polling `cancel` once per block.
    ///
    /// Alias and silent blocks are kept; reads convert them. Pending blocks
    /// are decoded and rewritten, except those whose decode failed.
    /// Returns false if the sequence already had that format. On cancel or
    /// error the sequence is unchanged.
    pub fn convert_to_sample_format(
        &mut self,
        format: SampleFormat,
        cancel: &CancelFlag,
    ) -> SequenceResult<bool> {
        if format == self.format {
            return Ok(false);
        }

        let mut converted = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if cancel.is_cancelled() {
                log::info!("[Sequence] Format conversion cancelled");
                return Err(SequenceError::Cancelled);
            }

            let keep = match block.file.kind() {
                BlockKind::Alias(_) | BlockKind::Silent => true,
                BlockKind::Pending(_) => block.file.data_state() == DataState::Failed,
                BlockKind::Owned => false,
            };
            if keep {
                converted.push(block.clone());
                continue;
            }

            block.file.ensure_decoded()?;
            let data = block.file.read_data(0, block.file.len())?.convert(format);
            let file = self.dir.new_block_file(&data, self.layout)?;
            converted.push(SeqBlock {
                start: block.start,
                file,
            });
        }

        log::debug!("[Sequence] Converted {} blocks from {} to {}", converted.len(), self.format, format);
        self.blocks = converted;
        self.format = format;
        self.check_after("convert_to_sample_format")?;
        Ok(true)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Statistics
    // ───────────────────────────────────────────────────────────────────────

    /// Exact min / max (and rms) of `[start, start + len)`.
    ///
    /// Fully covered blocks use their cached statistics; only the two
    /// boundary blocks are scanned, and those through their fine summaries.
    pub fn get_min_max(&self, start: SampleCount, len: SampleCount) -> SequenceResult<BlockStats> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(BlockStats::SILENT);
        }

        let end = start + len;
        let first = self.find_block(start);
        let last = self.find_block(end - 1);
        let mut parts = Vec::with_capacity(last - first + 1);

        for block in &self.blocks[first..=last] {
            let s = start.max(block.start);
            let e = end.min(block.end());
            let stats = if s == block.start && e == block.end() {
                block.stats()
            } else {
                match block
                    .file
                    .min_max_range((s - block.start) as usize, (e - s) as usize)
                {
                    Ok(stats) => stats,
                    Err(StorageError::AliasSourceMissing(_)) => BlockStats::SILENT,
                    Err(e) => return Err(e.into()),
                }
            };
            parts.push((stats, (e - s) as usize));
        }

        Ok(combine(parts))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
