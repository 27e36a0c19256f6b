//! Structural edits: paste, delete, copy, insert silence

use std::sync::Arc;

use bw_core::{SampleBuffer, SampleCount};

use super::{SeqBlock, Sequence};
use crate::{SequenceError, SequenceResult};

impl Sequence {
    /// Insert the whole of `src` before sample `at`.
    ///
    /// Into an empty sequence the source blocks are shared as they are. If
    /// the target block has room the source is spliced into it; otherwise the
    /// edges are re-blocked and interior source blocks are shared.
    pub fn paste(&mut self, at: SampleCount, src: &Sequence) -> SequenceResult<()> {
        if at > self.num_samples {
            return Err(SequenceError::OutOfRange {
                start: at,
                len: 0,
                num_samples: self.num_samples,
            });
        }
        if src.num_samples == 0 {
            return Ok(());
        }

        // Shared blocks must match our directory, format and summary layout
        let imported;
        let src = if Arc::ptr_eq(&src.dir, &self.dir)
            && src.format == self.format
            && src.layout == self.layout
        {
            src
        } else {
            imported = self.import(src)?;
            &imported
        };
        let added = src.num_samples;

        if self.blocks.is_empty() {
            let mut pieces = Vec::with_capacity(src.blocks.len());
            for block in &src.blocks {
                pieces.push(SeqBlock {
                    start: block.start,
                    file: self.dir.copy_block_file(&block.file)?,
                });
            }
            self.splice(0..0, pieces, added, 0);
            return self.check_after("paste");
        }

        let b = self.find_block(at);
        let block = &self.blocks[b];
        let block_len = block.file.len();
        let split = (at - block.start) as usize;

        if added <= (self.max_samples - block_len.min(self.max_samples)) as SampleCount {
            let mut buf = self.read_source(block, 0, split)?;
            buf.extend_from(&src.gather(0, added, true)?);
            buf.extend_from(&self.read_source(block, split, block_len - split)?);
            let piece = self.write_block(block.start, &buf)?;
            self.splice(b..b + 1, vec![piece], added, 0);
            return self.check_after("paste");
        }

        let src_count = src.blocks.len();
        let mut pieces = Vec::new();

        if src_count <= 4 {
            let mut buf = self.read_source(block, 0, split)?;
            buf.extend_from(&src.gather(0, added, true)?);
            buf.extend_from(&self.read_source(block, split, block_len - split)?);
            pieces.extend(self.blockify(block.start, &buf)?);
        } else {
            // Left edge: head of the split block plus the first two source blocks
            let mut left = self.read_source(block, 0, split)?;
            left.extend_from(&src.read_whole(&src.blocks[0])?);
            left.extend_from(&src.read_whole(&src.blocks[1])?);
            pieces.extend(self.blockify(block.start, &left)?);

            for inner in &src.blocks[2..src_count - 2] {
                pieces.push(SeqBlock {
                    start: inner.start + at,
                    file: self.dir.copy_block_file(&inner.file)?,
                });
            }

            // Right edge: last two source blocks plus the tail of the split block
            let right_start = at + src.blocks[src_count - 2].start;
            let mut right = src.read_whole(&src.blocks[src_count - 2])?;
            right.extend_from(&src.read_whole(&src.blocks[src_count - 1])?);
            right.extend_from(&self.read_source(block, split, block_len - split)?);
            pieces.extend(self.blockify(right_start, &right)?);
        }

        self.splice(b..b + 1, pieces, added, 0);
        self.check_after("paste")
    }

    /// Re-block `src` into a sequence in our directory, format and block size
    fn import(&self, src: &Sequence) -> SequenceResult<Sequence> {
        log::debug!(
            "[Sequence] Importing {} samples ({}, max {}) as {}, max {}",
            src.num_samples,
            src.format,
            src.max_samples,
            self.format,
            self.max_samples
        );
        let mut imported = self.empty_like();
        for block in &src.blocks {
            imported.append(&src.read_whole(block)?)?;
        }
        Ok(imported)
    }

    /// Remove `[start, start + len)`.
    ///
    /// Remainders shorter than `min_samples` are merged with their neighbor
    /// so short blocks do not pile up at edit points.
    pub fn delete(&mut self, start: SampleCount, len: SampleCount) -> SequenceResult<()> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(());
        }

        let end = start + len;
        let min = self.min_samples as SampleCount;
        let b0 = self.find_block(start);
        let b1 = self.find_block(end - 1);
        let block0 = &self.blocks[b0];

        // Deletion within one block that stays large enough
        if b0 == b1 && block0.len() - len >= min {
            let mut buf = self.read_whole(block0)?;
            buf.remove_range((start - block0.start) as usize, len as usize);
            let piece = self.write_block(block0.start, &buf)?;
            self.splice(b0..b0 + 1, vec![piece], 0, len);
            return self.check_after("delete");
        }

        let mut pieces = Vec::new();
        let mut first = b0;
        let mut last = b1;

        let pre_len = (start - block0.start) as usize;
        if pre_len > 0 {
            if pre_len as SampleCount >= min || b0 == 0 {
                let buf = self.read_source(block0, 0, pre_len)?;
                pieces.push(self.write_block(block0.start, &buf)?);
            } else {
                let prev = &self.blocks[b0 - 1];
                let mut buf = self.read_whole(prev)?;
                buf.extend_from(&self.read_source(block0, 0, pre_len)?);
                pieces.extend(self.blockify(prev.start, &buf)?);
                first = b0 - 1;
            }
        }

        let block1 = &self.blocks[b1];
        let post_len = (block1.end() - end) as usize;
        if post_len > 0 {
            let offset = block1.file.len() - post_len;
            if post_len as SampleCount >= min || b1 + 1 == self.blocks.len() {
                let buf = self.read_source(block1, offset, post_len)?;
                pieces.push(self.write_block(start, &buf)?);
            } else {
                let next = &self.blocks[b1 + 1];
                let mut buf = self.read_source(block1, offset, post_len)?;
                buf.extend_from(&self.read_whole(next)?);
                pieces.extend(self.blockify(start, &buf)?);
                last = b1 + 1;
            }
        }

        self.splice(first..last + 1, pieces, 0, len);
        self.check_after("delete")
    }

    /// New sequence holding `[start, end)`.
    ///
    /// Fully covered blocks are shared with this sequence; partial blocks at
    /// either edge are written fresh.
    pub fn copy(&self, start: SampleCount, end: SampleCount) -> SequenceResult<Sequence> {
        let mut dest = self.empty_like();
        if end > self.num_samples {
            return Err(SequenceError::OutOfRange {
                start,
                len: end.saturating_sub(start),
                num_samples: self.num_samples,
            });
        }
        if start >= end {
            return Ok(dest);
        }

        let b0 = self.find_block(start);
        let b1 = self.find_block(end - 1);
        let mut pieces = Vec::with_capacity(b1 - b0 + 1);
        let mut pos: SampleCount = 0;

        for block in &self.blocks[b0..=b1] {
            let s = start.max(block.start);
            let e = end.min(block.end());
            let piece = if s == block.start && e == block.end() {
                SeqBlock {
                    start: pos,
                    file: self.dir.copy_block_file(&block.file)?,
                }
            } else {
                let buf = self.read_source(block, (s - block.start) as usize, (e - s) as usize)?;
                dest.write_block(pos, &buf)?
            };
            pieces.push(piece);
            pos += e - s;
        }

        dest.splice(0..0, pieces, end - start, 0);
        dest.check_after("copy")?;
        Ok(dest)
    }

    /// Insert `len` samples of silence before `at`.
    ///
    /// Full-size silent blocks share one block file.
    pub fn insert_silence(&mut self, at: SampleCount, len: SampleCount) -> SequenceResult<()> {
        if at > self.num_samples {
            return Err(SequenceError::OutOfRange {
                start: at,
                len,
                num_samples: self.num_samples,
            });
        }
        if len == 0 {
            return Ok(());
        }

        let max = self.max_samples as SampleCount;
        let mut silence = self.empty_like();
        let shared = self
            .dir
            .new_silent_block_file(max.min(len) as usize, self.format, self.layout);

        let mut pieces = Vec::new();
        let mut pos: SampleCount = 0;
        while pos < len {
            let count = max.min(len - pos) as usize;
            let file = if count == shared.len() {
                self.dir.copy_block_file(&shared)?
            } else {
                self.dir
                    .new_silent_block_file(count, self.format, self.layout)
            };
            pieces.push(SeqBlock { start: pos, file });
            pos += count as SampleCount;
        }
        drop(shared);

        silence.splice(0..0, pieces, len, 0);
        self.paste(at, &silence)
    }

    /// Append `len` samples of silence
    pub fn append_silence(&mut self, len: SampleCount) -> SequenceResult<()> {
        self.insert_silence(self.num_samples, len)
    }

    /// Replace `[start, start + len)` with the contents of `data`
    pub fn replace(
        &mut self,
        start: SampleCount,
        len: SampleCount,
        data: &SampleBuffer,
    ) -> SequenceResult<()> {
        self.check_range(start, len)?;
        let mut incoming = self.empty_like();
        incoming.append(data)?;

        let mut staged = self.clone();
        staged.delete(start, len)?;
        staged.paste(start, &incoming)?;
        *self = staged;
        Ok(())
    }
}
