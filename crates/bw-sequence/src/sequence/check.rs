//! Structural checks and diagnostics

use std::fmt::Write;

use bw_core::SampleCount;

use super::{SeqBlock, Sequence};
use crate::{SequenceError, SequenceResult};

fn find_problem(blocks: &[SeqBlock], num_samples: SampleCount) -> Option<String> {
    let mut pos: SampleCount = 0;
    for (i, block) in blocks.iter().enumerate() {
        if block.start != pos {
            return Some(format!("block {} starts at {} but should start at {}", i, block.start, pos));
        }
        if block.is_empty() {
            return Some(format!("block {} is empty", i));
        }
        pos = block.end();
    }
    if pos != num_samples {
        return Some(format!("blocks cover {} samples but the length is {}", pos, num_samples));
    }
    None
}

impl Sequence {
    /// Verify that blocks are contiguous, non-empty and cover `num_samples`.
    ///
    /// Failures are logged together with a dump of the block array.
    pub fn consistency_check(&self, label: &str) -> SequenceResult<()> {
        let Some(detail) = find_problem(&self.blocks, self.num_samples) else {
            return Ok(());
        };
        log::error!(
            "[Sequence] Consistency check failed in {}: {}\n{}",
            label,
            detail,
            self.debug_dump()
        );
        Err(SequenceError::Inconsistent {
            operation: label.to_string(),
            detail,
        })
    }

    /// Check run after every structural edit
    pub(super) fn check_after(&self, label: &str) -> SequenceResult<()> {
        let result = self.consistency_check(label);
        debug_assert!(result.is_ok(), "block array inconsistent after {}", label);
        result
    }

    /// Block array listing, one line per block
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Sequence: {} samples in {} blocks ({}, max {} per block)",
            self.num_samples,
            self.blocks.len(),
            self.format,
            self.max_samples
        );

        let mut pos: SampleCount = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            let flag = if block.start != pos { "  ERROR" } else { "" };
            let _ = writeln!(
                out,
                "  block {:4}: start {:10} len {:8} refs {:2} {}{}",
                i,
                block.start,
                block.len(),
                block.file.ref_count(),
                block.file.name(),
                flag
            );
            pos = block.end();
        }
        out
    }
}
