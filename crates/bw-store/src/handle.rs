//! Counted references to block files

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::blockfile::BlockFile;
use crate::dir::DirManager;

/// One counted reference to a registered [`BlockFile`].
///
/// Cloning is `Ref`, dropping is `Deref`: the block's count always equals
/// the number of live handles, and the last drop removes the block from its
/// directory.
pub struct BlockHandle {
    file: Arc<BlockFile>,
    dir: Arc<DirManager>,
    released: bool,
}

impl BlockHandle {
    /// Wrap a reference the caller has already counted
    pub(crate) fn new(file: Arc<BlockFile>, dir: Arc<DirManager>) -> Self {
        Self {
            file,
            dir,
            released: false,
        }
    }

    pub fn file(&self) -> &Arc<BlockFile> {
        &self.file
    }

    pub fn dir(&self) -> &Arc<DirManager> {
        &self.dir
    }

    /// Same underlying block file (identity, not content)
    pub fn same_file(&self, other: &BlockHandle) -> bool {
        Arc::ptr_eq(&self.file, &other.file)
    }

    /// Drop this reference now; true if it was the last one
    pub fn release(mut self) -> bool {
        self.released = true;
        self.dir.release(&self.file)
    }
}

impl Deref for BlockHandle {
    type Target = BlockFile;

    fn deref(&self) -> &BlockFile {
        &self.file
    }
}

impl Clone for BlockHandle {
    fn clone(&self) -> Self {
        self.file.add_ref();
        Self::new(Arc::clone(&self.file), Arc::clone(&self.dir))
    }
}

impl Drop for BlockHandle {
    fn drop(&mut self) {
        if !self.released {
            self.dir.release(&self.file);
        }
    }
}

impl fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHandle")
            .field("name", &self.file.name())
            .field("len", &self.file.len())
            .field("refs", &self.file.ref_count())
            .finish()
    }
}
