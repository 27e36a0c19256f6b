//! Block directory
//!
//! `DirManager` owns every live block file of one project:
//! - generates unique `bNNNNN.auf` names in the temp or project directory
//! - keeps the name → block hash used to dedup references on load
//! - counts references and deletes a block's file when the count reaches zero
//! - implements copy-on-reference (`copy_block_file`)
//! - moves temp blocks into the project directory when they are saved
//! - removes orphaned temp blocks left by unclean shutdowns

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use bw_core::{SampleBuffer, SampleCount, SampleFormat};
use parking_lot::{Mutex, RwLock};

use crate::blockfile::{AliasInfo, BlockFile, BlockKind, PendingInfo};
use crate::config::StorageConfig;
use crate::decode::DecodePool;
use crate::format::{BLOCK_EXTENSION, SummaryLayout};
use crate::handle::BlockHandle;
use crate::record::BlockRecord;
use crate::source::{DecodeSource, WavSource};
use crate::{StorageError, StorageResult};

// ═══════════════════════════════════════════════════════════════════════════
// TEMP DIRECTORY REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

/// Live managers per temp directory. Cleanup only runs when a directory
/// has no other manager using it.
fn temp_users() -> &'static Mutex<HashMap<PathBuf, usize>> {
    static USERS: OnceLock<Mutex<HashMap<PathBuf, usize>>> = OnceLock::new();
    USERS.get_or_init(|| Mutex::new(HashMap::new()))
}

// ═══════════════════════════════════════════════════════════════════════════
// DIR MANAGER
// ═══════════════════════════════════════════════════════════════════════════

pub struct DirManager {
    config: StorageConfig,
    temp_dir: PathBuf,
    project_dir: RwLock<Option<PathBuf>>,
    /// Every block with a nonzero count, by file name
    blocks: Mutex<HashMap<String, Arc<BlockFile>>>,
    name_counter: AtomicU64,
    decoder: DecodePool,
}

impl DirManager {
    /// Open a manager rooted at `config.temp_dir`
    pub fn new(config: StorageConfig) -> StorageResult<Arc<Self>> {
        fs::create_dir_all(&config.temp_dir)?;
        let temp_dir = fs::canonicalize(&config.temp_dir).unwrap_or_else(|_| config.temp_dir.clone());

        let first_user = {
            let mut users = temp_users().lock();
            let count = users.entry(temp_dir.clone()).or_insert(0);
            *count += 1;
            *count == 1
        };

        let dir = Self {
            decoder: DecodePool::new(config.decode_workers),
            config,
            temp_dir,
            project_dir: RwLock::new(None),
            blocks: Mutex::new(HashMap::new()),
            name_counter: AtomicU64::new(0),
        };

        if first_user && dir.config.clean_temp_on_open {
            dir.clean_temp_dir();
        }

        log::info!("[DirManager] Opened with temp dir {}", dir.temp_dir.display());
        Ok(Arc::new(dir))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Layout for sequences of `format` under the configured block size
    pub fn layout(&self, format: SampleFormat) -> SummaryLayout {
        self.config.layout(format)
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn project_dir(&self) -> Option<PathBuf> {
        self.project_dir.read().clone()
    }

    /// Set the storage root for new and saved blocks.
    ///
    /// Fails if the directory is missing and `create` is false.
    pub fn set_project_directory(&self, path: &Path, create: bool) -> StorageResult<()> {
        if !path.exists() {
            if !create {
                return Err(StorageError::ProjectDir(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(StorageError::ProjectDir(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        log::info!("[DirManager] Project directory set to {}", path.display());
        *self.project_dir.write() = Some(path);
        Ok(())
    }

    fn target_dir(&self) -> PathBuf {
        self.project_dir().unwrap_or_else(|| self.temp_dir.clone())
    }

    /// Unused name, checked against the hash and both directories
    fn next_name(&self) -> (String, PathBuf) {
        let dir = self.target_dir();
        let project = self.project_dir();
        let blocks = self.blocks.lock();

        loop {
            let n = self.name_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let name = format!("b{:05}.{}", n, BLOCK_EXTENSION);
            let taken = blocks.contains_key(&name)
                || dir.join(&name).exists()
                || self.temp_dir.join(&name).exists()
                || project.as_ref().is_some_and(|p| p.join(&name).exists());
            if !taken {
                let path = dir.join(&name);
                return (name, path);
            }
        }
    }

    fn register(self: &Arc<Self>, file: BlockFile) -> BlockHandle {
        let file = Arc::new(file);
        log::debug!("[DirManager] New block {} ({} samples)", file.name(), file.len());
        self.blocks
            .lock()
            .insert(file.name().to_string(), Arc::clone(&file));
        BlockHandle::new(file, Arc::clone(self))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Creation
    // ───────────────────────────────────────────────────────────────────────

    /// Write `data` to a new block file with refcount 1
    pub fn new_block_file(
        self: &Arc<Self>,
        data: &SampleBuffer,
        layout: SummaryLayout,
    ) -> StorageResult<BlockHandle> {
        let (name, path) = self.next_name();
        let file = BlockFile::create(name, path, data, layout)?;
        Ok(self.register(file))
    }

    /// Block referencing `len` frames of `channel` in an external WAV file
    pub fn new_alias_block_file(
        self: &Arc<Self>,
        alias_path: &Path,
        start: SampleCount,
        len: usize,
        channel: u16,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> StorageResult<BlockHandle> {
        let (name, path) = self.next_name();
        let alias = AliasInfo {
            path: alias_path.to_path_buf(),
            start,
            channel,
        };
        let file = BlockFile::create_alias(name, path, alias, len, format, layout)?;
        Ok(self.register(file))
    }

    /// Block filled in later by the decode pool
    pub fn new_pending_block_file(
        self: &Arc<Self>,
        source: Arc<dyn DecodeSource>,
        start: SampleCount,
        len: usize,
        channel: u16,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> BlockHandle {
        let (name, path) = self.next_name();
        let info = PendingInfo {
            source,
            start,
            channel,
        };
        let handle = self.register(BlockFile::pending(name, path, info, len, format, layout));
        self.decoder.submit(Arc::clone(handle.file()));
        handle
    }

    /// Block of silence with no backing file
    pub fn new_silent_block_file(
        self: &Arc<Self>,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> BlockHandle {
        let (name, path) = self.next_name();
        self.register(BlockFile::silent(name, path, len, format, layout))
    }

    /// Copy-on-reference: share an unlocked block, duplicate a locked one
    pub fn copy_block_file(self: &Arc<Self>, handle: &BlockHandle) -> StorageResult<BlockHandle> {
        if !handle.is_locked() {
            return Ok(handle.clone());
        }

        handle.ensure_decoded()?;
        let (name, path) = self.next_name();
        let copy = handle.duplicate(name, path)?;
        log::debug!("[DirManager] Duplicated locked block {} as {}", handle.name(), copy.name());
        Ok(self.register(copy))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Reference counting
    // ───────────────────────────────────────────────────────────────────────

    /// Add an owner to a block
    pub fn ref_block(&self, handle: &BlockHandle) -> BlockHandle {
        handle.clone()
    }

    /// Remove an owner; true if that was the last one
    pub fn deref_block(&self, handle: BlockHandle) -> bool {
        handle.release()
    }

    /// Called by handles; removes the block from the hash at zero
    pub(crate) fn release(&self, file: &Arc<BlockFile>) -> bool {
        let mut blocks = self.blocks.lock();
        if file.sub_ref() > 0 {
            return false;
        }

        let registered = blocks
            .get(file.name())
            .is_some_and(|r| Arc::ptr_eq(r, file));
        if registered {
            blocks.remove(file.name());
        }
        drop(blocks);

        if file.is_locked() {
            log::debug!("[DirManager] Released locked block {}; file kept", file.name());
        } else {
            log::debug!("[DirManager] Deleting block {}", file.name());
            file.remove_file();
        }
        true
    }

    /// Number of live blocks
    pub fn block_count(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.lock().contains_key(name)
    }

    /// Current count for a registered block, 0 if not registered
    pub fn ref_count(&self, name: &str) -> usize {
        self.blocks.lock().get(name).map_or(0, |f| f.ref_count())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Persistence
    // ───────────────────────────────────────────────────────────────────────

    /// Resolve a saved reference, sharing the live block if one is registered.
    ///
    /// Files opened from disk belong to the saved project, so they come back
    /// locked: edits copy them and releasing them keeps the file.
    pub fn load_block_file(
        self: &Arc<Self>,
        record: &BlockRecord,
        len: usize,
        format: SampleFormat,
        layout: SummaryLayout,
    ) -> StorageResult<BlockHandle> {
        let Some(name) = record.name().map(str::to_string) else {
            return Ok(self.new_silent_block_file(len, format, layout));
        };

        let mut blocks = self.blocks.lock();
        if let Some(existing) = blocks.get(&name) {
            existing.add_ref();
            return Ok(BlockHandle::new(Arc::clone(existing), Arc::clone(self)));
        }

        let path = self.target_dir().join(&name);
        let mut pending = false;
        let file = match record {
            BlockRecord::Alias {
                path: alias_path,
                start,
                len: alias_len,
                channel,
                ..
            } => {
                if *alias_len != len {
                    return Err(StorageError::InvalidBlockFile {
                        name,
                        reason: format!("alias length {} but block length {}", alias_len, len),
                    });
                }
                let alias = AliasInfo {
                    path: alias_path.clone(),
                    start: *start,
                    channel: *channel,
                };
                BlockFile::open_alias(name.clone(), path, alias, len, format, layout)?
            }
            BlockRecord::Decode {
                path: source_path,
                start,
                channel,
                ..
            } => {
                if path.exists() {
                    BlockFile::open(name.clone(), path, len, format, layout)?
                } else {
                    pending = true;
                    let info = PendingInfo {
                        source: Arc::new(WavSource::new(source_path)),
                        start: *start,
                        channel: *channel,
                    };
                    BlockFile::pending(name.clone(), path, info, len, format, layout)
                }
            }
            _ => BlockFile::open(name.clone(), path, len, format, layout)?,
        };

        if !pending {
            file.lock();
        }
        let file = Arc::new(file);
        blocks.insert(name, Arc::clone(&file));
        drop(blocks);

        if pending {
            self.decoder.submit(Arc::clone(&file));
        }
        Ok(BlockHandle::new(file, Arc::clone(self)))
    }

    /// Serialize a reference, moving the block into the project directory first
    pub fn save_block_file(&self, handle: &BlockHandle) -> StorageResult<BlockRecord> {
        match handle.kind() {
            BlockKind::Silent => Ok(BlockRecord::Silent { len: handle.len() }),
            BlockKind::Pending(info) if !handle.is_data_available() => Ok(BlockRecord::Decode {
                name: handle.name().to_string(),
                path: info.source.path().to_path_buf(),
                start: info.start,
                len: handle.len(),
                channel: info.channel,
            }),
            BlockKind::Alias(alias) => {
                self.make_part_of_project(handle)?;
                Ok(BlockRecord::Alias {
                    name: handle.name().to_string(),
                    path: alias.path.clone(),
                    start: alias.start,
                    len: handle.len(),
                    channel: alias.channel,
                })
            }
            BlockKind::Owned | BlockKind::Pending(_) => {
                self.make_part_of_project(handle)?;
                Ok(BlockRecord::Simple {
                    name: handle.name().to_string(),
                })
            }
        }
    }

    /// Move a block's file from the temp directory into the project directory
    pub fn make_part_of_project(&self, file: &BlockFile) -> StorageResult<()> {
        let Some(project) = self.project_dir() else {
            return Ok(());
        };
        let target = project.join(file.name());
        if file.path() == target {
            return Ok(());
        }
        if file.has_file() && target.exists() {
            return Err(StorageError::ProjectDir(format!(
                "{} already exists in {}",
                file.name(),
                project.display()
            )));
        }

        file.move_to(target)?;
        log::debug!("[DirManager] Moved {} into {}", file.name(), project.display());
        Ok(())
    }

    /// Block until all queued decodes have finished
    pub fn wait_for_decodes(&self) {
        self.decoder.wait_idle();
    }

    pub fn pending_decodes(&self) -> usize {
        self.decoder.outstanding()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Cleanup
    // ───────────────────────────────────────────────────────────────────────

    /// Remove block files in the temp directory that no live block owns.
    ///
    /// Returns the number of files removed.
    pub fn clean_temp_dir(&self) -> usize {
        let entries = match fs::read_dir(&self.temp_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "[DirManager] Cannot read temp dir {}: {}",
                    self.temp_dir.display(),
                    e
                );
                return 0;
            }
        };

        let blocks = self.blocks.lock();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_block = path.extension().is_some_and(|ext| ext == BLOCK_EXTENSION);
            let live = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| blocks.contains_key(n));
            if is_block && !live && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            log::info!(
                "[DirManager] Removed {} orphaned block files from {}",
                removed,
                self.temp_dir.display()
            );
        }
        removed
    }
}

impl Drop for DirManager {
    fn drop(&mut self) {
        let last_user = {
            let mut users = temp_users().lock();
            match users.get_mut(&self.temp_dir) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                _ => {
                    users.remove(&self.temp_dir);
                    true
                }
            }
        };
        if last_user {
            self.clean_temp_dir();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SummaryFrame;
    use crossbeam_channel::{Receiver, bounded};
    use tempfile::{TempDir, tempdir};

    const FORMAT: SampleFormat = SampleFormat::Float32;

    fn open(temp: &TempDir) -> Arc<DirManager> {
        DirManager::new(StorageConfig::with_temp_dir(temp.path().join("tmp"))).unwrap()
    }

    fn layout() -> SummaryLayout {
        SummaryLayout::for_max_samples(4096)
    }

    fn sine(len: usize) -> SampleBuffer {
        let samples: Vec<f32> = (0..len).map(|i| (i as f32 * 0.05).sin()).collect();
        SampleBuffer::from_f32(FORMAT, &samples)
    }

    #[test]
    fn test_names_increment() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let a = dir.new_block_file(&sine(100), layout()).unwrap();
        let b = dir.new_block_file(&sine(100), layout()).unwrap();
        assert_eq!(a.name(), "b00001.auf");
        assert_eq!(b.name(), "b00002.auf");
        assert!(a.path().starts_with(dir.temp_dir()));
        assert_eq!(dir.block_count(), 2);
    }

    #[test]
    fn test_name_collision_skipped() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);
        fs::write(dir.temp_dir().join("b00001.auf"), b"stale").unwrap();
        // A fresh manager on the same directory would clean it; this one is already open
        let block = dir.new_block_file(&sine(10), layout()).unwrap();
        assert_eq!(block.name(), "b00002.auf");
    }

    #[test]
    fn test_project_directory() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let missing = temp.path().join("proj");
        assert!(matches!(
            dir.set_project_directory(&missing, false),
            Err(StorageError::ProjectDir(_))
        ));

        dir.set_project_directory(&missing, true).unwrap();
        let block = dir.new_block_file(&sine(10), layout()).unwrap();
        assert!(block.path().starts_with(dir.project_dir().unwrap()));
    }

    #[test]
    fn test_release_deletes_at_zero() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let block = dir.new_block_file(&sine(100), layout()).unwrap();
        let path = block.path();
        let second = dir.ref_block(&block);
        assert_eq!(block.ref_count(), 2);

        assert!(!dir.deref_block(second));
        assert!(path.exists());
        assert!(dir.contains("b00001.auf"));

        assert!(dir.deref_block(block));
        assert!(!path.exists());
        assert!(!dir.contains("b00001.auf"));
    }

    #[test]
    fn test_copy_unlocked_shares() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let block = dir.new_block_file(&sine(100), layout()).unwrap();
        let copy = dir.copy_block_file(&block).unwrap();
        assert!(copy.same_file(&block));
        assert_eq!(block.ref_count(), 2);
        assert_eq!(dir.block_count(), 1);
    }

    #[test]
    fn test_copy_locked_duplicates() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let block = dir.new_block_file(&sine(1000), layout()).unwrap();
        let _owner2 = block.clone();
        let _owner3 = block.clone();
        block.lock();
        assert_eq!(block.ref_count(), 3);

        let copy = dir.copy_block_file(&block).unwrap();
        assert!(!copy.same_file(&block));
        assert_ne!(copy.name(), block.name());
        assert_eq!(copy.ref_count(), 1);
        assert_eq!(block.ref_count(), 3);
        assert!(!copy.is_locked());
        assert_eq!(
            copy.read_data(0, 1000).unwrap(),
            block.read_data(0, 1000).unwrap()
        );
        assert_eq!(copy.stats(), block.stats());
    }

    #[test]
    fn test_locked_file_survives_release() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let block = dir.new_block_file(&sine(100), layout()).unwrap();
        block.lock();
        let path = block.path();
        assert!(dir.deref_block(block));
        assert!(path.exists());
        assert_eq!(dir.block_count(), 0);
    }

    #[test]
    fn test_save_moves_into_project_and_load_dedups() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);

        let block = dir.new_block_file(&sine(500), layout()).unwrap();
        dir.set_project_directory(&temp.path().join("proj"), true).unwrap();

        let record = dir.save_block_file(&block).unwrap();
        assert_eq!(record, BlockRecord::Simple { name: "b00001.auf".into() });
        assert!(block.path().starts_with(dir.project_dir().unwrap()));

        let first = dir.load_block_file(&record, 500, FORMAT, layout()).unwrap();
        let second = dir.load_block_file(&record, 500, FORMAT, layout()).unwrap();
        assert!(first.same_file(&block));
        assert!(second.same_file(&block));
        assert_eq!(block.ref_count(), 3);
    }

    #[test]
    fn test_load_from_disk_then_share() {
        let temp = tempdir().unwrap();
        let project = temp.path().join("proj");
        let record;
        {
            let dir = open(&temp);
            dir.set_project_directory(&project, true).unwrap();
            let block = dir.new_block_file(&sine(500), layout()).unwrap();
            record = dir.save_block_file(&block).unwrap();
            // Saved state: keep the file when this session lets go of it
            block.lock();
        }

        let dir = open(&temp);
        dir.set_project_directory(&project, false).unwrap();
        let a = dir.load_block_file(&record, 500, FORMAT, layout()).unwrap();
        let b = dir.load_block_file(&record, 500, FORMAT, layout()).unwrap();
        assert!(a.same_file(&b));
        assert_eq!(a.ref_count(), 2);
        assert_eq!(a.read_data(0, 500).unwrap(), sine(500));
    }

    #[test]
    fn test_blocks_loaded_from_disk_are_locked() {
        let temp = tempdir().unwrap();
        let project = temp.path().join("proj");
        let (record, path) = {
            let dir = open(&temp);
            dir.set_project_directory(&project, true).unwrap();
            let block = dir.new_block_file(&sine(500), layout()).unwrap();
            let record = dir.save_block_file(&block).unwrap();
            block.lock();
            (record, block.path())
        };

        let dir = open(&temp);
        dir.set_project_directory(&project, false).unwrap();
        let loaded = dir.load_block_file(&record, 500, FORMAT, layout()).unwrap();
        assert!(loaded.is_locked());

        // Copy-on-reference duplicates instead of sharing the saved file
        let copy = dir.copy_block_file(&loaded).unwrap();
        assert!(!copy.same_file(&loaded));
        drop(copy);

        assert!(dir.deref_block(loaded));
        assert!(path.exists());
        assert_eq!(dir.block_count(), 0);
    }

    #[test]
    fn test_load_missing_block() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);
        let record = BlockRecord::Simple {
            name: "b00077.auf".into(),
        };
        let err = dir.load_block_file(&record, 10, FORMAT, layout()).unwrap_err();
        assert!(matches!(err, StorageError::MissingBlockFile(name) if name == "b00077.auf"));
        assert_eq!(dir.block_count(), 0);
    }

    #[test]
    fn test_clean_temp_dir_on_open() {
        let temp = tempdir().unwrap();
        let tmp = temp.path().join("tmp");
        fs::create_dir_all(&tmp).unwrap();
        fs::write(tmp.join("b00009.auf"), b"orphan").unwrap();
        fs::write(tmp.join("notes.txt"), b"keep").unwrap();

        let _dir = DirManager::new(StorageConfig::with_temp_dir(&tmp)).unwrap();
        assert!(!tmp.join("b00009.auf").exists());
        assert!(tmp.join("notes.txt").exists());
    }

    #[test]
    fn test_clean_temp_dir_keeps_live_blocks() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);
        let block = dir.new_block_file(&sine(10), layout()).unwrap();
        fs::write(dir.temp_dir().join("b09999.auf"), b"orphan").unwrap();

        assert_eq!(dir.clean_temp_dir(), 1);
        assert!(block.path().exists());
    }

    // ───────────────────────────────────────────────────────────────────────
    // Alias and pending blocks
    // ───────────────────────────────────────────────────────────────────────

    fn write_wav(path: &Path, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_alias_block() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);
        let wav = temp.path().join("take.wav");
        let samples: Vec<f32> = (0..2000).map(|i| (i as f32 / 2000.0) - 0.5).collect();
        write_wav(&wav, &samples);

        let block = dir
            .new_alias_block_file(&wav, 500, 1000, 0, FORMAT, layout())
            .unwrap();
        assert!(block.is_alias());
        assert_eq!(
            fs::metadata(block.path()).unwrap().len() as usize,
            layout().header_len()
        );
        assert_eq!(block.read_data(0, 1000).unwrap().to_f32(), samples[500..1500].to_vec());
        assert_eq!(block.stats().min, samples[500]);
        assert_eq!(block.stats().max, samples[1499]);

        fs::remove_file(&wav).unwrap();
        let err = block.read_data(0, 10).unwrap_err();
        assert!(matches!(err, StorageError::AliasSourceMissing(_)));
        assert!(block.is_source_missing());
        // Summary is still served from the block file
        assert_eq!(block.stats().min, samples[500]);
    }

    #[derive(Debug)]
    struct GatedSource {
        path: PathBuf,
        gate: Receiver<()>,
        value: f32,
    }

    impl DecodeSource for GatedSource {
        fn path(&self) -> &Path {
            &self.path
        }

        fn decode(&self, _start: SampleCount, len: usize, _channel: u16) -> StorageResult<Vec<f32>> {
            let _ = self.gate.recv();
            Ok(vec![self.value; len])
        }
    }

    #[test]
    fn test_pending_block_placeholder_until_decoded() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);
        let (release, gate) = bounded(1);
        let source = Arc::new(GatedSource {
            path: temp.path().join("compressed.ogg"),
            gate,
            value: 0.25,
        });

        let block = dir.new_pending_block_file(source, 0, 600, 0, FORMAT, layout());
        assert!(!block.is_data_available());
        assert_eq!(block.stats(), SummaryFrame::PLACEHOLDER);
        assert_eq!(block.min_max_range(10, 20).unwrap(), SummaryFrame::PLACEHOLDER);
        assert!(block.read_data(0, 600).unwrap().to_f32().iter().all(|&s| s == 0.0));
        assert!(matches!(
            dir.save_block_file(&block).unwrap(),
            BlockRecord::Decode { len: 600, .. }
        ));

        release.send(()).unwrap();
        dir.wait_for_decodes();

        assert!(block.is_data_available());
        assert_eq!(block.stats().max, 0.25);
        assert_eq!(block.read_data(599, 1).unwrap().to_f32(), vec![0.25]);
        assert_eq!(
            dir.save_block_file(&block).unwrap(),
            BlockRecord::Simple { name: block.name().to_string() }
        );
    }

    #[test]
    fn test_ensure_decoded_on_demand() {
        let temp = tempdir().unwrap();
        let dir = open(&temp);
        let (release, gate) = bounded(2);
        let source = Arc::new(GatedSource {
            path: temp.path().join("compressed.ogg"),
            gate,
            value: 0.75,
        });

        let block = dir.new_pending_block_file(source, 0, 300, 0, FORMAT, layout());
        assert!(!block.is_data_available());

        // One pass for this thread, one for the worker
        release.send(()).unwrap();
        release.send(()).unwrap();
        block.ensure_decoded().unwrap();
        assert!(block.is_data_available());
        assert_eq!(block.read_data(0, 300).unwrap().to_f32(), vec![0.75; 300]);

        dir.wait_for_decodes();
        assert!(block.is_data_available());
        assert_eq!(block.stats().max, 0.75);
    }

    #[test]
    fn test_ensure_decoded_after_failure() {
        let temp = tempdir().unwrap();
        let mut config = StorageConfig::with_temp_dir(temp.path().join("tmp"));
        config.decode_workers = 0;
        let dir = DirManager::new(config).unwrap();

        let source = Arc::new(WavSource::new(temp.path().join("missing.wav")));
        let block = dir.new_pending_block_file(source, 0, 100, 0, FORMAT, layout());
        assert_eq!(block.data_state(), crate::DataState::Failed);
        assert!(matches!(
            block.ensure_decoded(),
            Err(StorageError::DataNotAvailable(_))
        ));
    }

    #[test]
    fn test_pending_inline_without_workers() {
        let temp = tempdir().unwrap();
        let mut config = StorageConfig::with_temp_dir(temp.path().join("tmp"));
        config.decode_workers = 0;
        let dir = DirManager::new(config).unwrap();

        let (release, gate) = bounded(1);
        release.send(()).unwrap();
        let source = Arc::new(GatedSource {
            path: temp.path().join("x.ogg"),
            gate,
            value: -0.5,
        });

        let block = dir.new_pending_block_file(source, 0, 100, 0, FORMAT, layout());
        assert!(block.is_data_available());
        assert_eq!(block.stats().min, -0.5);
    }
}
