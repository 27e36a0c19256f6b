//! On-demand decode worker pool
//!
//! Pending blocks are queued here when they are created. Each task owns the
//! one write to its block's file; completion publishes the summary and then
//! flips the block's data state, so readers never block and never see a
//! half-written block.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};

use crate::blockfile::BlockFile;

struct DecodeTask {
    file: Arc<BlockFile>,
}

#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Fixed pool of decode threads fed through a channel
pub struct DecodePool {
    sender: Option<Sender<DecodeTask>>,
    workers: Vec<JoinHandle<()>>,
    outstanding: Arc<Outstanding>,
}

impl DecodePool {
    /// Create pool with N workers; with zero workers tasks run on the caller
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = unbounded::<DecodeTask>();
        let outstanding = Arc::new(Outstanding::default());
        let mut workers = Vec::with_capacity(num_workers);

        for i in 0..num_workers {
            let receiver = receiver.clone();
            let outstanding = Arc::clone(&outstanding);

            match thread::Builder::new()
                .name(format!("block-decode-{}", i))
                .spawn(move || Self::worker_loop(receiver, outstanding))
            {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    log::error!(
                        "[Decode] Failed to spawn decode thread {}: {}. Decoding falls back to the caller.",
                        i,
                        e
                    );
                }
            }
        }

        Self {
            sender: if workers.is_empty() { None } else { Some(sender) },
            workers,
            outstanding,
        }
    }

    fn worker_loop(receiver: Receiver<DecodeTask>, outstanding: Arc<Outstanding>) {
        for task in receiver.iter() {
            Self::run(&task.file);
            outstanding.done();
        }
    }

    fn run(file: &BlockFile) {
        let Some(info) = file.pending_info() else {
            return;
        };
        if file.ref_count() == 0 {
            log::debug!("[Decode] Skipping released block {}", file.name());
            return;
        }
        if file.is_data_available() {
            // Decoded on demand by an editor before this task ran
            return;
        }

        let result = info
            .source
            .decode(info.start, file.len(), info.channel)
            .and_then(|samples| file.complete_decode(&samples));

        match result {
            Ok(()) => {
                log::debug!("[Decode] {} ready ({} samples)", file.name(), file.len());
                // Released while decoding: the file written above has no owner
                if file.ref_count() == 0 {
                    file.remove_file();
                }
            }
            Err(e) => {
                log::error!(
                    "[Decode] Failed to decode {} from {}: {}",
                    file.name(),
                    info.source.path().display(),
                    e
                );
                file.fail_decode();
            }
        }
    }

    /// Queue a pending block
    pub(crate) fn submit(&self, file: Arc<BlockFile>) {
        self.outstanding.add();
        let task = DecodeTask { file };
        match &self.sender {
            Some(sender) => {
                if let Err(err) = sender.send(task) {
                    // Workers gone; decode on this thread instead
                    Self::run(&err.into_inner().file);
                    self.outstanding.done();
                }
            }
            None => {
                Self::run(&task.file);
                self.outstanding.done();
            }
        }
    }

    /// Tasks queued or running
    pub fn outstanding(&self) -> usize {
        *self.outstanding.count.lock()
    }

    /// Block until every queued task has finished
    pub fn wait_idle(&self) {
        let mut count = self.outstanding.count.lock();
        while *count > 0 {
            self.outstanding.idle.wait(&mut count);
        }
    }

    fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("[Decode] Decode thread panicked");
            }
        }
    }
}

impl Drop for DecodePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
