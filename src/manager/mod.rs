// SPDX-License-Identifier: Apache-2.0

//! The poll loop that ties discovery, identity tracking and reading together.
//!
//! Every poll:
//! - matched paths are fingerprinted and resolved to readers, resuming known
//!   files and creating readers for new ones
//! - readers of the previous poll that nothing accounts for anymore are
//!   drained, so a rotated file's tail is emitted before its successor
//! - all current readers are read to EOF concurrently
//! - metadata is checkpointed and the known-file generations age
//!
//! Matched paths are processed in batches of half the concurrent file limit,
//! since a reader from the previous batch may still be open while the next
//! batch is read.

mod lost;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::attrs::AttributeResolver;
use crate::bufpool::BufferPool;
use crate::config::FileConsumerConfig;
use crate::emit::Emitter;
use crate::error::{Error, Result};
use crate::input::{FileFinder, Fingerprint, Reader, ReaderFactory};
use crate::persistence::{JsonFileDatabase, Persister, checkpoint};
use crate::split::SplitFuncFactory;
use crate::telemetry::Telemetry;
use crate::tracker::Tracker;

/// Scope under which the consumer stores its state in the offsets database
const PERSISTER_SCOPE: &str = "fileconsumer";

/// Upper bound on how long a sleeping poll loop takes to notice cancellation
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

pub struct Manager {
    finder: FileFinder,
    reader_factory: ReaderFactory,
    tracker: Tracker,
    persister: Option<Box<dyn Persister>>,
    telemetry: Telemetry,
    poll_interval: Duration,
    max_batch_files: usize,
    max_batches: usize,
    include: Vec<String>,
    first_check: bool,
}

impl Manager {
    /// Build a manager from a validated configuration. When `offsets_path` is
    /// set, known files are checkpointed to a JSON database at that path.
    pub fn new(config: &FileConsumerConfig, emitter: Arc<dyn Emitter>) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let finder = FileFinder::new(config.include.clone(), config.exclude.clone())?;
        let reader_factory = ReaderFactory::new(config, emitter, BufferPool::new());

        let persister = match &config.offsets_path {
            Some(path) => {
                let db = JsonFileDatabase::open(path)?;
                Some(Box::new(db.persister(PERSISTER_SCOPE)) as Box<dyn Persister>)
            }
            None => None,
        };

        Ok(Self {
            finder,
            reader_factory,
            tracker: Tracker::new(),
            persister,
            telemetry: Telemetry::new(),
            poll_interval: config.poll_interval(),
            max_batch_files: config.max_batch_files(),
            max_batches: config.max_batches,
            include: config.include.clone(),
            first_check: true,
        })
    }

    pub fn with_persister(mut self, persister: Box<dyn Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn with_split_func(mut self, split_func: SplitFuncFactory) -> Self {
        self.reader_factory = self.reader_factory.with_split_func(split_func);
        self
    }

    pub fn with_attribute_resolver(mut self, resolver: Arc<dyn AttributeResolver>) -> Self {
        self.reader_factory = self.reader_factory.with_attribute_resolver(resolver);
        self
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Restore known files from the checkpoint. Restored files are resumed
    /// from their stored offsets, and files never seen before are read from
    /// the beginning regardless of `start_at`.
    pub fn start(&mut self) -> Result<()> {
        let Some(persister) = self.persister.as_mut() else {
            return Ok(());
        };

        let metadata = checkpoint::load(persister.as_mut())?;
        if !metadata.is_empty() {
            info!(
                files = metadata.len(),
                "Resuming from previously known offsets, start_at does not apply"
            );
            self.reader_factory.set_from_beginning(true);
            self.tracker.load_metadata(metadata);
        }

        Ok(())
    }

    /// Close all readers and write a final checkpoint.
    pub fn stop(&mut self) {
        let closed = self.tracker.close_previous_files();
        self.telemetry.add_open_files(-(closed as i64));
        self.save_checkpoint();
    }

    /// Run one poll cycle.
    pub fn poll(&mut self, cancel: &CancellationToken) {
        let mut paths = match self.finder.find_files() {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "Failed to find files");
                return;
            }
        };

        if self.first_check && paths.is_empty() {
            warn!(
                include = ?self.include,
                "No files match the configured include patterns"
            );
        }
        self.first_check = false;

        let mut batches = 0;
        while paths.len() > self.max_batch_files {
            let rest = paths.split_off(self.max_batch_files);
            self.consume(&paths, cancel);
            paths = rest;

            if self.max_batches != 0 {
                batches += 1;
                if batches >= self.max_batches {
                    debug!(batches, "Reached the batch limit for this poll");
                    return;
                }
            }
        }
        self.consume(&paths, cancel);

        // Files appearing from now on are new and read completely
        self.reader_factory.set_from_beginning(true);

        self.save_checkpoint();
        self.tracker.end_poll();
    }

    /// Poll until cancelled, then stop. Blocks the calling thread.
    pub fn run(mut self, cancel: CancellationToken) {
        if let Err(e) = self.start() {
            error!(error = %e, "Failed to load persisted offsets");
            return;
        }

        info!(include = ?self.include, "File consumer started");

        loop {
            self.poll(&cancel);
            if !self.wait(&cancel) {
                debug!("Cancellation received, stopping");
                break;
            }
        }

        self.stop();
        info!("File consumer stopped");
    }

    /// Run the poll loop on a dedicated OS thread.
    pub fn spawn(self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("fileconsumer".to_string())
            .spawn(move || self.run(cancel))?;
        Ok(handle)
    }

    /// Sleep until the next poll. False if cancelled meanwhile.
    fn wait(&self, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.poll_interval;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
        }
    }

    fn consume(&mut self, paths: &[PathBuf], cancel: &CancellationToken) {
        debug!(files = paths.len(), "Consuming files");

        self.make_readers(paths);

        // Files deleted at EOF can't be found again, so none can be lost
        if !self.reader_factory.delete_at_eof() {
            self.read_lost_files(cancel);
        }

        read_all(
            self.tracker.current_poll_files_mut().iter_mut(),
            &self.telemetry,
            cancel,
        );


        let closed = self.tracker.close_previous_files();
        self.telemetry.add_open_files(-(closed as i64));
        self.tracker.end_consume();
    }

    fn read_lost_files(&mut self, cancel: &CancellationToken) {
        let (previous, current) = self.tracker.poll_files_mut();
        let lost = lost::find_lost_readers(previous, current);
        if lost.is_empty() {
            return;
        }

        debug!(files = lost.len(), "Reading lost files");
        lost::drain_lost_readers(previous, &lost, &self.telemetry, cancel);
    }

    fn make_readers(&mut self, paths: &[PathBuf]) {
        for path in paths {
            let Some((file, fp)) = self.make_fingerprint(path) else {
                continue;
            };

            // Two paths with the same content, as between the copy and the
            // truncate of a copytruncate rotation
            if let Some(reader) = self.tracker.get_current_file(&fp) {
                debug!(path = ?path, duplicate = ?reader.file_name(), "Skipping duplicate file");
                self.tracker.add(reader);
                continue;
            }

            match self.new_reader(file, path.clone(), fp) {
                Ok(reader) => self.tracker.add(reader),
                Err(e) => error!(path = ?path, error = %e, "Failed to create reader"),
            }
        }
    }

    fn make_fingerprint(&self, path: &Path) -> Option<(File, Fingerprint)> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!(path = ?path, error = %e, "Failed to open file");
                return None;
            }
        };

        let fp = match self.reader_factory.new_fingerprint(&file) {
            Ok(fp) => fp,
            Err(e) => {
                error!(path = ?path, error = %e, "Failed to create fingerprint");
                return None;
            }
        };

        // Empty files are left alone until there is content to identify them by
        if fp.is_empty() {
            return None;
        }

        Some((file, fp))
    }

    fn new_reader(&mut self, file: File, path: PathBuf, fp: Fingerprint) -> Result<Reader> {
        if let Some(old) = self.tracker.get_open_file(&fp) {
            if old.file_name() != path {
                if old.validate() {
                    debug!(from = ?old.file_name(), to = ?path, "File has been rotated (moved)");
                } else {
                    debug!(from = ?old.file_name(), to = ?path, "File has been rotated (truncated)");
                }
            }

            let reader = self
                .reader_factory
                .new_reader_from_metadata(file, path, old.close());
            if reader.is_err() {
                self.telemetry.add_open_files(-1);
            }
            return reader;
        }

        if let Some(metadata) = self.tracker.get_closed_file(&fp) {
            let reader = self
                .reader_factory
                .new_reader_from_metadata(file, path, metadata)?;
            self.telemetry.add_open_files(1);
            return Ok(reader);
        }

        info!(path = ?path, "Started watching file");
        let reader = self.reader_factory.new_reader(file, path, fp)?;
        self.telemetry.add_open_files(1);
        Ok(reader)
    }

    fn save_checkpoint(&mut self) {
        let Some(persister) = self.persister.as_mut() else {
            return;
        };

        if let Err(e) = checkpoint::save(persister.as_mut(), self.tracker.get_metadata()) {
            error!(error = %e, "Failed to save offsets");
        }
    }
}

/// Read each reader to EOF on its own worker and wait for all of them. A
/// failing reader is logged and the others are unaffected.
fn read_all<'a>(
    readers: impl IntoIterator<Item = &'a mut Reader>,
    telemetry: &Telemetry,
    cancel: &CancellationToken,
) {
    thread::scope(|s| {
        let workers: Vec<_> = readers
            .into_iter()
            .map(move |reader| {
                s.spawn(move || {
                    telemetry.add_reading_files(1);
                    if let Err(e) = reader.read_to_end(cancel) {
                        error!(path = ?reader.file_name(), error = %e, "Failed to read file");
                    }
                    telemetry.add_reading_files(-1);
                })
            })
            .collect();

        for worker in workers {
            if worker.join().is_err() {
                error!("File reader worker panicked");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartAt;
    use crate::emit::{self, Token};
    use crate::persistence::{KNOWN_FILES_KEY, MockPersister, PersisterExt, PersistedState};
    use std::fs;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type Records = Arc<Mutex<Vec<String>>>;

    fn config(dir: &TempDir, start_at: StartAt) -> FileConsumerConfig {
        FileConsumerConfig {
            include: vec![format!("{}/*.log", dir.path().display())],
            start_at,
            fingerprint_size: 16,
            ..Default::default()
        }
    }

    fn manager(config: &FileConsumerConfig) -> (Manager, Records) {
        let records: Records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let emitter = Arc::new(emit::from_fn(move |t: Token| {
            sink.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&t.body).into_owned());
            Ok(())
        }));
        (Manager::new(config, emitter).unwrap(), records)
    }

    fn take(records: &Records) -> Vec<String> {
        std::mem::take(&mut *records.lock().unwrap())
    }

    fn append(path: &Path, data: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, StartAt::End);
        cfg.include.clear();
        let emitter = Arc::new(emit::from_fn(|_| Ok(())));
        assert!(matches!(Manager::new(&cfg, emitter), Err(Error::Config(_))));
    }

    #[test]
    fn test_poll_reads_only_new_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "one\ntwo\n").unwrap();

        let (mut manager, records) = manager(&config(&dir, StartAt::Beginning));
        let cancel = CancellationToken::new();

        manager.poll(&cancel);
        assert_eq!(take(&records), vec!["one", "two"]);

        manager.poll(&cancel);
        assert!(take(&records).is_empty());

        append(&path, "three\n");
        manager.poll(&cancel);
        assert_eq!(take(&records), vec!["three"]);
        assert_eq!(manager.tracker().total_readers(), 1);
    }

    #[test]
    fn test_start_at_end_only_applies_to_first_poll() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("existing.log");
        fs::write(&existing, "old line\n").unwrap();

        let (mut manager, records) = manager(&config(&dir, StartAt::End));
        let cancel = CancellationToken::new();

        manager.poll(&cancel);
        assert!(take(&records).is_empty());

        append(&existing, "tailed\n");
        fs::write(dir.path().join("later.log"), "fresh file\n").unwrap();
        manager.poll(&cancel);

        let mut records = take(&records);
        records.sort();
        assert_eq!(records, vec!["fresh file", "tailed"]);
    }

    #[test]
    fn test_start_at_end_applies_to_every_batch_of_first_poll() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            fs::write(
                dir.path().join(format!("{}.log", i)),
                format!("preexisting {}\n", i),
            )
            .unwrap();
        }

        let mut cfg = config(&dir, StartAt::End);
        cfg.max_concurrent_files = 4;
        let (mut manager, records) = manager(&cfg);
        let cancel = CancellationToken::new();

        manager.poll(&cancel);
        assert!(take(&records).is_empty());

        append(&dir.path().join("5.log"), "tailed\n");
        manager.poll(&cancel);
        assert_eq!(take(&records), vec!["tailed"]);
    }

    #[test]
    fn test_empty_file_waits_for_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "").unwrap();

        let (mut manager, records) = manager(&config(&dir, StartAt::End));
        let cancel = CancellationToken::new();

        manager.poll(&cancel);
        assert_eq!(manager.tracker().total_readers(), 0);

        append(&path, "first\n");
        manager.poll(&cancel);
        assert_eq!(take(&records), vec!["first"]);
    }

    #[test]
    fn test_duplicate_content_is_read_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "same content\n").unwrap();
        fs::write(dir.path().join("b.log"), "same content\n").unwrap();

        let (mut manager, records) = manager(&config(&dir, StartAt::Beginning));
        manager.poll(&CancellationToken::new());

        assert_eq!(take(&records), vec!["same content"]);
        assert_eq!(manager.tracker().total_readers(), 1);
    }

    #[test]
    fn test_max_batches_limits_a_poll() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            fs::write(dir.path().join(format!("{}.log", i)), format!("file {}\n", i)).unwrap();
        }

        let mut cfg = config(&dir, StartAt::Beginning);
        cfg.max_concurrent_files = 4;
        cfg.max_batches = 1;
        let (mut manager, records) = manager(&cfg);

        manager.poll(&CancellationToken::new());
        let mut records = take(&records);
        records.sort();
        assert_eq!(records, vec!["file 0", "file 1"]);
    }

    #[test]
    fn test_checkpoint_saved_and_restored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "one\ntwo\n").unwrap();

        let db = JsonFileDatabase::open_memory();
        let cfg = config(&dir, StartAt::Beginning);
        let cancel = CancellationToken::new();

        {
            let (manager, records) = manager(&cfg);
            let mut manager = manager.with_persister(Box::new(db.persister(PERSISTER_SCOPE)));
            manager.start().unwrap();
            manager.poll(&cancel);
            manager.stop();
            assert_eq!(take(&records), vec!["one", "two"]);
        }

        append(&path, "three\n");

        let (manager, records) = manager(&cfg);
        let mut manager = manager.with_persister(Box::new(db.persister(PERSISTER_SCOPE)));
        manager.start().unwrap();
        manager.poll(&cancel);
        assert_eq!(take(&records), vec!["three"]);
    }

    #[test]
    fn test_restored_checkpoint_reads_new_files_from_beginning() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("new.log"), "unseen\n").unwrap();

        let mut persister = MockPersister::new();
        let known = crate::input::Metadata::new(Fingerprint::from_bytes(b"other file".to_vec()));
        persister
            .set_raw_json(KNOWN_FILES_KEY, &PersistedState::new(vec![known]))
            .unwrap();

        let (manager, records) = manager(&config(&dir, StartAt::End));
        let mut manager = manager.with_persister(Box::new(persister));
        manager.start().unwrap();
        manager.poll(&CancellationToken::new());

        assert_eq!(take(&records), vec!["unseen"]);
    }

    #[test]
    fn test_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "line\n").unwrap();

        let mut cfg = config(&dir, StartAt::Beginning);
        cfg.poll_interval_ms = 10;
        let (manager, records) = manager(&cfg);

        let cancel = CancellationToken::new();
        let handle = manager.spawn(cancel.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while records.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        cancel.cancel();
        handle.join().unwrap();

        assert_eq!(take(&records), vec!["line"]);
    }
}
