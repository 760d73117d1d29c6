//! Durable, thread-safe message log.
//!
//! The whole log is rewritten on every append: the snapshot goes to
//! `messages.json.tmp` first and is then renamed over `messages.json`, so the
//! canonical file always holds a complete snapshot.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::record::MessageRecord;

/// File name of the persisted log inside the data directory.
pub const LOG_FILE_NAME: &str = "messages.json";

/// Suffix of the transient file used during the atomic rewrite.
pub const TMP_SUFFIX: &str = ".tmp";

/// Ordered log of message records mirrored to disk.
///
/// Share it between threads with `Arc<MessageStore>`. Appends serialize on a
/// single lock; readers never wait on file I/O.
#[derive(Debug)]
pub struct MessageStore {
    path: PathBuf,
    tmp_path: PathBuf,
    log: Mutex<LogState>,
    /// Generation of the newest snapshot on disk.
    persisted: Mutex<u64>,
}

#[derive(Debug)]
struct LogState {
    records: Vec<MessageRecord>,
    generation: u64,
}

impl MessageStore {
    /// Open the log inside `data_dir`, creating the directory if needed.
    ///
    /// Failing to create the directory is the only error; a missing or
    /// malformed log file yields an empty log.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|source| StoreError::DataDir {
            path: data_dir.to_path_buf(),
            source,
        })?;
        Ok(Self::load(data_dir.join(LOG_FILE_NAME)))
    }

    /// Load the log from an explicit file path.
    ///
    /// A leftover temp file from an interrupted rewrite is removed; the
    /// canonical file is never touched by loading.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tmp_path = tmp_path_for(&path);

        match fs::remove_file(&tmp_path) {
            Ok(()) => debug!(path = ?tmp_path, "removed stale snapshot temp file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = ?tmp_path, error = %err, "failed to remove stale temp file"),
        }

        let records = read_snapshot(&path);
        debug!(?path, records = records.len(), "message log loaded");

        Self {
            path,
            tmp_path,
            log: Mutex::new(LogState {
                records,
                generation: 0,
            }),
            persisted: Mutex::new(0),
        }
    }

    /// Append a record and write the full snapshot to disk.
    ///
    /// The record's timestamp is raised to the previous record's timestamp if
    /// it is earlier. On `Err(StoreError::Persist)` the record is still in the
    /// in-memory log; only the disk copy is behind.
    pub fn append(&self, mut record: MessageRecord) -> Result<(), StoreError> {
        let (generation, snapshot) = {
            let mut log = self.lock_log();
            if let Some(last) = log.records.last() {
                record.clamp_timestamp(last.timestamp());
            }
            log.records.push(record);
            log.generation += 1;
            (log.generation, serde_json::to_vec_pretty(&log.records))
        };

        self.persist(generation, &snapshot?)
    }

    /// Copy of the current log, in append order.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.lock_log().records.clone()
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<MessageRecord> {
        let log = self.lock_log();
        let start = log.records.len().saturating_sub(n);
        log.records[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock_log().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the canonical log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, generation: u64, snapshot: &[u8]) -> Result<(), StoreError> {
        let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
        if *persisted >= generation {
            // A later append already wrote a snapshot containing this record.
            return Ok(());
        }

        write_atomic(&self.path, &self.tmp_path, snapshot).map_err(|source| {
            StoreError::Persist {
                path: self.path.clone(),
                source,
            }
        })?;
        *persisted = generation;
        Ok(())
    }

    fn lock_log(&self) -> MutexGuard<'_, LogState> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

fn read_snapshot(path: &Path) -> Vec<MessageRecord> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(?path, error = %err, "failed to read message log, starting empty");
            return Vec::new();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    match serde_json::from_slice(&bytes) {
        Ok(records) => records,
        Err(err) => {
            warn!(?path, error = %err, "message log is malformed, starting empty");
            Vec::new()
        }
    }
}

fn write_atomic(path: &Path, tmp_path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let result = (|| {
        let mut file = File::create(tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(tmp_path, path)
    })();

    if result.is_err() {
        if let Ok(metadata) = fs::symlink_metadata(tmp_path) {
            if metadata.is_file() {
                let _ = fs::remove_file(tmp_path);
            }
        }
    }
    result
}
