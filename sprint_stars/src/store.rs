//! Durable storage of the [`Snapshot`].
//!
//! The snapshot is a single JSON document, read whole and rewritten whole. The file store
//! writes to a `.tmp` file first and renames it over the snapshot once it is synced, so a
//! reader never observes a half-written document. An advisory lock on a `.lock` file next to
//! the snapshot serializes the read-modify-write cycles of concurrent processes. The operating
//! system releases it when the process holding it dies.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::{debug, error, info, warn};
use snafu::prelude::*;

use crate::config::*;

/// Where the snapshot lives.
pub trait SnapshotStore: Send + Sync {
    /// The last stored snapshot, or `None` if nothing was ever stored.
    fn load(&self) -> PollResult<Option<Snapshot>>;

    /// Durably replaces the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> PollResult<()>;

    /// Exclusive access to the store for one read-modify-write cycle, held until the guard
    /// is dropped. Stores only used by one process do not need it.
    fn lock(&self) -> PollResult<StoreLock> {
        Ok(StoreLock { file: None })
    }
}

/// Guard returned by [`SnapshotStore::lock`].
///
/// The lock file itself stays in place: only the lock held on it is released.
#[derive(Debug)]
pub struct StoreLock {
    file: Option<File>,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Could not release the store lock: {}", e);
            }
        }
    }
}

pub fn encode(snapshot: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshot)
}

/// Parses a snapshot document and checks the invariants that the types alone do not carry.
pub fn decode(text: &str) -> serde_json::Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(text)?;
    check_schema(&snapshot).map_err(<serde_json::Error as serde::de::Error>::custom)?;
    Ok(snapshot)
}

fn check_schema(snapshot: &Snapshot) -> Result<(), String> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(format!(
            "unsupported snapshot version {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        ));
    }
    for (day, poll) in snapshot.polls_by_day.iter() {
        if poll.is_closed && !poll.is_open {
            return Err(format!("poll {} is closed but was never opened", day));
        }
        if !poll.is_open && !(poll.ledger.is_empty() && poll.declined.is_empty()) {
            return Err(format!("poll {} has nominations but is not open", day));
        }
        if poll.is_open && poll.ledger.is_empty() {
            return Err(format!("poll {} is open without members", day));
        }
        if let Some(name) = poll.declined.iter().find(|n| !poll.ledger.contains_key(*n)) {
            return Err(format!("poll {}: {} declined but is not a member", day, name));
        }
        if let Some(record) = poll
            .ledger
            .values()
            .flatten()
            .find(|r| poll.declined.contains(&r.nominator))
        {
            return Err(format!(
                "poll {}: {} both declined and nominated",
                day, record.nominator
            ));
        }
        for (nominee, records) in poll.ledger.iter() {
            if let Some(record) = records.iter().find(|r| r.nominator == *nominee) {
                return Err(format!(
                    "poll {}: {} nominated themselves",
                    day, record.nominator
                ));
            }
        }
    }
    Ok(())
}

/// Keeps the snapshot document in memory.
///
/// The document still goes through the JSON encoding, so that it behaves like the file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_snapshot(snapshot: &Snapshot) -> PollResult<MemoryStore> {
        let store = MemoryStore::new();
        store.save(snapshot)?;
        Ok(store)
    }

    fn document(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> PollResult<Option<Snapshot>> {
        match self.document().as_deref() {
            None => Ok(None),
            Some(text) => decode(text)
                .map(Some)
                .context(PersistenceCorruptSnafu { path: "memory" }),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> PollResult<()> {
        let text = encode(snapshot)
            .map_err(io::Error::from)
            .context(PersistenceWriteFailureSnafu { path: "memory" })?;
        *self.document() = Some(text);
        Ok(())
    }
}

/// Stores the snapshot in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileStore {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(path: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore {
            path: path.into(),
            lock_timeout: JsonFileStore::DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(self, lock_timeout: Duration) -> JsonFileStore {
        JsonFileStore {
            lock_timeout,
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn create_parent_dir(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    // Keeps a copy of a document that could not be parsed before it gets overwritten.
    // Earlier copies are never replaced: `.corrupt`, then `.corrupt.1`, `.corrupt.2`, ...
    fn quarantine(&self, text: &str) {
        for idx in 0usize.. {
            let target = if idx == 0 {
                self.sibling(".corrupt")
            } else {
                self.sibling(&format!(".corrupt.{}", idx))
            };
            match fs::read_to_string(&target) {
                Ok(previous) if previous == text => {
                    debug!("The unreadable snapshot is already kept in {:?}", target);
                    return;
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!("Could not check the copy {:?}: {}", target, e);
                    continue;
                }
            }
            match fs::write(&target, text) {
                Ok(()) => error!("A copy of the unreadable snapshot was saved to {:?}", target),
                Err(e) => error!("Could not save a copy of the unreadable snapshot: {}", e),
            }
            return;
        }
    }

    fn write_document(&self, tmp: &Path, snapshot: &Snapshot) -> io::Result<()> {
        self.create_parent_dir()?;
        let mut writer = BufWriter::new(File::create(tmp)?);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(tmp, &self.path)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> PollResult<Option<Snapshot>> {
        let text = match fs::read_to_string(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No snapshot found at {:?}", self.path);
                return Ok(None);
            }
            x => x.context(PersistenceReadSnafu {
                path: self.display(),
            })?,
        };
        match decode(&text) {
            Ok(snapshot) => {
                debug!(
                    "Loaded snapshot from {:?}: {} members, {} polls",
                    self.path,
                    snapshot.roster.len(),
                    snapshot.polls_by_day.len()
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                self.quarantine(&text);
                Err(e).context(PersistenceCorruptSnafu {
                    path: self.display(),
                })
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> PollResult<()> {
        let tmp = self.sibling(".tmp");
        let res = self.write_document(&tmp, snapshot);
        if res.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        res.context(PersistenceWriteFailureSnafu {
            path: self.display(),
        })?;
        debug!("Saved snapshot to {:?}", self.path);
        Ok(())
    }

    fn lock(&self) -> PollResult<StoreLock> {
        let lock_path = self.sibling(".lock");
        let start = Instant::now();
        self.create_parent_dir()
            .context(PersistenceWriteFailureSnafu {
                path: self.display(),
            })?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .context(PersistenceWriteFailureSnafu {
                path: lock_path.display().to_string(),
            })?;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Locked {:?}", lock_path);
                    return Ok(StoreLock { file: Some(file) });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    ensure!(
                        start.elapsed() < self.lock_timeout,
                        StoreLockedSnafu {
                            path: lock_path.display().to_string()
                        }
                    );
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    return Err(e).context(PersistenceWriteFailureSnafu {
                        path: lock_path.display().to_string(),
                    })
                }
            }
        }
    }
}
