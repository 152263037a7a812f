//! Event store with full-snapshot JSON persistence.
//!
//! The in-memory list is the source of truth. Every mutation rewrites the
//! whole snapshot file (temp file + rename), so a failed write leaves the
//! previous snapshot in place and never touches the in-memory state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use eventbot_core::EventRecord;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while reading or writing the snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot could not be read or written.
    #[error("snapshot IO failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The snapshot exists but is not a valid event list.
    #[error("snapshot {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The events could not be serialized.
    #[error("failed to serialize events: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Every numeric id up to `u64::MAX` has been handed out.
    #[error("no event ids left")]
    IdsExhausted,
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Authoritative collection of events, keyed by id, in insertion order.
#[derive(Debug, Default)]
pub struct EventStore {
    /// Snapshot location; `None` keeps everything in memory.
    path: Option<PathBuf>,
    events: Vec<EventRecord>,
    /// Lowest numeric id that may be handed out next. Never decreases.
    next_id: u64,
    /// Set once `u64::MAX` has been seen; no numeric id is left after it.
    ids_exhausted: bool,
}

/// Store shared between the command handler and the scheduler.
pub type SharedStore = Arc<RwLock<EventStore>>;

/// Wraps a store for sharing.
pub fn new_shared_store(store: EventStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

impl EventStore {
    /// Creates an empty store persisted at `path`. Call [`load`](Self::load)
    /// to read existing events.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Creates a store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Returns the snapshot path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Reads the snapshot and inserts every record.
    ///
    /// A missing file is an empty store. Records sharing an id collapse to
    /// the last one. Returns the number of events held afterwards.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the file exists but cannot be read,
    /// [`StoreError::Corrupt`] if it does not parse. The store is left
    /// unchanged in both cases.
    pub fn load(&mut self) -> StoreResult<usize> {
        let Some(path) = self.path.clone() else {
            return Ok(self.events.len());
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No event snapshot yet, starting empty");
                return Ok(self.events.len());
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let records: Vec<EventRecord> =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let read = records.len();
        for record in records {
            self.put(record);
        }
        info!(
            path = %path.display(),
            read,
            events = self.events.len(),
            "Loaded event snapshot"
        );
        Ok(self.events.len())
    }

    /// Moves an unreadable snapshot aside to `<name>.corrupt` so the next
    /// save does not overwrite it. Returns the new location.
    pub fn quarantine(&self) -> StoreResult<Option<PathBuf>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let target = sibling(path, "corrupt");
        fs::rename(path, &target).map_err(|e| StoreError::io(path, e))?;
        warn!(
            from = %path.display(),
            to = %target.display(),
            "Moved unreadable event snapshot aside"
        );
        Ok(Some(target))
    }

    /// Writes the full snapshot.
    pub fn save(&self) -> StoreResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.events).map_err(StoreError::Serialize)?;
        let tmp = sibling(path, "tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;

        debug!(path = %path.display(), events = self.events.len(), "Saved event snapshot");
        Ok(())
    }

    /// Looks up an event by id.
    pub fn get_event(&self, id: &str) -> Option<&EventRecord> {
        self.events.iter().find(|e| e.id() == id)
    }

    /// All events in insertion order.
    pub fn get_events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Returns an id that no current event uses and that was never handed
    /// out by this store before.
    ///
    /// Ids are decimal counters. The counter only moves forward, so removing
    /// an event never makes its id (or a lower one) available again.
    ///
    /// # Errors
    ///
    /// [`StoreError::IdsExhausted`] once the counter would pass `u64::MAX`.
    pub fn next_event_id(&self) -> StoreResult<String> {
        if self.ids_exhausted {
            return Err(StoreError::IdsExhausted);
        }
        let mut candidate = self.next_id;
        while self.get_event(&candidate.to_string()).is_some() {
            candidate = candidate.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        }
        Ok(candidate.to_string())
    }

    /// Replaces the event with the same id, or appends it, then saves.
    ///
    /// # Errors
    ///
    /// Returns the save failure. The in-memory change is kept regardless.
    pub fn upsert_event(&mut self, event: EventRecord) -> StoreResult<()> {
        debug!(id = event.id(), name = %event.name, "Upserting event");
        self.put(event);
        self.save()
    }

    /// Removes an event and saves. `Ok(None)` means there was no such event,
    /// in which case nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the save failure. The event is removed from memory regardless.
    pub fn remove_event(&mut self, id: &str) -> StoreResult<Option<EventRecord>> {
        let Some(index) = self.events.iter().position(|e| e.id() == id) else {
            return Ok(None);
        };
        let removed = self.events.remove(index);
        debug!(id, name = %removed.name, "Removed event");
        self.save()?;
        Ok(Some(removed))
    }

    fn put(&mut self, event: EventRecord) {
        if let Ok(n) = event.id().parse::<u64>() {
            match n.checked_add(1) {
                Some(next) => self.next_id = self.next_id.max(next),
                None => self.ids_exhausted = true,
            }
        }
        match self.events.iter_mut().find(|e| e.id() == event.id()) {
            Some(existing) => *existing = event,
            None => self.events.push(event),
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
