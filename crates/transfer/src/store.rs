//! Durable `id → UploadSession` mapping.
//!
//! The whole mapping lives in memory and is written back as one JSON record
//! after every mutation. Mutations hold the map lock across the write, so
//! two callers can never both start from the same prior state. Callers that
//! need a longer critical section for one session (write a chunk, record
//! it, check completion, merge) take that session's lock with
//! [`SessionStore::with_session_lock`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chunkyard_protocol::SessionState;

use crate::UploadError;
use crate::chunked::{tmp_sibling, write_synced};
use crate::sync::lock_unpoisoned;
use crate::types::UploadSession;

type SessionMap = BTreeMap<String, UploadSession>;

/// Crash-recoverable session persistence with per-session serialisation.
pub struct SessionStore {
    path: PathBuf,
    sessions: Mutex<SessionMap>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Opens the record at `path`, creating an empty one if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let path = path.into();
        let sessions = if path.exists() {
            let data = std::fs::read(&path)?;
            if data.iter().all(u8::is_ascii_whitespace) {
                SessionMap::new()
            } else {
                serde_json::from_slice(&data)?
            }
        } else {
            SessionMap::new()
        };

        let store = Self {
            path,
            sessions: Mutex::new(sessions),
            locks: Mutex::new(HashMap::new()),
        };
        {
            let sessions = lock_unpoisoned(&store.sessions, "sessions");
            store.persist(&sessions)?;
            tracing::info!(
                path = %store.path.display(),
                sessions = sessions.len(),
                "session store opened"
            );
        }
        Ok(store)
    }

    /// Location of the status record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the session for `id`, if one exists.
    pub fn get(&self, id: &str) -> Option<UploadSession> {
        lock_unpoisoned(&self.sessions, "sessions").get(id).cloned()
    }

    /// Returns a copy of every tracked session.
    pub fn snapshot(&self) -> Vec<UploadSession> {
        lock_unpoisoned(&self.sessions, "sessions")
            .values()
            .cloned()
            .collect()
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.sessions, "sessions").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records that chunk `chunk_index` of `id` is persisted.
    ///
    /// The first call for a new id creates the session from the given
    /// metadata. Later calls keep the first `filename`, `declared_size` and
    /// `total_chunks` no matter what they pass; rejecting mismatches is the
    /// caller's decision. Recording an index twice is a no-op.
    pub fn record_chunk(
        &self,
        id: &str,
        filename: &str,
        chunk_index: u32,
        declared_size: u64,
        total_chunks: u32,
    ) -> Result<UploadSession, UploadError> {
        self.apply(id, |entry| {
            let session = entry.get_or_insert_with(|| {
                tracing::info!(id, filename, total_chunks, declared_size, "upload session created");
                UploadSession::new(id, filename, declared_size, total_chunks)
            });
            if session.received_chunks.insert(chunk_index) {
                session.touch();
            }
            session.clone()
        })
    }

    /// Returns `true` iff `id` holds exactly the indices `0..total_chunks`.
    pub fn is_complete(&self, id: &str, total_chunks: u32) -> bool {
        lock_unpoisoned(&self.sessions, "sessions")
            .get(id)
            .is_some_and(|s| s.is_complete(total_chunks))
    }

    /// Moves `id` to `state`. Returns `None` if the session does not exist.
    pub fn set_state(
        &self,
        id: &str,
        state: SessionState,
    ) -> Result<Option<UploadSession>, UploadError> {
        self.apply(id, |entry| {
            let session = entry.as_mut()?;
            session.state = state;
            session.touch();
            Some(session.clone())
        })
    }

    /// Marks `id` completed with the name its final file ended up under.
    pub fn mark_completed(
        &self,
        id: &str,
        output_name: &str,
    ) -> Result<Option<UploadSession>, UploadError> {
        self.apply(id, |entry| {
            let session = entry.as_mut()?;
            session.state = SessionState::Completed;
            session.output_name = Some(output_name.to_string());
            session.touch();
            session.completed_at = Some(session.updated_at);
            Some(session.clone())
        })
    }

    /// Drops every recorded index for which `keep` returns `false` and puts
    /// an interrupted merge back into `receiving`.
    ///
    /// Returns the dropped indices, or `None` if the session does not exist.
    pub fn retain_chunks(
        &self,
        id: &str,
        mut keep: impl FnMut(u32) -> bool,
    ) -> Result<Option<Vec<u32>>, UploadError> {
        self.apply(id, |entry| {
            let session = entry.as_mut()?;
            let dropped: Vec<u32> = session
                .received_chunks
                .iter()
                .copied()
                .filter(|&i| !keep(i))
                .collect();
            for index in &dropped {
                session.received_chunks.remove(index);
            }
            if session.state == SessionState::Merging {
                session.state = SessionState::Receiving;
            }
            if !dropped.is_empty() {
                session.touch();
            }
            Some(dropped)
        })
    }

    /// Runs `f` while holding the lock for session `id`.
    ///
    /// Calls for the same id are linearised; different ids do not contend
    /// beyond a short lookup in the lock table.
    pub fn with_session_lock<R>(&self, id: &str, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut locks = lock_unpoisoned(&self.locks, "session locks");
            Arc::clone(locks.entry(id.to_string()).or_default())
        };

        let out = {
            let _guard = lock_unpoisoned(&lock, "session");
            f()
        };

        // Drop the table entry once nobody else holds or waits on it.
        let mut locks = lock_unpoisoned(&self.locks, "session locks");
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
        out
    }

    /// Applies `f` to the entry for `id` and persists the result.
    ///
    /// If the record cannot be written the in-memory entry is restored, so
    /// memory never runs ahead of disk.
    fn apply<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Option<UploadSession>) -> R,
    ) -> Result<R, UploadError> {
        let mut sessions = lock_unpoisoned(&self.sessions, "sessions");
        let previous = sessions.get(id).cloned();
        let mut entry = previous.clone();
        let out = f(&mut entry);
        if entry == previous {
            return Ok(out);
        }

        set_entry(&mut sessions, id, entry);
        if let Err(e) = self.persist(&sessions) {
            tracing::error!(id, error = %e, "failed to write status record");
            set_entry(&mut sessions, id, previous);
            return Err(e);
        }
        Ok(out)
    }

    fn persist(&self, sessions: &SessionMap) -> Result<(), UploadError> {
        let json = serde_json::to_vec(sessions)?;
        let tmp = tmp_sibling(&self.path);
        let result = write_synced(&tmp, &json).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn set_entry(sessions: &mut SessionMap, id: &str, entry: Option<UploadSession>) {
    match entry {
        Some(session) => {
            sessions.insert(id.to_string(), session);
        }
        None => {
            sessions.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    fn open_in(dir: &TempDir) -> SessionStore {
        SessionStore::open(dir.path().join("uploadStatus.json")).unwrap()
    }

    #[test]
    fn open_creates_empty_record() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        assert!(store.is_empty());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
    }

    #[test]
    fn get_unknown_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        assert!(store.get("nope").is_none());
        assert!(!store.is_complete("nope", 1));
    }

    #[test]
    fn record_creates_session_on_first_chunk() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        let s = store.record_chunk("u1", "x.bin", 1, 4, 2).unwrap();
        assert_eq!(s.id, "u1");
        assert_eq!(s.filename, "x.bin");
        assert_eq!(s.declared_size, 4);
        assert_eq!(s.total_chunks, 2);
        assert_eq!(s.state, SessionState::Receiving);
        assert_eq!(s.received_chunks, BTreeSet::from([1]));
    }

    #[test]
    fn record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        let first = store.record_chunk("u1", "x.bin", 0, 4, 2).unwrap();
        let again = store.record_chunk("u1", "x.bin", 0, 4, 2).unwrap();
        assert_eq!(first, again);
        assert_eq!(again.received_chunks.len(), 1);
    }

    #[test]
    fn first_metadata_wins() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        store.record_chunk("u1", "x.bin", 0, 4, 2).unwrap();
        let s = store.record_chunk("u1", "other.bin", 1, 999, 7).unwrap();
        assert_eq!(s.filename, "x.bin");
        assert_eq!(s.declared_size, 4);
        assert_eq!(s.total_chunks, 2);
        assert_eq!(s.received_chunks, BTreeSet::from([0, 1]));
    }

    #[test]
    fn is_complete_tracks_exact_range() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        store.record_chunk("u1", "x.bin", 0, 8, 4).unwrap();
        store.record_chunk("u1", "x.bin", 1, 8, 4).unwrap();
        store.record_chunk("u1", "x.bin", 3, 8, 4).unwrap();
        assert!(!store.is_complete("u1", 4));
        store.record_chunk("u1", "x.bin", 2, 8, 4).unwrap();
        assert!(store.is_complete("u1", 4));
        assert!(!store.is_complete("u1", 5));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_in(&dir);
            store.record_chunk("u1", "x.bin", 0, 4, 2).unwrap();
            store.record_chunk("u2", "y.bin", 2, 9, 3).unwrap();
            store.mark_completed("u2", "y.bin").unwrap();
        }
        let store = open_in(&dir);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("u1").unwrap().received_chunks, BTreeSet::from([0]));
        let u2 = store.get("u2").unwrap();
        assert_eq!(u2.state, SessionState::Completed);
        assert_eq!(u2.output_name.as_deref(), Some("y.bin"));
        assert!(u2.completed_at.is_some());
    }

    #[test]
    fn corrupt_record_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploadStatus.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SessionStore::open(&path).err().unwrap();
        assert!(matches!(err, UploadError::Record(_)));
    }

    #[test]
    fn empty_record_file_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploadStatus.json");
        std::fs::write(&path, "").unwrap();
        let store = SessionStore::open(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = TempDir::new().unwrap();
        let record_dir = dir.path().join("state");
        std::fs::create_dir_all(&record_dir).unwrap();
        let store = SessionStore::open(record_dir.join("uploadStatus.json")).unwrap();
        store.record_chunk("u1", "x.bin", 0, 4, 2).unwrap();

        std::fs::remove_dir_all(&record_dir).unwrap();
        let err = store.record_chunk("u1", "x.bin", 1, 4, 2).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.get("u1").unwrap().received_chunks, BTreeSet::from([0]));
    }

    #[test]
    fn retain_chunks_resets_interrupted_merge() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        for i in 0..3 {
            store.record_chunk("u1", "x.bin", i, 6, 3).unwrap();
        }
        store.set_state("u1", SessionState::Merging).unwrap();

        let dropped = store.retain_chunks("u1", |i| i != 0).unwrap().unwrap();
        assert_eq!(dropped, vec![0]);
        let s = store.get("u1").unwrap();
        assert_eq!(s.state, SessionState::Receiving);
        assert_eq!(s.received_chunks, BTreeSet::from([1, 2]));

        assert!(store.retain_chunks("missing", |_| true).unwrap().is_none());
    }

    #[test]
    fn concurrent_records_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_in(&dir));

        let handles: Vec<_> = (0..10u32)
            .map(|i| {
                let s = Arc::clone(&store);
                thread::spawn(move || {
                    s.record_chunk("u1", "x.bin", i, 10, 10).unwrap();
                    s.record_chunk(&format!("other-{i}"), "y.bin", 0, 1, 1).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let expected: BTreeSet<u32> = (0..10).collect();
        assert_eq!(store.get("u1").unwrap().received_chunks, expected);
        assert!(store.is_complete("u1", 10));
        assert_eq!(store.len(), 11);

        // The record on disk saw every update too.
        drop(store);
        let reopened = open_in(&dir);
        assert_eq!(reopened.get("u1").unwrap().received_chunks, expected);
        assert_eq!(reopened.len(), 11);
    }

    #[test]
    fn session_lock_linearises_same_id() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_in(&dir));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (s, inside, max_seen) =
                    (Arc::clone(&store), Arc::clone(&inside), Arc::clone(&max_seen));
                thread::spawn(move || {
                    s.with_session_lock("u1", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(store.locks.lock().unwrap().is_empty());
    }

    #[test]
    fn session_lock_returns_value() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        let n = store.with_session_lock("u1", || 42);
        assert_eq!(n, 42);
    }
}
