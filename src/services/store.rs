//! Key-value persistence for job snapshots

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use futures::future::{BoxFuture, FutureExt};
use tokio::fs;
use tracing::{debug, warn};

use crate::{error::StoreError, state::JobSnapshot};

/// Snapshot storage keyed by job id. Last write wins per job.
pub trait SnapshotStore: Send + Sync {
    fn save<'a>(&'a self, job_id: &'a str, snapshot: &'a JobSnapshot) -> BoxFuture<'a, Result<(), StoreError>>;
    fn load<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobSnapshot>, StoreError>>;
    fn remove<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;
}

/// One JSON file per job inside a data directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(job_id)))
    }

    fn io_err(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io { path: path.to_path_buf(), source }
    }

    /// Write to a temp file first, then rename over the target
    async fn write_atomic(&self, job_id: &str, snapshot: &JobSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_err(&self.dir, e))?;

        let path = self.path_for(job_id);
        let json = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        // Unique per write so concurrent saves never share a half-written file
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&temp_path, &json)
            .await
            .map_err(|e| Self::io_err(&temp_path, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Self::io_err(&path, e))?;

        debug!("Saved snapshot for job {} to {:?}", job_id, path);
        Ok(())
    }

    async fn read(&self, job_id: &str) -> Result<Option<JobSnapshot>, StoreError> {
        let path = self.path_for(job_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_err(&path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    async fn delete(&self, job_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(job_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }

    async fn job_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err(&self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::io_err(&self.dir, e))? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                match path.file_stem().and_then(|s| s.to_str()).and_then(decode_file_stem) {
                    Some(job_id) => ids.push(job_id),
                    None => warn!("Skipping snapshot with unrecognized name: {:?}", path),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save<'a>(&'a self, job_id: &'a str, snapshot: &'a JobSnapshot) -> BoxFuture<'a, Result<(), StoreError>> {
        self.write_atomic(job_id, snapshot).boxed()
    }

    fn load<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobSnapshot>, StoreError>> {
        self.read(job_id).boxed()
    }

    fn remove<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.delete(job_id).boxed()
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        self.job_ids().boxed()
    }
}

/// Map a job id onto a file stem. Bytes outside `[A-Za-z0-9-]` are written as `_xx` hex,
/// so distinct ids never share a file and the id can be read back from the name.
fn file_stem(job_id: &str) -> String {
    let mut stem = String::with_capacity(job_id.len());
    for byte in job_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

/// Inverse of [`file_stem`]; `None` for names this store did not write
fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                let hex = stem.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// In-memory store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, JobSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save<'a>(&'a self, job_id: &'a str, snapshot: &'a JobSnapshot) -> BoxFuture<'a, Result<(), StoreError>> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(job_id.to_string(), snapshot.clone());
        }
        futures::future::ready(Ok(())).boxed()
    }

    fn load<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobSnapshot>, StoreError>> {
        let snapshot = self
            .snapshots
            .lock()
            .ok()
            .and_then(|snapshots| snapshots.get(job_id).cloned());
        futures::future::ready(Ok(snapshot)).boxed()
    }

    fn remove<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.remove(job_id);
        }
        futures::future::ready(Ok(())).boxed()
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        let mut ids: Vec<String> = self
            .snapshots
            .lock()
            .map(|snapshots| snapshots.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        futures::future::ready(Ok(ids)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::epoch_plus;
    use crate::state::{JobStatus, JobTimerState, PauseInterval, Step};

    fn snapshot(job_id: &str) -> JobSnapshot {
        JobTimerState {
            job_id: job_id.to_string(),
            steps: Step::from_labels(["A", "B"]),
            current_step_index: 1,
            status: JobStatus::Paused,
            started_at: epoch_plus(0),
            pause_intervals: vec![
                PauseInterval { paused_at: epoch_plus(3), resumed_at: Some(epoch_plus(4)) },
                PauseInterval::open(epoch_plus(9)),
            ],
            completed_at: None,
        }
    }

    fn temp_store() -> FileSnapshotStore {
        FileSnapshotStore::new(std::env::temp_dir().join(format!("job-timer-{}", uuid::Uuid::new_v4())))
    }

    #[test]
    fn file_stem_escapes_unsafe_bytes() {
        assert_eq!(file_stem("job-42"), "job-42");
        assert_eq!(file_stem("a_b"), "a_5fb");
        assert_eq!(file_stem("../x"), "_2e_2e_2fx");
        assert_ne!(file_stem("a.b"), file_stem("a_b"));
        assert_ne!(file_stem("a/b"), file_stem("a_b"));
    }

    #[test]
    fn file_stem_decodes_back_to_job_id() {
        for id in ["job-1", "a.b", "a/b", "a_b", "café 42", "_"] {
            assert_eq!(decode_file_stem(&file_stem(id)).as_deref(), Some(id));
        }
        assert_eq!(decode_file_stem("bad_z"), None);
        assert_eq!(decode_file_stem("has.dot"), None);
    }

    #[tokio::test]
    async fn file_store_keeps_similar_ids_apart() {
        let store = temp_store();
        for id in ["a.b", "a_b", "a/b"] {
            store.save(id, &snapshot(id)).await.unwrap();
        }

        let ids = store.list().await.unwrap();
        assert_eq!(ids.len(), 3);
        for id in ["a.b", "a_b", "a/b"] {
            assert!(ids.contains(&id.to_string()));
            assert_eq!(store.load(id).await.unwrap(), Some(snapshot(id)));
        }

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_job_leave_a_readable_file() {
        let store = temp_store();
        let snapshots: Vec<JobSnapshot> = (0..16)
            .map(|i| {
                let mut s = snapshot("job-c");
                s.steps = Step::from_labels((0..=i).map(|n| format!("step-{}", n)));
                s.current_step_index = i;
                s
            })
            .collect();

        futures::future::join_all(snapshots.iter().map(|s| store.save("job-c", s))).await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        let loaded = store.load("job-c").await.unwrap().unwrap();
        assert!(snapshots.contains(&loaded));
        let leftovers = std::fs::read_dir(store.dir())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn file_store_saves_loads_and_removes() {
        let store = temp_store();
        assert!(store.load("job-1").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());

        let original = snapshot("job-1");
        store.save("job-1", &original).await.unwrap();
        assert_eq!(store.load("job-1").await.unwrap(), Some(original));
        assert_eq!(store.list().await.unwrap(), vec!["job-1".to_string()]);

        store.remove("job-1").await.unwrap();
        assert!(store.load("job-1").await.unwrap().is_none());
        store.remove("job-1").await.unwrap();

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn file_store_last_write_wins() {
        let store = temp_store();
        let mut first = snapshot("job-2");
        store.save("job-2", &first).await.unwrap();
        first.current_step_index = 0;
        store.save("job-2", &first).await.unwrap();
        assert_eq!(store.load("job-2").await.unwrap().unwrap().current_step_index, 0);

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn file_store_reports_invalid_json() {
        let store = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("broken.json"), b"{not json").unwrap();
        assert!(matches!(store.load("broken").await, Err(StoreError::Json { .. })));

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemorySnapshotStore::new();
        store.save("b", &snapshot("b")).await.unwrap();
        store.save("a", &snapshot("a")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
        store.remove("a").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("b").await.unwrap(), Some(snapshot("b")));
    }
}
