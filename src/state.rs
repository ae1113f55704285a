use std::path::PathBuf;
use dashmap::DashMap;

use crate::models::ProgressSnapshot;

/// process-wide map from user identity to the latest published snapshot.
///
/// dashmap shards internally, so `set`/`get` for unrelated users never
/// contend on a common lock. snapshots are replaced wholesale, which keeps
/// concurrent readers safe without locking the snapshot itself.
#[derive(Default)]
pub struct ProgressStore {
    entries: DashMap<String, ProgressSnapshot>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// replace the entry for `user_key`. only one upload per user is ever
    /// in flight, so writes for a key are naturally serialized; a later
    /// write simply supersedes.
    pub fn set(&self, user_key: &str, snapshot: ProgressSnapshot) {
        self.entries.insert(user_key.to_string(), snapshot);
    }

    /// latest published snapshot, or `None` if no upload has started
    pub fn get(&self, user_key: &str) -> Option<ProgressSnapshot> {
        self.entries.get(user_key).map(|entry| entry.clone())
    }
}

/// shared application state
pub struct AppState {
    pub files_dir: PathBuf,
    /// upload progress per authenticated user
    pub progress: ProgressStore,
}

impl AppState {
    /// create a new app state with the given files directory
    pub fn new(files_dir: PathBuf) -> Self {
        Self {
            files_dir,
            progress: ProgressStore::new(),
        }
    }
}
