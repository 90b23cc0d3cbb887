//! @ai:module:intent Key-value persistence for runs, summaries and input sets
//! @ai:module:layer infrastructure
//! @ai:module:public_api RecordStore, RecordStoreExt, MemoryStore, JsonFileStore, SummaryLocks, update_summary, groups
//! @ai:module:stateless false

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub mod groups {
    pub const LEGAL_MOVE_RUNS: &str = "legal_move_runs";
    pub const LEGAL_MOVE_SUMMARIES: &str = "legal_move_summaries";
    pub const PUZZLE_RUNS: &str = "puzzle_runs";
    pub const PUZZLE_SUMMARIES: &str = "puzzle_summaries";
    pub const ENGINE_MATCH_RUNS: &str = "engine_match_runs";
    pub const ENGINE_MATCH_SUMMARIES: &str = "engine_match_summaries";
    pub const PUZZLE_SETS: &str = "puzzle_sets";
}

/// @ai:intent Trait for a group/id addressed JSON record store
pub trait RecordStore: Send + Sync {
    fn get_value(&self, group: &str, id: &str) -> Result<Option<Value>, StoreError>;

    fn set_value(&self, group: &str, id: &str, value: Value) -> Result<(), StoreError>;

    /// @ai:intent All records of a group, ordered by id
    fn list_values(&self, group: &str) -> Result<Vec<Value>, StoreError>;
}

/// @ai:intent Typed access on top of any RecordStore
pub trait RecordStoreExt: RecordStore {
    fn get<T: DeserializeOwned>(&self, group: &str, id: &str) -> Result<Option<T>, StoreError> {
        self.get_value(group, id)?
            .map(|value| serde_json::from_value(value).map_err(|source| json_error(group, id, source)))
            .transpose()
    }

    fn set<T: Serialize>(&self, group: &str, id: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(|source| json_error(group, id, source))?;
        self.set_value(group, id, value)
    }

    /// @ai:post records that no longer match `T` are skipped with a warning
    fn list<T: DeserializeOwned>(&self, group: &str) -> Result<Vec<T>, StoreError> {
        Ok(self
            .list_values(group)?
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(group, error = %e, "skipping unreadable record");
                    None
                }
            })
            .collect())
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

fn json_error(group: &str, id: &str, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        group: group.to_string(),
        id: id.to_string(),
        source,
    }
}

/// @ai:intent In-process store, used by tests and one-off runs
#[derive(Default)]
pub struct MemoryStore {
    groups: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get_value(&self, group: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let groups = self.groups.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(groups.get(group).and_then(|records| records.get(id)).cloned())
    }

    fn set_value(&self, group: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let mut groups = self.groups.lock().map_err(|_| StoreError::Poisoned)?;
        groups
            .entry(group.to_string())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    fn list_values(&self, group: &str) -> Result<Vec<Value>, StoreError> {
        let groups = self.groups.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(groups
            .get(group)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// @ai:intent One directory per group, one pretty-printed `<id>.json` per record
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// @ai:effects pure
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, group: &str, id: &str) -> PathBuf {
        self.root
            .join(sanitize(group))
            .join(format!("{}.json", sanitize(id)))
    }

    fn read(path: &Path) -> Result<String, StoreError> {
        std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// File-name-safe form of a group or id.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

impl RecordStore for JsonFileStore {
    /// @ai:effects fs:read
    fn get_value(&self, group: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.record_path(group, id);
        if !path.exists() {
            return Ok(None);
        }
        let content = Self::read(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| json_error(group, id, source))
    }

    /// @ai:intent Write via a temp file and rename so readers never see a partial record
    /// @ai:effects fs:write
    fn set_value(&self, group: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let path = self.record_path(group, id);
        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(&value).map_err(|source| json_error(group, id, source))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_error)?;
        std::fs::rename(&tmp, &path).map_err(io_error)?;
        Ok(())
    }

    /// @ai:effects fs:read
    fn list_values(&self, group: &str) -> Result<Vec<Value>, StoreError> {
        let dir = self.root.join(sanitize(group));
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        paths.sort();

        let mut values = Vec::with_capacity(paths.len());
        for path in paths {
            let content = Self::read(&path)?;
            match serde_json::from_str(&content) {
                Ok(value) => values.push(value),
                Err(e) => tracing::warn!("Skipping invalid record {}: {}", path.display(), e),
            }
        }
        Ok(values)
    }
}

/// @ai:intent One async mutex per summary key, serializing read-modify-write merges
#[derive(Default)]
pub struct SummaryLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SummaryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// @ai:intent Wait for exclusive access to `key`
    pub async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// @ai:intent Read, transform and write one summary while holding its key lock
/// @ai:post returns the stored value
/// @ai:effects store:write
pub async fn update_summary<T, F>(
    store: &dyn RecordStore,
    locks: &SummaryLocks,
    group: &str,
    id: &str,
    merge: F,
) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<T>) -> T,
{
    let _guard = locks.acquire(&format!("{group}/{id}")).await;
    let existing = store.get::<T>(group, id)?;
    let updated = merge(existing);
    store.set(group, id, &updated)?;
    Ok(updated)
}
