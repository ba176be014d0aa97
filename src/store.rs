use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::warn;

/// Synchronous string key-value storage, the local persistence seam shared
/// by the snapshot cache and the pending-write queue.
///
/// Implementations may fail on write (quota, disk); callers that promised
/// never to throw (the cache) absorb those failures themselves.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
    fn save(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.data
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// JSON-file backed store. The whole map is read once at open and written
/// back on `save`; keys are sorted on disk so the file diffs cleanly.
struct FileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .with_context(|| format!("parse store file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("read store file {}", path.display())))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.data
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn save(&self) -> anyhow::Result<()> {
        let serialized = {
            let guard = self
                .data
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            serde_json::to_string(&*guard).context("serialize store contents")?
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create store dir {}", parent.display()))?;
        }
        fs::write(&self.path, serialized)
            .with_context(|| format!("write store file {}", self.path.display()))
    }
}

/// Cloneable handle over the process-wide local store.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn KvStore>,
}

impl StoreHandle {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    pub fn file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            inner: Arc::new(FileStore::open(path)?),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    pub fn set(&self, key: &str, value: &str) {
        self.inner.set(key, value);
    }

    pub fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// Flush to the backing medium, logging (not propagating) failures.
    pub fn persist_best_effort(&self) {
        if let Err(err) = self.inner.save() {
            warn!(
                target: "hearthlist",
                event = "store_save_failed",
                error = %err
            );
        }
    }

    pub fn persist(&self) -> anyhow::Result<()> {
        self.inner.save()
    }

    /// Remove every key carrying the given prefix; returns how many went.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        for key in &doomed {
            self.inner.remove(key);
        }
        doomed.len()
    }
}
