use std::path::Path;

use crate::cache::SnapshotCache;
use crate::config::RuntimeOptions;
use crate::queue::PendingQueue;
use crate::store::StoreHandle;

/// The one shared context for the process: local store, snapshot cache,
/// pending-write queue and options, constructed once at startup and
/// injected wherever needed. There are no ambient singletons; tests get
/// isolation by constructing their own.
#[derive(Clone)]
pub struct AppCtx {
    pub store: StoreHandle,
    pub cache: SnapshotCache,
    pub queue: PendingQueue,
    pub options: RuntimeOptions,
}

impl AppCtx {
    pub fn new(store: StoreHandle, options: RuntimeOptions) -> Self {
        Self {
            cache: SnapshotCache::new(store.clone()),
            queue: PendingQueue::with_options(store.clone(), options.queue),
            store,
            options,
        }
    }

    /// Context over the file-backed store at the default location.
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(&crate::config::store_path(), RuntimeOptions::default())
    }

    pub fn open(path: &Path, options: RuntimeOptions) -> anyhow::Result<Self> {
        Ok(Self::new(StoreHandle::file(path)?, options))
    }

    /// Ephemeral context; nothing touches disk. The teardown path for
    /// tests is simply dropping it.
    pub fn in_memory() -> Self {
        Self::new(StoreHandle::in_memory(), RuntimeOptions::default())
    }
}
