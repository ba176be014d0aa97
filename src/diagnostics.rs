use serde::Serialize;
use tracing::info;

use crate::cache::OFFLINE_PREFIX;
use crate::queue::{DEAD_LETTER_KEY, QUEUE_KEY};
use crate::store::StoreHandle;

/// What the settings view shows about offline storage.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSummary {
    pub snapshot_count: usize,
    pub queue_length: usize,
    pub dead_letter_count: usize,
    pub approx_bytes: usize,
    pub cache_size: String,
}

pub fn gather_summary(store: &StoreHandle) -> OfflineSummary {
    let mut snapshot_count = 0;
    let mut approx_bytes = 0;
    let mut queue_length = 0;
    let mut dead_letter_count = 0;

    for key in store.keys() {
        let value_len = store.get(&key).map(|value| value.len()).unwrap_or(0);
        approx_bytes += key.len() + value_len;
        match key.as_str() {
            QUEUE_KEY => {
                queue_length = entry_count(store, &key);
            }
            DEAD_LETTER_KEY => {
                dead_letter_count = entry_count(store, &key);
            }
            _ if key.starts_with(OFFLINE_PREFIX) => snapshot_count += 1,
            _ => {}
        }
    }

    OfflineSummary {
        snapshot_count,
        queue_length,
        dead_letter_count,
        approx_bytes,
        cache_size: format_size(approx_bytes),
    }
}

/// Human-readable estimate of offline storage usage.
pub fn cache_size(store: &StoreHandle) -> String {
    gather_summary(store).cache_size
}

/// Remove every offline key: snapshots, the pending queue and the dead
/// letters. User-triggered only; there is no automatic eviction anywhere
/// else. Returns how many entries were removed.
pub fn clear_offline_data(store: &StoreHandle) -> usize {
    let removed = store.remove_prefix(OFFLINE_PREFIX);
    store.persist_best_effort();
    info!(
        target: "hearthlist",
        event = "offline_data_cleared",
        removed
    );
    removed
}

fn entry_count(store: &StoreHandle, key: &str) -> usize {
    store
        .get(key)
        .and_then(|raw| serde_json::from_str::<Vec<serde_json::Value>>(&raw).ok())
        .map(|entries| entries.len())
        .unwrap_or(0)
}

fn format_size(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{cache_keys, SnapshotCache};
    use crate::queue::{PendingQueue, WriteKind};
    use serde_json::json;

    #[test]
    fn summary_counts_snapshots_and_queue() {
        let store = StoreHandle::in_memory();
        let cache = SnapshotCache::new(store.clone());
        let queue = PendingQueue::new(store.clone());

        cache.save(&cache_keys::user_profile("u1"), &json!({"name": "Jo"}));
        cache.save(&cache_keys::household("u1"), &json!({"id": "h1"}));
        queue.enqueue(WriteKind::AddExpense, json!({"amount": 3}), "h1");

        let summary = gather_summary(&store);
        assert_eq!(summary.snapshot_count, 2);
        assert_eq!(summary.queue_length, 1);
        assert_eq!(summary.dead_letter_count, 0);
        assert!(summary.approx_bytes > 0);
        assert!(summary.cache_size.ends_with(" KB"));
    }

    #[test]
    fn clear_removes_snapshots_and_queue_but_not_local_flags() {
        let store = StoreHandle::in_memory();
        let cache = SnapshotCache::new(store.clone());
        let queue = PendingQueue::new(store.clone());

        cache.save(&cache_keys::wishlist("l1"), &json!([]));
        queue.enqueue(WriteKind::AddCredit, json!({"amount": 2}), "h1");
        store.set("local_tutorial_seen_u1", "true");

        let removed = clear_offline_data(&store);
        assert_eq!(removed, 2);
        assert!(queue.is_empty());
        assert_eq!(cache.load(&cache_keys::wishlist("l1")), None);
        assert_eq!(store.get("local_tutorial_seen_u1").as_deref(), Some("true"));
    }

    #[test]
    fn size_formatting_is_kb_with_two_decimals() {
        assert_eq!(format_size(0), "0.00 KB");
        assert_eq!(format_size(2048), "2.00 KB");
    }
}
