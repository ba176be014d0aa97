use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::store::StoreHandle;
use crate::time::now_ms;

/// Every snapshot key carries this prefix so offline data can be cleared
/// in bulk without touching unrelated store entries.
pub const OFFLINE_PREFIX: &str = "offline_";

/// Namespaced key builders, one per cached entity kind.
pub mod cache_keys {
    pub fn user_profile(user_id: &str) -> String {
        format!("offline_user_{user_id}")
    }

    pub fn household(user_id: &str) -> String {
        format!("offline_household_{user_id}")
    }

    pub fn dashboard_stats(household_id: &str) -> String {
        format!("offline_stats_{household_id}")
    }

    pub fn shopping_list(list_id: &str) -> String {
        format!("offline_shopping_{list_id}")
    }

    pub fn wishlist(list_id: &str) -> String {
        format!("offline_wishlist_{list_id}")
    }

    pub fn lists_summary(household_id: &str, list_type: &str) -> String {
        format!("offline_lists_{household_id}_{list_type}")
    }

    pub fn finance_data(household_id: &str) -> String {
        format!("offline_finance_{household_id}")
    }

    pub fn finance_credits(household_id: &str) -> String {
        format!("offline_credits_{household_id}")
    }

    pub fn member_count(household_id: &str) -> String {
        format!("offline_member_count_{household_id}")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    timestamp: i64,
    data: Value,
}

/// Last-known-good cache of remote entities, keyed by `cache_keys`.
///
/// Saves replace the whole entry; loads absorb every failure into "no
/// opinion". There is no expiry: clearing is manual (see `diagnostics`).
#[derive(Clone)]
pub struct SnapshotCache {
    store: StoreHandle,
}

impl SnapshotCache {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Overwrite the snapshot under `key`. Serialization or storage
    /// failure downgrades to a logged no-op; the in-memory value the
    /// caller already holds stays authoritative for this session.
    pub fn save<T: Serialize>(&self, key: &str, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    target: "hearthlist",
                    event = "snapshot_save_failed",
                    key,
                    error = %err
                );
                return;
            }
        };
        let envelope = SnapshotEnvelope {
            timestamp: now_ms(),
            data,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => {
                self.store.set(key, &raw);
                self.store.persist_best_effort();
            }
            Err(err) => {
                warn!(
                    target: "hearthlist",
                    event = "snapshot_save_failed",
                    key,
                    error = %err
                );
            }
        }
    }

    /// Last-known payload for `key`, or `None` on absence or corruption.
    /// `None` means "no opinion", never "empty".
    pub fn load(&self, key: &str) -> Option<Value> {
        let raw = self.store.get(key)?;
        match serde_json::from_str::<SnapshotEnvelope>(&raw) {
            Ok(envelope) => Some(envelope.data),
            Err(_) => None,
        }
    }

    /// Typed load with the same absorbing semantics: a payload that no
    /// longer matches `T` reads as absent.
    pub fn load_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.load(key)
            .and_then(|data| serde_json::from_value(data).ok())
    }

    /// Capture time of the snapshot under `key`, when one is readable.
    pub fn captured_at(&self, key: &str) -> Option<i64> {
        let raw = self.store.get(key)?;
        serde_json::from_str::<SnapshotEnvelope>(&raw)
            .ok()
            .map(|envelope| envelope.timestamp)
    }
}
