use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use ts_rs::TS;

use crate::id::new_uuid_v4;
use crate::remote::InsertApi;
use crate::store::StoreHandle;
use crate::time::now_ms;

pub const QUEUE_KEY: &str = "offline_sync_queue";
pub const DEAD_LETTER_KEY: &str = "offline_sync_dead_letter";

/// Which remote collection a deferred mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../web/src/bindings/")]
pub enum WriteKind {
    AddShoppingItem,
    AddWishlistItem,
    AddExpense,
    AddCredit,
}

impl WriteKind {
    pub fn collection(self) -> &'static str {
        match self {
            WriteKind::AddShoppingItem => "shopping_items",
            WriteKind::AddWishlistItem => "wishlist_items",
            WriteKind::AddExpense => "expenses",
            WriteKind::AddCredit => "credits",
        }
    }
}

/// A locally created mutation awaiting confirmation by the remote store.
///
/// `id` is local only; the payload may carry a temporary record id that is
/// stripped before submission. `household_id` groups entries for
/// diagnostics and plays no part in ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../web/src/bindings/")]
pub struct PendingWrite {
    pub id: String,
    pub kind: WriteKind,
    #[ts(type = "unknown")]
    pub payload: Value,
    #[ts(type = "number")]
    pub enqueued_at: i64,
    pub household_id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    #[ts(type = "number")]
    pub attempts: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOptions {
    /// Transient-failure ceiling for a single entry before it is parked
    /// under the dead-letter key. `None` preserves retry-forever.
    pub max_attempts: Option<u32>,
}

/// What a drain run did. Drain never propagates errors; callers log the
/// report and move on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub submitted: usize,
    pub dropped: usize,
    pub parked: usize,
    pub remaining: usize,
    /// Another drain was already running; nothing was attempted.
    pub skipped: bool,
    /// A transient failure stopped the run early.
    pub halted: bool,
}

/// Durable FIFO queue of pending writes, persisted whole under one store
/// key. Entries leave the queue only on confirmed success, permanent
/// rejection, or (when a ceiling is configured) parking.
#[derive(Clone)]
pub struct PendingQueue {
    store: StoreHandle,
    draining: Arc<AtomicBool>,
    options: QueueOptions,
}

struct DrainGuard {
    flag: Arc<AtomicBool>,
}

impl DrainGuard {
    fn acquire(flag: Arc<AtomicBool>) -> Option<Self> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl PendingQueue {
    pub fn new(store: StoreHandle) -> Self {
        Self::with_options(store, QueueOptions::default())
    }

    pub fn with_options(store: StoreHandle, options: QueueOptions) -> Self {
        Self {
            store,
            draining: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    /// Current queue contents in insertion order. A missing or corrupt
    /// queue entry in the store reads as empty.
    pub fn entries(&self) -> Vec<PendingWrite> {
        self.read_list(QUEUE_KEY)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Entries parked after exhausting a configured retry ceiling. Kept
    /// for inspection only; nothing replays them.
    pub fn dead_letters(&self) -> Vec<PendingWrite> {
        self.read_list(DEAD_LETTER_KEY)
    }

    /// Append a deferred mutation and return it. Safe to call while a
    /// drain is running; the queue is rewritten whole on every change.
    pub fn enqueue(&self, kind: WriteKind, payload: Value, household_id: &str) -> PendingWrite {
        let entry = PendingWrite {
            id: new_uuid_v4(),
            kind,
            payload,
            enqueued_at: now_ms(),
            household_id: household_id.to_string(),
            attempts: 0,
        };
        let mut queue = self.entries();
        queue.push(entry.clone());
        self.write_list(QUEUE_KEY, &queue);
        info!(
            target: "hearthlist",
            event = "pending_write_queued",
            kind = ?kind,
            household_id,
            queue_len = queue.len()
        );
        entry
    }

    /// Delete the entry with this id; a no-op when absent.
    pub fn remove(&self, id: &str) {
        let queue: Vec<PendingWrite> = self
            .entries()
            .into_iter()
            .filter(|entry| entry.id != id)
            .collect();
        self.write_list(QUEUE_KEY, &queue);
    }

    /// Submit queued writes strictly in insertion order, one at a time.
    ///
    /// Success removes the entry. A transient failure halts the run with
    /// the entry (and everything after it) still queued, so a retry
    /// cannot reorder causally dependent writes. A permanent rejection
    /// removes the entry and continues; one bad record must not wedge the
    /// queue, at the accepted cost of losing that write.
    pub async fn drain<T: InsertApi + Sync>(&self, transport: &T) -> DrainReport {
        let Some(_guard) = DrainGuard::acquire(self.draining.clone()) else {
            return DrainReport {
                skipped: true,
                ..DrainReport::default()
            };
        };

        let mut report = DrainReport::default();
        let snapshot = self.entries();
        if snapshot.is_empty() {
            return report;
        }
        info!(
            target: "hearthlist",
            event = "queue_drain_started",
            queue_len = snapshot.len()
        );

        for entry in snapshot {
            let mut record = entry.payload.clone();
            if let Some(fields) = record.as_object_mut() {
                // The remote store assigns identity; the temporary local
                // id must not travel.
                fields.remove("id");
            }

            match transport.insert(entry.kind.collection(), &record).await {
                Ok(_) => {
                    self.remove(&entry.id);
                    report.submitted += 1;
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        target: "hearthlist",
                        event = "queue_drain_halted",
                        entry_id = %entry.id,
                        kind = ?entry.kind,
                        error = %err
                    );
                    report.halted = true;
                    if self.note_transient_failure(&entry) {
                        report.parked += 1;
                    }
                    break;
                }
                Err(err) => {
                    warn!(
                        target: "hearthlist",
                        event = "queue_drain_dropped_entry",
                        entry_id = %entry.id,
                        kind = ?entry.kind,
                        household_id = %entry.household_id,
                        error = %err
                    );
                    self.remove(&entry.id);
                    report.dropped += 1;
                }
            }
        }

        report.remaining = self.len();
        info!(
            target: "hearthlist",
            event = "queue_drain_finished",
            submitted = report.submitted,
            dropped = report.dropped,
            parked = report.parked,
            remaining = report.remaining,
            halted = report.halted
        );
        report
    }

    /// Count a transient failure against the configured ceiling; park the
    /// entry when exhausted. Returns whether the entry was parked. With
    /// no ceiling the queue is left untouched and the entry retries on
    /// every future trigger.
    fn note_transient_failure(&self, entry: &PendingWrite) -> bool {
        let Some(max_attempts) = self.options.max_attempts else {
            return false;
        };
        let attempts = entry.attempts + 1;
        if attempts >= max_attempts {
            self.remove(&entry.id);
            let mut parked = self.dead_letters();
            parked.push(PendingWrite {
                attempts,
                ..entry.clone()
            });
            self.write_list(DEAD_LETTER_KEY, &parked);
            warn!(
                target: "hearthlist",
                event = "pending_write_parked",
                entry_id = %entry.id,
                attempts
            );
            return true;
        }
        let queue: Vec<PendingWrite> = self
            .entries()
            .into_iter()
            .map(|mut queued| {
                if queued.id == entry.id {
                    queued.attempts = attempts;
                }
                queued
            })
            .collect();
        self.write_list(QUEUE_KEY, &queue);
        false
    }

    fn read_list(&self, key: &str) -> Vec<PendingWrite> {
        let Some(raw) = self.store.get(key) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    fn write_list(&self, key: &str, entries: &[PendingWrite]) {
        match serde_json::to_string(entries) {
            Ok(raw) => {
                self.store.set(key, &raw);
                self.store.persist_best_effort();
            }
            Err(err) => {
                warn!(
                    target: "hearthlist",
                    event = "queue_persist_failed",
                    key,
                    error = %err
                );
            }
        }
    }
}
