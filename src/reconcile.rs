use serde::{Deserialize, Serialize};

use crate::remote::{ChangeEvent, ChangeKind};

/// Anything held in a live collection can name its server-assigned id.
pub trait EntityId {
    fn entity_id(&self) -> &str;
}

/// A record as the UI sees it: either confirmed by the remote store, or
/// created locally and still awaiting confirmation. The tag, not the
/// record's position, is what distinguishes the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LiveRecord<T> {
    Pending { temp_id: String, data: T },
    Confirmed { data: T },
}

impl<T: EntityId> LiveRecord<T> {
    pub fn data(&self) -> &T {
        match self {
            LiveRecord::Pending { data, .. } | LiveRecord::Confirmed { data } => data,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, LiveRecord::Pending { .. })
    }

    fn matches_id(&self, id: &str) -> bool {
        match self {
            LiveRecord::Pending { temp_id, .. } => temp_id == id,
            LiveRecord::Confirmed { data } => data.entity_id() == id,
        }
    }
}

/// In-memory view of one remote collection, fed by full fetches, by
/// optimistic local inserts, and by realtime change events. The snapshot
/// cache is refreshed lazily on the next full fetch, never from here.
#[derive(Debug, Clone, Default)]
pub struct LiveCollection<T> {
    records: Vec<LiveRecord<T>>,
}

impl<T: EntityId + Clone> LiveCollection<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Replace the whole collection from a full fetch; everything fetched
    /// is confirmed by definition.
    pub fn reset(&mut self, records: Vec<T>) {
        self.records = records
            .into_iter()
            .map(|data| LiveRecord::Confirmed { data })
            .collect();
    }

    /// Show a locally created record immediately, tagged with the
    /// temporary id the UI substituted before confirmation.
    pub fn push_pending(&mut self, temp_id: impl Into<String>, data: T) {
        self.records.push(LiveRecord::Pending {
            temp_id: temp_id.into(),
            data,
        });
    }

    /// Swap a pending record for its server-confirmed form without a
    /// duplicate appearing: the match is by temp id, not position. An
    /// unknown temp id appends (the pending record may have been lost to
    /// a reload).
    pub fn confirm(&mut self, temp_id: &str, confirmed: T) {
        if let Some(record) = self
            .records
            .iter_mut()
            .find(|record| record.is_pending() && record.matches_id(temp_id))
        {
            *record = LiveRecord::Confirmed { data: confirmed };
        } else {
            self.upsert_confirmed(confirmed);
        }
    }

    /// Apply one subscription event by entity id.
    pub fn apply(&mut self, event: ChangeEvent<T>) {
        match event.kind {
            ChangeKind::Insert => {
                if let Some(data) = event.new {
                    self.upsert_confirmed(data);
                }
            }
            ChangeKind::Update => {
                if let Some(data) = event.new {
                    self.upsert_confirmed(data);
                }
            }
            ChangeKind::Delete => {
                let id = event
                    .old
                    .as_ref()
                    .map(|data| data.entity_id().to_string())
                    .or_else(|| event.new.as_ref().map(|d| d.entity_id().to_string()));
                if let Some(id) = id {
                    self.records.retain(|record| !record.matches_id(&id));
                }
            }
        }
    }

    fn upsert_confirmed(&mut self, data: T) {
        let id = data.entity_id().to_string();
        if let Some(record) = self
            .records
            .iter_mut()
            .find(|record| !record.is_pending() && record.matches_id(&id))
        {
            *record = LiveRecord::Confirmed { data };
        } else {
            self.records.push(LiveRecord::Confirmed { data });
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveRecord<T>> {
        self.records.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_pending()).count()
    }
}
