//! In-memory stores
//!
//! Reference backends for the storage seams, used by tests, the CLI and the
//! offline simulator:
//! - [`MemoryDirectory`]: event snapshots behind a `parking_lot::RwLock`
//! - [`MemoryCompletionStore`]: versioned completion records in a `DashMap`
//! - [`MemoryCheckInLedger`]: check-in flags in a `DashMap`

use crate::completion::ChecklistCompletion;
use crate::context::CompletionKey;
use crate::error::StoreError;
use crate::item::ChecklistItem;
use crate::snapshot::EventSnapshot;
use crate::store::{CheckInLedger, CompletionStore, EventDirectory, Versioned};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use marshal_scope::{CheckpointId, Contact, EventId, EventRoster, ItemId, MarshalId, Note};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Event definitions held in memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    events: RwLock<HashMap<EventId, EventSnapshot>>,
}

impl MemoryDirectory {
    /// Create empty directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event (completions in the snapshot are ignored)
    pub fn insert(&self, snapshot: EventSnapshot) {
        let event_id = snapshot.roster.event_id.clone();
        self.events.write().insert(event_id, snapshot);
    }

    /// Insert or replace one checklist item
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the event is unknown
    pub fn upsert_item(&self, item: ChecklistItem) -> Result<(), StoreError> {
        let mut events = self.events.write();
        let snapshot = events
            .get_mut(&item.event_id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", item.event_id)))?;
        match snapshot.checklist_items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => snapshot.checklist_items.push(item),
        }
        Ok(())
    }

    /// Remove a checklist item, returning whether it existed
    pub fn remove_item(&self, event_id: &EventId, item_id: &ItemId) -> bool {
        let mut events = self.events.write();
        let Some(snapshot) = events.get_mut(event_id) else {
            return false;
        };
        let before = snapshot.checklist_items.len();
        snapshot.checklist_items.retain(|item| &item.id != item_id);
        snapshot.checklist_items.len() != before
    }

    fn read<T>(&self, event_id: &EventId, f: impl FnOnce(&EventSnapshot) -> T) -> Result<T, StoreError> {
        self.events
            .read()
            .get(event_id)
            .map(f)
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))
    }
}

#[async_trait::async_trait]
impl EventDirectory for MemoryDirectory {
    async fn roster(&self, event_id: &EventId) -> Result<EventRoster, StoreError> {
        self.read(event_id, |s| s.roster.clone())
    }

    async fn checklist_items(&self, event_id: &EventId) -> Result<Vec<ChecklistItem>, StoreError> {
        self.read(event_id, |s| s.checklist_items.clone())
    }

    async fn notes(&self, event_id: &EventId) -> Result<Vec<Note>, StoreError> {
        self.read(event_id, |s| s.notes.clone())
    }

    async fn contacts(&self, event_id: &EventId) -> Result<Vec<Contact>, StoreError> {
        self.read(event_id, |s| s.contacts.clone())
    }
}

/// Completion records keyed by (event, completion key)
#[derive(Debug, Default)]
pub struct MemoryCompletionStore {
    records: DashMap<(EventId, CompletionKey), Versioned<ChecklistCompletion>>,
}

impl MemoryCompletionStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records unconditionally, later duplicates of a key replacing earlier ones
    pub fn seed(&self, event_id: &EventId, records: impl IntoIterator<Item = ChecklistCompletion>) {
        for record in records {
            let key = record.key();
            self.records.insert((event_id.clone(), key), Versioned::new(1, record));
        }
    }

    /// Every record of an event, active or not, ordered by key
    #[must_use]
    pub fn all_records(&self, event_id: &EventId) -> Vec<Versioned<ChecklistCompletion>> {
        let mut records: Vec<(CompletionKey, Versioned<ChecklistCompletion>)> = self
            .records
            .iter()
            .filter(|entry| &entry.key().0 == event_id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records.into_iter().map(|(_, record)| record).collect()
    }

    /// Number of stored records across events
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl CompletionStore for MemoryCompletionStore {
    async fn active_completions(&self, event_id: &EventId) -> Result<Vec<ChecklistCompletion>, StoreError> {
        Ok(self
            .all_records(event_id)
            .into_iter()
            .map(|record| record.value)
            .filter(ChecklistCompletion::is_active)
            .collect())
    }

    async fn get(
        &self,
        event_id: &EventId,
        key: &CompletionKey,
    ) -> Result<Option<Versioned<ChecklistCompletion>>, StoreError> {
        Ok(self
            .records
            .get(&(event_id.clone(), key.clone()))
            .map(|entry| entry.value().clone()))
    }

    async fn put(
        &self,
        event_id: &EventId,
        record: ChecklistCompletion,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let key = record.key();
        let conflict = |actual: Option<u64>| StoreError::Conflict {
            key: key.row_key(),
            expected,
            actual,
        };

        match (self.records.entry((event_id.clone(), key.clone())), expected) {
            (Entry::Vacant(vacant), None) => {
                vacant.insert(Versioned::new(1, record));
                Ok(1)
            }
            (Entry::Vacant(_), Some(_)) => Err(conflict(None)),
            (Entry::Occupied(occupied), None) => Err(conflict(Some(occupied.get().version))),
            (Entry::Occupied(mut occupied), Some(version)) => {
                let stored = occupied.get().version;
                if stored != version {
                    return Err(conflict(Some(stored)));
                }
                occupied.insert(Versioned::new(stored + 1, record));
                Ok(stored + 1)
            }
        }
    }

    async fn purge_item(&self, event_id: &EventId, item_id: &ItemId) -> Result<usize, StoreError> {
        let before = self.records.len();
        self.records
            .retain(|(event, _), record| !(event == event_id && &record.value.item_id == item_id));
        Ok(before - self.records.len())
    }
}

/// Check-in flags keyed by (event, marshal, checkpoint)
#[derive(Debug, Default)]
pub struct MemoryCheckInLedger {
    entries: DashMap<(EventId, MarshalId, CheckpointId), bool>,
}

impl MemoryCheckInLedger {
    /// Create empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CheckInLedger for MemoryCheckInLedger {
    async fn is_checked_in(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
        checkpoint_id: &CheckpointId,
    ) -> Result<bool, StoreError> {
        let key = (event_id.clone(), marshal_id.clone(), checkpoint_id.clone());
        Ok(self.entries.get(&key).is_some_and(|entry| *entry.value()))
    }

    async fn set_checked_in(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
        checkpoint_id: &CheckpointId,
        checked_in: bool,
    ) -> Result<bool, StoreError> {
        let key = (event_id.clone(), marshal_id.clone(), checkpoint_id.clone());
        let previous = self.entries.insert(key, checked_in).unwrap_or(false);
        Ok(previous != checked_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Actor, ActorType};
    use crate::context::CompletionContext;
    use chrono::Utc;

    fn record(owner: &str) -> ChecklistCompletion {
        let context = CompletionContext::Personal {
            marshal_id: owner.into(),
        };
        ChecklistCompletion::new(
            "E".into(),
            "X".into(),
            &context,
            Actor::new(ActorType::Marshal, owner, owner),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_requires_absence() {
        let store = MemoryCompletionStore::new();
        let event = EventId::new("E");
        assert_eq!(store.put(&event, record("A"), None).await.unwrap(), 1);
        let err = store.put(&event, record("A"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual: Some(1), .. }));
    }

    #[tokio::test]
    async fn replace_checks_version() {
        let store = MemoryCompletionStore::new();
        let event = EventId::new("E");
        store.put(&event, record("A"), None).await.unwrap();

        assert_eq!(store.put(&event, record("A"), Some(1)).await.unwrap(), 2);
        let stale = store.put(&event, record("A"), Some(1)).await.unwrap_err();
        assert!(matches!(stale, StoreError::Conflict { expected: Some(1), actual: Some(2), .. }));
    }

    #[tokio::test]
    async fn active_completions_skip_deleted() {
        let store = MemoryCompletionStore::new();
        let event = EventId::new("E");
        let mut deleted = record("B");
        deleted
            .uncomplete(Actor::new(ActorType::Marshal, "B", "B"), Utc::now())
            .unwrap();
        store.seed(&event, [record("A"), deleted]);

        let active = store.active_completions(&event).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].completion_context_id, "A");
        assert_eq!(store.all_records(&event).len(), 2);
    }

    #[tokio::test]
    async fn purge_removes_only_that_item() {
        let store = MemoryCompletionStore::new();
        let event = EventId::new("E");
        store.seed(&event, [record("A"), record("B")]);
        assert_eq!(store.purge_item(&event, &"X".into()).await.unwrap(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn separator_like_ids_keep_distinct_records() {
        let store = MemoryCompletionStore::new();
        let event = EventId::new("E");
        let starred_owner = CompletionContext::Checkpoint {
            checkpoint_id: "C1".into(),
            owner: "*".into(),
        };
        let shared = CompletionContext::SharedCheckpoint {
            checkpoint_id: "C1".into(),
        };
        let actor = Actor::new(ActorType::Marshal, "*", "Star");
        for context in [&starred_owner, &shared] {
            let record = ChecklistCompletion::new(event.clone(), "X".into(), context, actor.clone(), Utc::now());
            assert_eq!(store.put(&event, record, None).await.unwrap(), 1);
        }

        let piped = ChecklistCompletion::new(
            event.clone(),
            "X|Checkpoint".into(),
            &CompletionContext::Personal {
                marshal_id: "C1".into(),
            },
            actor,
            Utc::now(),
        );
        assert_eq!(store.put(&event, piped, None).await.unwrap(), 1);
        assert_eq!(store.all_records(&event).len(), 3);
    }

    #[test]
    fn upsert_item_replaces_or_appends() {
        let directory = MemoryDirectory::new();
        assert!(matches!(
            directory.upsert_item(ChecklistItem::new("X", "E", "Radio")),
            Err(StoreError::NotFound(_))
        ));

        directory.insert(EventSnapshot {
            roster: EventRoster::new("E".into()),
            checklist_items: vec![ChecklistItem::new("X", "E", "Radio")],
            ..EventSnapshot::default()
        });
        directory.upsert_item(ChecklistItem::new("X", "E", "Radio and spare battery")).unwrap();
        directory.upsert_item(ChecklistItem::new("Y", "E", "Vest")).unwrap();

        let texts = directory.read(&"E".into(), |s| {
            s.checklist_items.iter().map(|i| i.text.clone()).collect::<Vec<_>>()
        });
        assert_eq!(texts.unwrap(), vec!["Radio and spare battery", "Vest"]);
    }

    #[tokio::test]
    async fn ledger_reports_changes() {
        let ledger = MemoryCheckInLedger::new();
        let (event, marshal, checkpoint) = (EventId::new("E"), MarshalId::new("M"), CheckpointId::new("C"));
        assert!(!ledger.is_checked_in(&event, &marshal, &checkpoint).await.unwrap());
        assert!(ledger.set_checked_in(&event, &marshal, &checkpoint, true).await.unwrap());
        assert!(!ledger.set_checked_in(&event, &marshal, &checkpoint, true).await.unwrap());
        assert!(ledger.is_checked_in(&event, &marshal, &checkpoint).await.unwrap());
    }

    #[tokio::test]
    async fn directory_reports_unknown_event() {
        let directory = MemoryDirectory::new();
        let err = directory.roster(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
