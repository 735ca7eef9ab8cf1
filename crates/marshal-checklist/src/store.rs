//! Storage seams
//!
//! The engine reads definitions and rosters through [`EventDirectory`],
//! writes completions through [`CompletionStore`] and toggles check-in state
//! through [`CheckInLedger`]. Records are addressed by a two-part key: the
//! event id partitions, the row key identifies.

use crate::completion::ChecklistCompletion;
use crate::context::CompletionKey;
use crate::error::StoreError;
use crate::item::ChecklistItem;
use marshal_scope::{CheckpointId, Contact, EventId, EventRoster, ItemId, MarshalId, Note};
use serde::{Deserialize, Serialize};

/// A value with the version token it was read at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Monotonic per-key version, starting at 1
    pub version: u64,
    /// Stored value
    pub value: T,
}

impl<T> Versioned<T> {
    /// Create versioned value
    #[inline]
    #[must_use]
    pub fn new(version: u64, value: T) -> Self {
        Self { version, value }
    }
}

/// Read access to event definitions
#[async_trait::async_trait]
pub trait EventDirectory: Send + Sync {
    /// Roster of an event
    async fn roster(&self, event_id: &EventId) -> Result<EventRoster, StoreError>;

    /// All live checklist items of an event
    async fn checklist_items(&self, event_id: &EventId) -> Result<Vec<ChecklistItem>, StoreError>;

    /// One checklist item, `None` if absent or deleted
    async fn checklist_item(
        &self,
        event_id: &EventId,
        item_id: &ItemId,
    ) -> Result<Option<ChecklistItem>, StoreError> {
        let items = self.checklist_items(event_id).await?;
        Ok(items.into_iter().find(|item| &item.id == item_id))
    }

    /// All notes of an event
    async fn notes(&self, event_id: &EventId) -> Result<Vec<Note>, StoreError>;

    /// All contacts of an event
    async fn contacts(&self, event_id: &EventId) -> Result<Vec<Contact>, StoreError>;
}

/// Completion records with optimistic concurrency
#[async_trait::async_trait]
pub trait CompletionStore: Send + Sync {
    /// All non-deleted completions of an event
    async fn active_completions(&self, event_id: &EventId) -> Result<Vec<ChecklistCompletion>, StoreError>;

    /// Record for a key, active or not
    async fn get(
        &self,
        event_id: &EventId,
        key: &CompletionKey,
    ) -> Result<Option<Versioned<ChecklistCompletion>>, StoreError>;

    /// Conditional write
    ///
    /// `expected = None` inserts and requires the key to be absent;
    /// `Some(v)` replaces and requires the stored version to be `v`.
    /// Returns the new version.
    async fn put(
        &self,
        event_id: &EventId,
        record: ChecklistCompletion,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Drop every record of an item (cascade on item deletion)
    async fn purge_item(&self, event_id: &EventId, item_id: &ItemId) -> Result<usize, StoreError>;
}

/// Per-marshal check-in state
#[async_trait::async_trait]
pub trait CheckInLedger: Send + Sync {
    /// Whether the marshal is checked in at the checkpoint
    async fn is_checked_in(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
        checkpoint_id: &CheckpointId,
    ) -> Result<bool, StoreError>;

    /// Set the state, returning whether it changed
    async fn set_checked_in(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
        checkpoint_id: &CheckpointId,
        checked_in: bool,
    ) -> Result<bool, StoreError>;
}
