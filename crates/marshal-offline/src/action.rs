//! Offline actions
//!
//! An action is a mutating request captured on the device. The queue treats
//! the payload as opaque JSON; [`OfflineAction::decode`] recovers the typed
//! form when the action is replayed.
//!
//! Payloads carry the *target* state (checked in or not, completed or not)
//! rather than a toggle, so replaying an action twice converges.

use crate::error::QueueError;
use chrono::{DateTime, Utc};
use marshal_checklist::{ActorRef, CompletionRequest, ContextRef};
use marshal_scope::{CheckpointId, EventId, ItemId, MarshalId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use ulid::Ulid;

/// Closed set of queueable actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Marshal sets their own check-in
    CheckIn,
    /// Admin or lead sets someone's check-in
    AdminCheckIn,
    /// Complete a checklist item
    ChecklistComplete,
    /// Uncomplete a checklist item
    ChecklistUncomplete,
}

impl ActionType {
    /// Whether the payload is a [`ChecklistActionPayload`]
    #[inline]
    #[must_use]
    pub fn is_checklist(self) -> bool {
        matches!(self, Self::ChecklistComplete | Self::ChecklistUncomplete)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CheckIn => "check_in",
            Self::AdminCheckIn => "admin_check_in",
            Self::ChecklistComplete => "checklist_complete",
            Self::ChecklistUncomplete => "checklist_uncomplete",
        };
        f.write_str(name)
    }
}

/// Replay status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Not yet attempted
    #[default]
    Pending,
    /// Failed transiently, will be retried
    Retrying,
    /// Gave up after the attempt bound; waits for the user
    Failed,
}

/// Payload of checklist complete/uncomplete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistActionPayload {
    /// Event
    pub event_id: EventId,
    /// Item
    pub item_id: ItemId,
    /// Owner of the task row
    pub owner_marshal_id: MarshalId,
    /// Context the row showed when the action was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextRef>,
    /// Acting party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorRef>,
}

impl ChecklistActionPayload {
    /// Create payload acted by the owner
    #[must_use]
    pub fn new(event_id: impl Into<EventId>, item_id: impl Into<ItemId>, owner: impl Into<MarshalId>) -> Self {
        Self {
            event_id: event_id.into(),
            item_id: item_id.into(),
            owner_marshal_id: owner.into(),
            context: None,
            actor: None,
        }
    }

    /// With context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: ContextRef) -> Self {
        self.context = Some(context);
        self
    }

    /// With actor
    #[inline]
    #[must_use]
    pub fn acting_as(mut self, actor: ActorRef) -> Self {
        self.actor = Some(actor);
        self
    }
}

impl From<ChecklistActionPayload> for CompletionRequest {
    fn from(payload: ChecklistActionPayload) -> Self {
        Self {
            event_id: payload.event_id,
            item_id: payload.item_id,
            owner_marshal_id: payload.owner_marshal_id,
            context: payload.context,
            actor: payload.actor,
        }
    }
}

/// Payload of check-in actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPayload {
    /// Event
    pub event_id: EventId,
    /// Marshal being checked in
    pub marshal_id: MarshalId,
    /// Checkpoint
    pub checkpoint_id: CheckpointId,
    /// Target state
    pub checked_in: bool,
    /// Acting party, the marshal when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorRef>,
}

/// Typed payload of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPayload {
    /// Complete or uncomplete
    Checklist(ChecklistActionPayload),
    /// Check-in toggle
    CheckIn(CheckInPayload),
}

/// Queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    /// Sortable id, generated on the device
    pub id: Ulid,
    /// Action kind
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Opaque payload
    pub payload: Value,
    /// Replay status
    #[serde(default)]
    pub status: ActionStatus,
    /// Send attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// When the last attempt was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last transient error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Enqueue time
    pub created_at: DateTime<Utc>,
}

impl OfflineAction {
    /// Create pending action with raw payload
    #[must_use]
    pub fn new(action_type: ActionType, payload: Value) -> Self {
        Self {
            id: Ulid::new(),
            action_type,
            payload,
            status: ActionStatus::Pending,
            attempts: 0,
            last_attempt: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Complete action
    ///
    /// # Errors
    /// Payload serialization failure
    pub fn complete(payload: &ChecklistActionPayload) -> Result<Self, QueueError> {
        Ok(Self::new(ActionType::ChecklistComplete, serde_json::to_value(payload)?))
    }

    /// Uncomplete action
    ///
    /// # Errors
    /// Payload serialization failure
    pub fn uncomplete(payload: &ChecklistActionPayload) -> Result<Self, QueueError> {
        Ok(Self::new(ActionType::ChecklistUncomplete, serde_json::to_value(payload)?))
    }

    /// Check-in action, `AdminCheckIn` when someone else acts
    ///
    /// # Errors
    /// Payload serialization failure
    pub fn check_in(payload: &CheckInPayload) -> Result<Self, QueueError> {
        let action_type = match &payload.actor {
            Some(actor) if actor.id != payload.marshal_id.as_str() => ActionType::AdminCheckIn,
            _ => ActionType::CheckIn,
        };
        Ok(Self::new(action_type, serde_json::to_value(payload)?))
    }

    /// Typed payload
    ///
    /// # Errors
    /// [`QueueError::Serde`] if the payload does not fit the action type
    pub fn decode(&self) -> Result<ActionPayload, QueueError> {
        if self.action_type.is_checklist() {
            Ok(ActionPayload::Checklist(serde_json::from_value(self.payload.clone())?))
        } else {
            Ok(ActionPayload::CheckIn(serde_json::from_value(self.payload.clone())?))
        }
    }

    /// Whether the sync engine still replays it
    #[inline]
    #[must_use]
    pub fn is_replayable(&self) -> bool {
        self.status != ActionStatus::Failed
    }
}

/// Action dropped after a 4xx, kept for the pending-actions view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermanentFailure {
    /// The dropped action
    pub action: OfflineAction,
    /// Status the server answered
    pub status: u16,
    /// Error text
    pub reason: String,
    /// When it was dropped
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_form_uses_type_and_snake_case() {
        let action = OfflineAction::complete(&ChecklistActionPayload::new("E", "X", "M")).unwrap();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "checklist_complete");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["payload"]["ownerMarshalId"], "M");
    }

    #[test]
    fn decode_recovers_payload() {
        let payload = CheckInPayload {
            event_id: "E".into(),
            marshal_id: "M".into(),
            checkpoint_id: "C1".into(),
            checked_in: true,
            actor: None,
        };
        let action = OfflineAction::check_in(&payload).unwrap();
        assert_eq!(action.action_type, ActionType::CheckIn);
        assert_eq!(action.decode().unwrap(), ActionPayload::CheckIn(payload));
    }

    #[test]
    fn check_in_for_someone_else_is_admin() {
        let payload = CheckInPayload {
            event_id: "E".into(),
            marshal_id: "M".into(),
            checkpoint_id: "C1".into(),
            checked_in: false,
            actor: Some(ActorRef::area_lead("L")),
        };
        let action = OfflineAction::check_in(&payload).unwrap();
        assert_eq!(action.action_type, ActionType::AdminCheckIn);
    }

    #[test]
    fn mismatched_payload_fails_to_decode() {
        let action = OfflineAction::new(ActionType::ChecklistComplete, serde_json::json!({"x": 1}));
        assert!(matches!(action.decode(), Err(QueueError::Serde(_))));
    }

    #[test]
    fn ids_sort_by_creation() {
        let first = OfflineAction::new(ActionType::CheckIn, Value::Null);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = OfflineAction::new(ActionType::CheckIn, Value::Null);
        assert!(first.id < second.id);
    }
}
