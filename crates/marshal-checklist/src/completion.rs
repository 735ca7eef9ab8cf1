//! Completion records and their state machine
//!
//! One record exists per [`CompletionKey`] that has ever been completed.
//! Uncompleting soft-deletes it; completing again resurrects it in place,
//! moving the previous cycle into `history` so the audit trail survives.
//!
//! ```text
//! NotCompleted -> Completed <-> Uncompleted
//! ```

use crate::context::{CompletionContext, CompletionKey, ContextType};
use crate::error::ChecklistError;
use chrono::{DateTime, Utc};
use marshal_scope::{EventId, ItemId, MarshalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who performed an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorType {
    /// The marshal themself, or a peer sharing the context
    Marshal,
    /// A lead acting over a marshal in their area
    AreaLead,
    /// Event administrator
    Admin,
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorType::Marshal => "Marshal",
            ActorType::AreaLead => "AreaLead",
            ActorType::Admin => "Admin",
        };
        f.write_str(name)
    }
}

/// Recorded actor identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Actor kind
    pub actor_type: ActorType,
    /// Marshal or admin id
    pub actor_id: String,
    /// Display name at the time of the action
    pub actor_name: String,
}

impl Actor {
    /// Create actor
    #[inline]
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.actor_type, self.actor_id)
    }
}

/// Caller-claimed actor, checked by the engine before it is recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRef {
    /// Claimed kind
    pub actor_type: ActorType,
    /// Marshal or admin id
    pub id: String,
    /// Display name, looked up on the roster when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ActorRef {
    /// A marshal acting
    #[inline]
    #[must_use]
    pub fn marshal(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Marshal,
            id: id.into(),
            name: None,
        }
    }

    /// An area lead acting
    #[inline]
    #[must_use]
    pub fn area_lead(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::AreaLead,
            id: id.into(),
            name: None,
        }
    }

    /// An admin acting
    #[inline]
    #[must_use]
    pub fn admin(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Admin,
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// Logical state of one completion key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionState {
    /// No record yet
    NotCompleted,
    /// Active record
    Completed,
    /// Soft-deleted record
    Uncompleted,
}

impl CompletionState {
    /// States reachable in one step
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [CompletionState] {
        use CompletionState::{Completed, NotCompleted, Uncompleted};
        match self {
            NotCompleted => &[Completed],
            Completed => &[Uncompleted],
            Uncompleted => &[Completed],
        }
    }

    /// Whether the record counts as done
    #[inline]
    #[must_use]
    pub fn is_completed(self) -> bool {
        self == CompletionState::Completed
    }
}

/// Validate a state transition
///
/// # Errors
/// [`ChecklistError::IllegalTransition`] if `to` is not reachable from `from`
pub fn validate_transition(from: CompletionState, to: CompletionState) -> Result<(), ChecklistError> {
    if from.allowed_transitions().contains(&to) {
        Ok(())
    } else {
        Err(ChecklistError::IllegalTransition { from, to })
    }
}

/// A finished completed/uncompleted cycle kept for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCycle {
    /// Who completed
    pub actor: Actor,
    /// When
    pub completed_at: DateTime<Utc>,
    /// When it was undone
    pub uncompleted_at: Option<DateTime<Utc>>,
    /// Who undid it
    pub uncompleted_by: Option<Actor>,
}

/// Durable completion record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistCompletion {
    /// Owning event
    pub event_id: EventId,
    /// Completed item
    pub item_id: ItemId,
    /// Context type
    pub completion_context_type: ContextType,
    /// Context id
    pub completion_context_id: String,
    /// Owner for per-marshal contexts, `None` on shared records
    pub context_owner_marshal_id: Option<MarshalId>,
    /// Who completed the current cycle
    pub actor: Actor,
    /// When the current cycle was completed
    pub completed_at: DateTime<Utc>,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// When the current cycle was undone
    pub uncompleted_at: Option<DateTime<Utc>>,
    /// Who undid the current cycle
    pub uncompleted_by: Option<Actor>,
    /// Earlier cycles, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<CompletionCycle>,
}

impl ChecklistCompletion {
    /// Create an active record
    #[must_use]
    pub fn new(
        event_id: EventId,
        item_id: ItemId,
        context: &CompletionContext,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            item_id,
            completion_context_type: context.context_type(),
            completion_context_id: context.context_id().to_string(),
            context_owner_marshal_id: context.owner().cloned(),
            actor,
            completed_at: at,
            is_deleted: false,
            uncompleted_at: None,
            uncompleted_by: None,
            history: Vec::new(),
        }
    }

    /// Storage key
    #[must_use]
    pub fn key(&self) -> CompletionKey {
        CompletionKey {
            item_id: self.item_id.clone(),
            context_type: self.completion_context_type,
            context_id: self.completion_context_id.clone(),
            owner: self.context_owner_marshal_id.clone(),
        }
    }

    /// Whether the record is the active completion for its key
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> CompletionState {
        if self.is_deleted {
            CompletionState::Uncompleted
        } else {
            CompletionState::Completed
        }
    }

    /// Complete again, archiving the previous cycle
    ///
    /// # Errors
    /// [`ChecklistError::IllegalTransition`] if the record is already active
    pub fn recomplete(&mut self, actor: Actor, at: DateTime<Utc>) -> Result<(), ChecklistError> {
        validate_transition(self.state(), CompletionState::Completed)?;

        let previous = CompletionCycle {
            actor: std::mem::replace(&mut self.actor, actor),
            completed_at: self.completed_at,
            uncompleted_at: self.uncompleted_at.take(),
            uncompleted_by: self.uncompleted_by.take(),
        };
        self.history.push(previous);
        self.completed_at = at;
        self.is_deleted = false;
        Ok(())
    }

    /// Soft-delete, keeping the completing actor for audit
    ///
    /// # Errors
    /// [`ChecklistError::IllegalTransition`] if the record is not active
    pub fn uncomplete(&mut self, actor: Actor, at: DateTime<Utc>) -> Result<(), ChecklistError> {
        validate_transition(self.state(), CompletionState::Uncompleted)?;

        self.is_deleted = true;
        self.uncompleted_at = Some(at);
        self.uncompleted_by = Some(actor);
        Ok(())
    }
}
