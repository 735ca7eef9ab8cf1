//! Checklist engine
//!
//! Entry point for callers. Reads go through the matcher and expander; writes
//! validate the request, resolve the completion context, then perform a
//! conditional read-modify-write on the single record for that context.
//!
//! Request checks run in a fixed order so callers get the most useful error:
//! 1. item exists
//! 2. owner is on the roster
//! 3. owner matches the item
//! 4. an explicit context agrees with the resolved one
//! 5. actor may act for the owner, and lead-only scopes are toggled by a lead
//!    of the context's area
//! 6. the item window is open

use crate::completion::{validate_transition, Actor, ActorRef, ActorType, ChecklistCompletion, CompletionState};
use crate::config::{CheckInLinkPolicy, EngineConfig};
use crate::context::{CompletionContext, ContextRef};
use crate::error::{ChecklistError, StoreError};
use crate::expand::{expand, may_complete, resolve_item, CompletionIndex, TaskInstance};
use crate::item::ChecklistItem;
use crate::store::{CheckInLedger, CompletionStore, EventDirectory};
use chrono::{DateTime, Utc};
use marshal_scope::{filter_visible, CheckpointId, Contact, EventId, EventRoster, ItemId, MarshalId, Note, Viewer, Visible};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Complete or uncomplete request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Event
    pub event_id: EventId,
    /// Item
    pub item_id: ItemId,
    /// Marshal whose list the task is on
    pub owner_marshal_id: MarshalId,
    /// Context the caller believes it is acting on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextRef>,
    /// Acting party, the owner when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorRef>,
}

impl CompletionRequest {
    /// Create request acted by the owner
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

    /// With explicit context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: ContextRef) -> Self {
        self.context = Some(context);
        self
    }

    /// With acting party
    #[inline]
    #[must_use]
    pub fn acting_as(mut self, actor: ActorRef) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// What a write did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionOutcome {
    /// Record created or resurrected
    Completed,
    /// Record soft-deleted
    Uncompleted,
    /// Already in the requested state
    Unchanged,
}

/// Why a linked check-in did not fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInSkip {
    /// Policy is `Never`
    Disabled,
    /// No checkpoint could be determined
    NoCheckpoint,
    /// Owner is not assigned to the target and policy is `AssignedOnly`
    NotAssigned,
    /// Target checkpoint is not on the roster
    UnknownCheckpoint,
}

/// Linked check-in side effect of a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LinkedCheckIn {
    /// Check-in state set
    #[serde(rename_all = "camelCase")]
    Applied {
        /// Target checkpoint
        checkpoint_id: CheckpointId,
        /// State written
        checked_in: bool,
        /// Whether it differed before
        changed: bool,
    },
    /// Not performed
    #[serde(rename_all = "camelCase")]
    Skipped {
        /// Target checkpoint, if one was determined
        checkpoint_id: Option<CheckpointId>,
        /// Why
        reason: CheckInSkip,
    },
}

/// Result of a complete or uncomplete call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    /// What happened
    pub outcome: CompletionOutcome,
    /// Context written
    pub context: CompletionContext,
    /// Record after the write, `None` if none exists
    pub record: Option<ChecklistCompletion>,
    /// Linked check-in, only for linked items
    pub check_in: Option<LinkedCheckIn>,
}

/// Result of a plain check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    /// Marshal
    pub marshal_id: MarshalId,
    /// Checkpoint
    pub checkpoint_id: CheckpointId,
    /// State written
    pub checked_in: bool,
    /// Whether it differed before
    pub changed: bool,
}

/// Validated write request
struct Prepared {
    roster: EventRoster,
    item: ChecklistItem,
    owner: Viewer,
    context: CompletionContext,
    actor: Actor,
}

/// Scope resolution and completion engine over pluggable stores
pub struct ChecklistEngine {
    directory: Arc<dyn EventDirectory>,
    completions: Arc<dyn CompletionStore>,
    check_ins: Arc<dyn CheckInLedger>,
    config: EngineConfig,
}

impl ChecklistEngine {
    /// Create new engine with default config
    pub fn new(
        directory: Arc<dyn EventDirectory>,
        completions: Arc<dyn CompletionStore>,
        check_ins: Arc<dyn CheckInLedger>,
    ) -> Self {
        Self {
            directory,
            completions,
            check_ins,
            config: EngineConfig::default(),
        }
    }

    /// With config
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Active config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Task list of a marshal, evaluated now
    ///
    /// # Errors
    /// [`ChecklistError::UnknownMarshal`] or a store error
    pub async fn tasks_for_viewer(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
    ) -> Result<Vec<TaskInstance>, ChecklistError> {
        self.tasks_for_viewer_at(event_id, marshal_id, Utc::now()).await
    }

    /// Task list of a marshal, evaluated at `now`
    ///
    /// # Errors
    /// [`ChecklistError::UnknownMarshal`] or a store error
    pub async fn tasks_for_viewer_at(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, ChecklistError> {
        let roster = self.directory.roster(event_id).await?;
        let viewer = viewer_of(&roster, marshal_id)?;
        let items = self.directory.checklist_items(event_id).await?;
        let index = CompletionIndex::new(self.completions.active_completions(event_id).await?);

        Ok(expand(&items, &index, &roster, &viewer, now))
    }

    /// Notes visible to a marshal
    ///
    /// # Errors
    /// [`ChecklistError::UnknownMarshal`] or a store error
    pub async fn visible_notes(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
    ) -> Result<Vec<Visible<Note>>, ChecklistError> {
        let roster = self.directory.roster(event_id).await?;
        let viewer = viewer_of(&roster, marshal_id)?;
        let notes = self.directory.notes(event_id).await?;
        Ok(filter_visible(&notes, &viewer))
    }

    /// Contacts visible to a marshal
    ///
    /// # Errors
    /// [`ChecklistError::UnknownMarshal`] or a store error
    pub async fn visible_contacts(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
    ) -> Result<Vec<Visible<Contact>>, ChecklistError> {
        let roster = self.directory.roster(event_id).await?;
        let viewer = viewer_of(&roster, marshal_id)?;
        let contacts = self.directory.contacts(event_id).await?;
        Ok(filter_visible(&contacts, &viewer))
    }

    /// Complete a task now
    ///
    /// # Errors
    /// A permanent request error, or a transient store/concurrency error
    pub async fn complete_task(&self, request: &CompletionRequest) -> Result<CompletionResult, ChecklistError> {
        self.transition(request, CompletionState::Completed, Utc::now()).await
    }

    /// Complete a task at `now`
    ///
    /// # Errors
    /// See [`ChecklistEngine::complete_task`]
    pub async fn complete_task_at(
        &self,
        request: &CompletionRequest,
        now: DateTime<Utc>,
    ) -> Result<CompletionResult, ChecklistError> {
        self.transition(request, CompletionState::Completed, now).await
    }

    /// Uncomplete a task now
    ///
    /// # Errors
    /// See [`ChecklistEngine::complete_task`]
    pub async fn uncomplete_task(&self, request: &CompletionRequest) -> Result<CompletionResult, ChecklistError> {
        self.transition(request, CompletionState::Uncompleted, Utc::now()).await
    }

    /// Uncomplete a task at `now`
    ///
    /// # Errors
    /// See [`ChecklistEngine::complete_task`]
    pub async fn uncomplete_task_at(
        &self,
        request: &CompletionRequest,
        now: DateTime<Utc>,
    ) -> Result<CompletionResult, ChecklistError> {
        self.transition(request, CompletionState::Uncompleted, now).await
    }

    /// Set a marshal's check-in state at a checkpoint
    ///
    /// Never completes linked tasks.
    ///
    /// # Errors
    /// Unknown marshal or checkpoint, an actor without rights over the
    /// marshal, or a store error
    pub async fn check_in(
        &self,
        event_id: &EventId,
        marshal_id: &MarshalId,
        checkpoint_id: &CheckpointId,
        checked_in: bool,
        actor: Option<&ActorRef>,
    ) -> Result<CheckInOutcome, ChecklistError> {
        let roster = self.directory.roster(event_id).await?;
        viewer_of(&roster, marshal_id)?;
        let Some(checkpoint) = roster.checkpoint(checkpoint_id) else {
            return Err(ChecklistError::UnknownCheckpoint(checkpoint_id.to_string()));
        };
        if let Some(actor) = actor {
            let lead_id = MarshalId::new(actor.id.as_str());
            let leads_checkpoint = roster.leads_over(&lead_id, marshal_id)
                && roster
                    .viewer(&lead_id)
                    .is_some_and(|lead| checkpoint.area_ids.iter().any(|a| lead.leads(a)));
            let allowed = actor.actor_type == ActorType::Admin || actor.id == marshal_id.as_str() || leads_checkpoint;
            if !allowed {
                return Err(ChecklistError::NotAuthorized {
                    actor: actor.id.clone(),
                    owner: marshal_id.clone(),
                });
            }
        }

        let changed = self
            .check_ins
            .set_checked_in(event_id, marshal_id, checkpoint_id, checked_in)
            .await?;
        tracing::info!(
            event = %event_id,
            marshal = %marshal_id,
            checkpoint = %checkpoint_id,
            checked_in,
            changed,
            "check-in set"
        );

        Ok(CheckInOutcome {
            marshal_id: marshal_id.clone(),
            checkpoint_id: checkpoint_id.clone(),
            checked_in,
            changed,
        })
    }

    /// Drop every completion of an item, for when the item is deleted
    ///
    /// # Errors
    /// Store error
    pub async fn purge_item(&self, event_id: &EventId, item_id: &ItemId) -> Result<usize, ChecklistError> {
        let removed = self.completions.purge_item(event_id, item_id).await?;
        tracing::info!(event = %event_id, item = %item_id, removed, "purged item completions");
        Ok(removed)
    }

    async fn prepare(&self, request: &CompletionRequest, now: DateTime<Utc>) -> Result<Prepared, ChecklistError> {
        let roster = self.directory.roster(&request.event_id).await?;
        let item = self
            .directory
            .checklist_item(&request.event_id, &request.item_id)
            .await?
            .ok_or_else(|| ChecklistError::ItemNotFound(request.item_id.clone()))?;
        let owner = viewer_of(&roster, &request.owner_marshal_id)?;

        let (selected, context) = resolve_item(&item, &owner).ok_or_else(|| ChecklistError::NotEligible {
            item_id: item.id.clone(),
            marshal_id: owner.marshal_id.clone(),
        })?;

        if let Some(requested) = &request.context {
            if !context.agrees_with(requested) {
                return Err(ChecklistError::ContextMismatch {
                    requested: requested.to_string(),
                    resolved: context.to_string(),
                });
            }
        }

        let actor = authorize(&roster, &item, &owner, &context, request.actor.as_ref())?;
        if actor.actor_type != ActorType::Admin {
            let acting = roster.viewer(&MarshalId::new(actor.actor_id.as_str()));
            if !acting.is_some_and(|acting| may_complete(&roster, &selected, &context, &acting)) {
                return Err(ChecklistError::NotAuthorized {
                    actor: actor.actor_id,
                    owner: owner.marshal_id.clone(),
                });
            }
        }

        if !item.window_open(now) {
            return Err(ChecklistError::OutsideWindow(item.id.clone()));
        }

        Ok(Prepared {
            roster,
            item,
            owner,
            context,
            actor,
        })
    }

    async fn transition(
        &self,
        request: &CompletionRequest,
        target: CompletionState,
        now: DateTime<Utc>,
    ) -> Result<CompletionResult, ChecklistError> {
        let prepared = self.prepare(request, now).await?;
        let (outcome, record) = self.write(&request.event_id, &prepared, target, now).await?;

        let check_in = if prepared.item.links_to_check_in {
            Some(
                self.linked_check_in(&request.event_id, &prepared, target.is_completed())
                    .await?,
            )
        } else {
            None
        };

        Ok(CompletionResult {
            outcome,
            context: prepared.context,
            record,
            check_in,
        })
    }

    async fn write(
        &self,
        event_id: &EventId,
        prepared: &Prepared,
        target: CompletionState,
        now: DateTime<Utc>,
    ) -> Result<(CompletionOutcome, Option<ChecklistCompletion>), ChecklistError> {
        let key = prepared.context.key(&prepared.item.id);
        let mut retries = 0;

        loop {
            let current = self.completions.get(event_id, &key).await?;
            let state = current
                .as_ref()
                .map_or(CompletionState::NotCompleted, |v| v.value.state());

            let converged = state == target
                || (target == CompletionState::Uncompleted && state == CompletionState::NotCompleted);
            if converged {
                tracing::debug!(event = %event_id, key = %key.row_key(), ?state, "already converged");
                return Ok((CompletionOutcome::Unchanged, current.map(|v| v.value)));
            }
            validate_transition(state, target)?;

            let (record, expected) = match current {
                None => (
                    ChecklistCompletion::new(
                        event_id.clone(),
                        prepared.item.id.clone(),
                        &prepared.context,
                        prepared.actor.clone(),
                        now,
                    ),
                    None,
                ),
                Some(stored) => {
                    let mut record = stored.value;
                    if target.is_completed() {
                        record.recomplete(prepared.actor.clone(), now)?;
                    } else {
                        record.uncomplete(prepared.actor.clone(), now)?;
                    }
                    (record, Some(stored.version))
                }
            };

            match self.completions.put(event_id, record.clone(), expected).await {
                Ok(version) => {
                    let outcome = if target.is_completed() {
                        CompletionOutcome::Completed
                    } else {
                        CompletionOutcome::Uncompleted
                    };
                    tracing::info!(
                        event = %event_id,
                        item = %prepared.item.id,
                        context = %prepared.context,
                        actor = %prepared.actor,
                        version,
                        ?outcome,
                        "completion written"
                    );
                    return Ok((outcome, Some(record)));
                }
                Err(StoreError::Conflict { key: row, .. }) => {
                    if retries >= self.config.conflict_retries {
                        tracing::warn!(event = %event_id, key = %row, retries, "completion conflict not resolved");
                        return Err(ChecklistError::ConcurrencyConflict { key: row });
                    }
                    retries += 1;
                    tracing::warn!(event = %event_id, key = %row, retries, "completion conflict, re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn linked_check_in(
        &self,
        event_id: &EventId,
        prepared: &Prepared,
        checked_in: bool,
    ) -> Result<LinkedCheckIn, ChecklistError> {
        let target = prepared
            .item
            .linked_checkpoint_id
            .clone()
            .or_else(|| prepared.context.checkpoint_id().cloned())
            .or_else(|| prepared.owner.checkpoint_ids.first().cloned());

        let skipped = |checkpoint_id: Option<CheckpointId>,
                       reason: CheckInSkip|
         -> Result<LinkedCheckIn, ChecklistError> {
            tracing::debug!(event = %event_id, item = %prepared.item.id, ?reason, "linked check-in skipped");
            Ok(LinkedCheckIn::Skipped { checkpoint_id, reason })
        };

        let Some(checkpoint_id) = target else {
            return skipped(None, CheckInSkip::NoCheckpoint);
        };
        let owner = &prepared.owner.marshal_id;
        match self.config.check_in_link_policy {
            CheckInLinkPolicy::Never => return skipped(Some(checkpoint_id), CheckInSkip::Disabled),
            CheckInLinkPolicy::AssignedOnly if !prepared.roster.is_assigned(owner, &checkpoint_id) => {
                return skipped(Some(checkpoint_id), CheckInSkip::NotAssigned);
            }
            CheckInLinkPolicy::Always if prepared.roster.checkpoint(&checkpoint_id).is_none() => {
                return skipped(Some(checkpoint_id), CheckInSkip::UnknownCheckpoint);
            }
            _ => {}
        }

        let changed = self
            .check_ins
            .set_checked_in(event_id, owner, &checkpoint_id, checked_in)
            .await?;
        tracing::info!(
            event = %event_id,
            marshal = %owner,
            checkpoint = %checkpoint_id,
            checked_in,
            changed,
            "linked check-in applied"
        );
        Ok(LinkedCheckIn::Applied {
            checkpoint_id,
            checked_in,
            changed,
        })
    }
}

fn viewer_of(roster: &EventRoster, marshal_id: &MarshalId) -> Result<Viewer, ChecklistError> {
    roster
        .viewer(marshal_id)
        .ok_or_else(|| ChecklistError::UnknownMarshal(marshal_id.clone()))
}

/// Decide who is recorded as acting, or refuse
fn authorize(
    roster: &EventRoster,
    item: &ChecklistItem,
    owner: &Viewer,
    context: &CompletionContext,
    claimed: Option<&ActorRef>,
) -> Result<Actor, ChecklistError> {
    let Some(claimed) = claimed else {
        let name = roster.marshal_name(&owner.marshal_id);
        return Ok(Actor::new(ActorType::Marshal, owner.marshal_id.as_str(), name));
    };

    if claimed.actor_type == ActorType::Admin {
        let name = claimed.name.clone().unwrap_or_else(|| claimed.id.clone());
        return Ok(Actor::new(ActorType::Admin, claimed.id.as_str(), name));
    }

    let actor_id = MarshalId::new(claimed.id.as_str());
    let name = claimed.name.clone().unwrap_or_else(|| roster.marshal_name(&actor_id));
    if actor_id == owner.marshal_id {
        return Ok(Actor::new(ActorType::Marshal, claimed.id.as_str(), name));
    }
    let covered_by_lead = roster.leads_over(&actor_id, &owner.marshal_id)
        && roster
            .viewer(&actor_id)
            .is_some_and(|lead| context.within_led_areas(roster, &lead));
    if covered_by_lead {
        return Ok(Actor::new(ActorType::AreaLead, claimed.id.as_str(), name));
    }
    if context.is_shared() {
        let peer_context = roster
            .viewer(&actor_id)
            .and_then(|peer| resolve_item(item, &peer))
            .map(|(_, peer_context)| peer_context);
        if peer_context.as_ref() == Some(context) {
            return Ok(Actor::new(ActorType::Marshal, claimed.id.as_str(), name));
        }
    }

    Err(ChecklistError::NotAuthorized {
        actor: claimed.id.clone(),
        owner: owner.marshal_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCheckInLedger, MemoryCompletionStore, MemoryDirectory};
    use crate::snapshot::EventSnapshot;
    use marshal_scope::{Assignment, Checkpoint, Marshal, Scope, ScopeConfiguration};

    fn engine() -> ChecklistEngine {
        let mut roster = EventRoster::new("E".into());
        roster.checkpoints.push(Checkpoint {
            id: "C1".into(),
            name: "Gate".into(),
            area_ids: vec!["A1".into()],
        });
        for id in ["M1", "M2"] {
            roster.marshals.push(Marshal {
                id: id.into(),
                name: id.to_string(),
            });
            roster.assignments.push(Assignment {
                marshal_id: id.into(),
                checkpoint_id: "C1".into(),
            });
        }
        let item = ChecklistItem::new("X", "E", "Radio")
            .with_scope(ScopeConfiguration::for_ids(Scope::OnePerCheckpoint, ["C1"]).unwrap());

        let directory = MemoryDirectory::new();
        directory.insert(EventSnapshot {
            roster,
            checklist_items: vec![item],
            ..EventSnapshot::default()
        });
        ChecklistEngine::new(
            Arc::new(directory),
            Arc::new(MemoryCompletionStore::new()),
            Arc::new(MemoryCheckInLedger::new()),
        )
    }

    #[tokio::test]
    async fn complete_twice_is_unchanged() {
        let engine = engine();
        let request = CompletionRequest::new("E", "X", "M1");
        assert_eq!(engine.complete_task(&request).await.unwrap().outcome, CompletionOutcome::Completed);
        assert_eq!(engine.complete_task(&request).await.unwrap().outcome, CompletionOutcome::Unchanged);
    }

    #[tokio::test]
    async fn uncomplete_never_completed_is_unchanged() {
        let engine = engine();
        let result = engine.uncomplete_task(&CompletionRequest::new("E", "X", "M1")).await.unwrap();
        assert_eq!(result.outcome, CompletionOutcome::Unchanged);
        assert!(result.record.is_none());
    }

    #[tokio::test]
    async fn peer_in_shared_context_may_act() {
        let engine = engine();
        let request = CompletionRequest::new("E", "X", "M1").acting_as(ActorRef::marshal("M2"));
        let result = engine.complete_task(&request).await.unwrap();
        assert_eq!(result.record.unwrap().actor.actor_id, "M2");
    }

    #[tokio::test]
    async fn unknown_item_reported_first() {
        let engine = engine();
        let err = engine
            .complete_task(&CompletionRequest::new("E", "missing", "nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChecklistError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn mismatched_context_rejected() {
        let engine = engine();
        let request = CompletionRequest::new("E", "X", "M1")
            .with_context(ContextRef::new(crate::context::ContextType::Area, "A1"));
        let err = engine.complete_task(&request).await.unwrap_err();
        assert!(matches!(err, ChecklistError::ContextMismatch { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn plain_check_in_rejects_unknown_checkpoint() {
        let engine = engine();
        let err = engine
            .check_in(&"E".into(), &"M1".into(), &"C9".into(), true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChecklistError::UnknownCheckpoint(_)));
    }
}
