//! Optimistic overlay
//!
//! The UI never waits for the network: queued checklist actions are replayed
//! locally over the last fetched task list. Actions apply in queue order so
//! a queued uncomplete cancels an earlier queued complete. Failed actions are
//! not applied; the UI surfaces them separately.

use crate::action::{ActionPayload, ActionType, ChecklistActionPayload, OfflineAction};
use chrono::{DateTime, Utc};
use marshal_checklist::{Actor, ActorType, TaskInstance};
use marshal_scope::MarshalId;
use serde::Serialize;
use ulid::Ulid;

/// Task row with its unconfirmed local change, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaidTask {
    /// Row as it should be shown
    #[serde(flatten)]
    pub task: TaskInstance,
    /// Latest queued action that changed this row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<Ulid>,
}

impl OverlaidTask {
    /// Whether the row shows an unconfirmed change
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending_action.is_some()
    }
}

/// Applies queued actions over a viewer's task list
#[derive(Debug, Clone)]
pub struct OptimisticOverlay {
    viewer: MarshalId,
}

impl OptimisticOverlay {
    /// Create overlay for a viewer
    #[inline]
    #[must_use]
    pub fn new(viewer: impl Into<MarshalId>) -> Self {
        Self { viewer: viewer.into() }
    }

    /// Overlay replayable checklist actions on fetched rows
    #[must_use]
    pub fn apply(&self, tasks: Vec<TaskInstance>, actions: &[OfflineAction], now: DateTime<Utc>) -> Vec<OverlaidTask> {
        let mut rows: Vec<OverlaidTask> = tasks
            .into_iter()
            .map(|task| OverlaidTask {
                task,
                pending_action: None,
            })
            .collect();

        for action in actions.iter().filter(|a| a.is_replayable() && a.action_type.is_checklist()) {
            let Ok(ActionPayload::Checklist(payload)) = action.decode() else {
                tracing::debug!(id = %action.id, "undecodable action skipped by overlay");
                continue;
            };
            let completed = action.action_type == ActionType::ChecklistComplete;
            let actor = payload.actor.as_ref().map_or_else(
                || Actor::new(ActorType::Marshal, payload.owner_marshal_id.as_str(), payload.owner_marshal_id.as_str()),
                |a| Actor::new(a.actor_type, a.id.as_str(), a.name.clone().unwrap_or_else(|| a.id.clone())),
            );

            for row in rows.iter_mut().filter(|row| self.affects(row, &payload)) {
                let task = &mut row.task;
                task.is_completed = completed;
                if completed {
                    task.completed_by = Some(actor.clone());
                    task.completed_at = Some(action.created_at);
                } else {
                    task.completed_by = None;
                    task.completed_at = None;
                }
                task.is_overdue = !completed && task.must_complete_by.is_some_and(|deadline| now > deadline);
                row.pending_action = Some(action.id);
            }
        }

        rows
    }

    fn affects(&self, row: &OverlaidTask, payload: &ChecklistActionPayload) -> bool {
        let task = &row.task;
        if task.item_id != payload.item_id {
            return false;
        }
        let same_owner = task.owner(&self.viewer) == &payload.owner_marshal_id;
        match &payload.context {
            Some(context) => task.context.agrees_with(context) && (same_owner || task.context.is_shared()),
            None => same_owner,
        }
    }
}
