//! Task Instance Expander
//!
//! Turns item definitions plus active completions into what one viewer sees:
//! - one instance per item the viewer matches, carrying its completion state
//! - for area leads, one shadow instance per marshal in their areas for every
//!   item that marshal matches through a shared scope whose context lies in
//!   one of the lead's areas
//!
//! Expansion is a pure function of its inputs, `now` included.

use crate::completion::{Actor, ChecklistCompletion};
use crate::context::{resolve_context, CompletionContext, CompletionKey};
use crate::item::ChecklistItem;
use chrono::{DateTime, Utc};
use marshal_scope::{select, EventRoster, ItemId, MarshalId, Scope, ScopeMatch, Viewer};
use serde::Serialize;
use std::collections::HashMap;

/// One row of a viewer's task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    /// Item
    pub item_id: ItemId,
    /// Task text
    pub text: String,
    /// Sort key
    pub display_order: i32,
    /// Must be completed
    pub is_required: bool,
    /// Scope of the winning configuration
    pub matched_scope: Scope,
    /// Context the row reads and writes
    pub context: CompletionContext,
    /// Whether an active completion exists for the context
    pub is_completed: bool,
    /// Whether the viewer may toggle this row now
    pub can_be_completed_by_me: bool,
    /// Who completed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<Actor>,
    /// When
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_complete_by: Option<DateTime<Utc>>,
    /// Deadline passed while not completed
    pub is_overdue: bool,
    /// Completing also checks in
    pub links_to_check_in: bool,
    /// Marshal a lead's shadow row stands for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_for: Option<MarshalId>,
}

impl TaskInstance {
    /// Whether this is an area-lead shadow row
    #[inline]
    #[must_use]
    pub fn is_shadow(&self) -> bool {
        self.shadow_for.is_some()
    }

    /// Owner whose list this row belongs to
    #[must_use]
    pub fn owner<'a>(&'a self, viewer: &'a MarshalId) -> &'a MarshalId {
        self.shadow_for.as_ref().unwrap_or(viewer)
    }
}

/// Active completions by key
#[derive(Debug, Default)]
pub struct CompletionIndex {
    by_key: HashMap<CompletionKey, ChecklistCompletion>,
}

impl CompletionIndex {
    /// Index the active records, ignoring soft-deleted ones
    #[must_use]
    pub fn new(completions: impl IntoIterator<Item = ChecklistCompletion>) -> Self {
        let by_key = completions
            .into_iter()
            .filter(ChecklistCompletion::is_active)
            .map(|c| (c.key(), c))
            .collect();
        Self { by_key }
    }

    /// Active completion of a context, if any
    #[must_use]
    pub fn get(&self, item_id: &ItemId, context: &CompletionContext) -> Option<&ChecklistCompletion> {
        self.by_key.get(&context.key(item_id))
    }

    /// Number of active completions
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether there are none
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Winning configuration and completion context of an item for a viewer
#[must_use]
pub fn resolve_item(item: &ChecklistItem, viewer: &Viewer) -> Option<(ScopeMatch, CompletionContext)> {
    let selected = select(&item.scope_configurations, viewer)?;
    let context = resolve_context(&selected, &viewer.marshal_id, item.links_to_check_in);
    Some((selected, context))
}

/// Whether `actor` may toggle an item resolved to `context` through `selected`
///
/// Lead-only scopes need a lead of the context's area.
#[must_use]
pub fn may_complete(roster: &EventRoster, selected: &ScopeMatch, context: &CompletionContext, actor: &Viewer) -> bool {
    !selected.scope().is_lead_only() || context.within_led_areas(roster, actor)
}

/// Expand items into a viewer's task list
///
/// Rows are ordered by display order, then item id, the viewer's own row
/// before shadow rows, shadow rows by marshal id.
#[must_use]
pub fn expand(
    items: &[ChecklistItem],
    completions: &CompletionIndex,
    roster: &EventRoster,
    viewer: &Viewer,
    now: DateTime<Utc>,
) -> Vec<TaskInstance> {
    let shadow_owners: Vec<Viewer> = if viewer.is_area_lead() {
        roster
            .marshals_in_areas(&viewer.lead_area_ids)
            .into_iter()
            .filter(|m| m != &viewer.marshal_id)
            .filter_map(|m| roster.viewer(&m))
            .collect()
    } else {
        Vec::new()
    };

    let mut tasks = Vec::new();
    for item in items {
        let own = resolve_item(item, viewer);
        if let Some((selected, context)) = &own {
            let can_complete = item.window_open(now) && may_complete(roster, selected, context, viewer);
            tasks.push(instance(item, selected, context.clone(), completions, now, can_complete, None));
        }
        let own_context = own.map(|(_, context)| context);

        for owner in &shadow_owners {
            let Some((selected, context)) = resolve_item(item, owner) else {
                continue;
            };
            if !selected.scope().is_shared()
                || !context.within_led_areas(roster, viewer)
                || own_context.as_ref() == Some(&context)
            {
                continue;
            }
            let can_complete = item.window_open(now) && may_complete(roster, &selected, &context, viewer);
            let shadow_for = Some(owner.marshal_id.clone());
            tasks.push(instance(item, &selected, context, completions, now, can_complete, shadow_for));
        }
    }

    tasks.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.item_id.cmp(&b.item_id))
            .then_with(|| a.shadow_for.cmp(&b.shadow_for))
    });

    tracing::debug!(
        marshal = %viewer.marshal_id,
        items = items.len(),
        tasks = tasks.len(),
        shadows = tasks.iter().filter(|t| t.is_shadow()).count(),
        "expanded task list"
    );
    tasks
}

fn instance(
    item: &ChecklistItem,
    selected: &ScopeMatch,
    context: CompletionContext,
    completions: &CompletionIndex,
    now: DateTime<Utc>,
    can_be_completed_by_me: bool,
    shadow_for: Option<MarshalId>,
) -> TaskInstance {
    let completion = completions.get(&item.id, &context);
    let is_completed = completion.is_some();

    TaskInstance {
        item_id: item.id.clone(),
        text: item.text.clone(),
        display_order: item.display_order,
        is_required: item.is_required,
        matched_scope: selected.scope(),
        context,
        is_completed,
        can_be_completed_by_me,
        completed_by: completion.map(|c| c.actor.clone()),
        completed_at: completion.map(|c| c.completed_at),
        must_complete_by: item.must_complete_by,
        is_overdue: !is_completed && item.deadline_passed(now),
        links_to_check_in: item.links_to_check_in,
        shadow_for,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ActorType;
    use chrono::Duration;
    use marshal_scope::{AreaLead, Assignment, Checkpoint, EventId, Marshal, ScopeConfiguration};
    use pretty_assertions::assert_eq;

    fn roster() -> EventRoster {
        let mut roster = EventRoster::new(EventId::new("E"));
        for (id, areas) in [("C1", vec!["A1"]), ("C2", vec!["A1"]), ("C3", vec!["A2"])] {
            roster.checkpoints.push(Checkpoint {
                id: id.into(),
                name: id.to_string(),
                area_ids: areas.into_iter().map(Into::into).collect(),
            });
        }
        for (marshal, checkpoint) in [("M1", "C1"), ("M2", "C1"), ("M3", "C2"), ("M4", "C3")] {
            roster.marshals.push(Marshal {
                id: marshal.into(),
                name: marshal.to_string(),
            });
            roster.assignments.push(Assignment {
                marshal_id: marshal.into(),
                checkpoint_id: checkpoint.into(),
            });
        }
        roster.marshals.push(Marshal {
            id: "L".into(),
            name: "Lead".into(),
        });
        roster.area_leads.push(AreaLead {
            marshal_id: "L".into(),
            area_id: "A1".into(),
        });
        roster
    }

    fn cfg(scope: Scope, ids: &[&str]) -> ScopeConfiguration {
        ScopeConfiguration::for_ids(scope, ids.iter().copied()).unwrap()
    }

    fn completed(item: &str, context: &CompletionContext, by: &str) -> ChecklistCompletion {
        ChecklistCompletion::new(
            "E".into(),
            item.into(),
            context,
            Actor::new(ActorType::Marshal, by, by),
            Utc::now(),
        )
    }

    #[test]
    fn shared_completion_shows_for_every_member() {
        let roster = roster();
        let item = ChecklistItem::new("X", "E", "Radio check").with_scope(cfg(Scope::OnePerCheckpoint, &["C1"]));
        let context = CompletionContext::SharedCheckpoint {
            checkpoint_id: "C1".into(),
        };
        let index = CompletionIndex::new([completed("X", &context, "M1")]);

        for marshal in ["M1", "M2"] {
            let viewer = roster.viewer(&marshal.into()).unwrap();
            let tasks = expand(std::slice::from_ref(&item), &index, &roster, &viewer, Utc::now());
            assert_eq!(tasks.len(), 1);
            assert!(tasks[0].is_completed);
            assert_eq!(tasks[0].completed_by.as_ref().unwrap().actor_id, "M1");
        }
    }

    #[test]
    fn personal_completion_is_isolated() {
        let roster = roster();
        let item = ChecklistItem::new("P", "E", "Sign in").with_scope(cfg(Scope::EveryoneAtCheckpoints, &["C1"]));
        let context = CompletionContext::Checkpoint {
            checkpoint_id: "C1".into(),
            owner: "M1".into(),
        };
        let index = CompletionIndex::new([completed("P", &context, "M1")]);

        let m1 = expand(std::slice::from_ref(&item), &index, &roster, &roster.viewer(&"M1".into()).unwrap(), Utc::now());
        let m2 = expand(std::slice::from_ref(&item), &index, &roster, &roster.viewer(&"M2".into()).unwrap(), Utc::now());
        assert!(m1[0].is_completed);
        assert!(!m2[0].is_completed);
    }

    #[test]
    fn lead_gets_shadow_rows_for_shared_items() {
        let roster = roster();
        let shared = ChecklistItem::new("S", "E", "Setup").with_scope(cfg(Scope::OnePerCheckpoint, &["C1", "C2", "C3"]));
        let personal = ChecklistItem::new("P", "E", "Badge").with_scope(cfg(Scope::EveryoneAtCheckpoints, &["C1"]));
        let lead = roster.viewer(&"L".into()).unwrap();

        let tasks = expand(&[shared, personal], &CompletionIndex::default(), &roster, &lead, Utc::now());

        let shadows: Vec<&str> = tasks
            .iter()
            .filter_map(|t| t.shadow_for.as_ref().map(MarshalId::as_str))
            .collect();
        assert_eq!(shadows, vec!["M1", "M2", "M3"]);
        assert!(tasks.iter().all(|t| t.item_id.as_str() == "S"));
        assert!(tasks.iter().all(|t| t.can_be_completed_by_me));
    }

    #[test]
    fn shadow_rows_stay_inside_led_areas() {
        let mut roster = roster();
        roster.assignments.push(Assignment {
            marshal_id: "M2".into(),
            checkpoint_id: "C3".into(),
        });
        let item = ChecklistItem::new("F", "E", "Finish line").with_scope(cfg(Scope::OnePerCheckpoint, &["C3"]));
        let lead = roster.viewer(&"L".into()).unwrap();

        let tasks = expand(&[item], &CompletionIndex::default(), &roster, &lead, Utc::now());
        assert!(tasks.is_empty());
    }

    #[test]
    fn lead_does_not_shadow_its_own_shared_row() {
        let roster = roster();
        let item = ChecklistItem::new("W", "E", "Sweep").with_scope(cfg(Scope::OnePerArea, &["A1"]));
        let lead = roster.viewer(&"L".into()).unwrap();

        let tasks = expand(&[item], &CompletionIndex::default(), &roster, &lead, Utc::now());
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].is_shadow());
        assert_eq!(tasks[0].context, CompletionContext::SharedArea { area_id: "A1".into() });
    }

    #[test]
    fn one_lead_per_area_is_visible_but_locked_for_plain_marshals() {
        let roster = roster();
        let item = ChecklistItem::new("B", "E", "Area briefing").with_scope(cfg(Scope::OneLeadPerArea, &["A1"]));

        let marshal = roster.viewer(&"M1".into()).unwrap();
        let tasks = expand(std::slice::from_ref(&item), &CompletionIndex::default(), &roster, &marshal, Utc::now());
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].can_be_completed_by_me);

        let lead = roster.viewer(&"L".into()).unwrap();
        let tasks = expand(&[item], &CompletionIndex::default(), &roster, &lead, Utc::now());
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].can_be_completed_by_me);
    }

    #[test]
    fn window_gates_completion_but_not_visibility() {
        let roster = roster();
        let now = Utc::now();
        let item = ChecklistItem::new("W", "E", "Later")
            .with_scope(cfg(Scope::EveryoneInAreas, &["A1"]))
            .with_window(Some(now + Duration::hours(1)), None);
        let viewer = roster.viewer(&"M1".into()).unwrap();

        let tasks = expand(&[item], &CompletionIndex::default(), &roster, &viewer, now);
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].can_be_completed_by_me);
    }

    #[test]
    fn overdue_only_when_not_completed() {
        let roster = roster();
        let now = Utc::now();
        let item = ChecklistItem::new("D", "E", "Due")
            .with_scope(cfg(Scope::SpecificPeople, &["M1"]))
            .due_by(now - Duration::minutes(1));
        let viewer = roster.viewer(&"M1".into()).unwrap();

        let open = expand(std::slice::from_ref(&item), &CompletionIndex::default(), &roster, &viewer, now);
        assert!(open[0].is_overdue);

        let context = CompletionContext::Personal {
            marshal_id: "M1".into(),
        };
        let done = expand(&[item], &CompletionIndex::new([completed("D", &context, "M1")]), &roster, &viewer, now);
        assert!(!done[0].is_overdue);
    }

    #[test]
    fn ordered_by_display_order_then_id() {
        let roster = roster();
        let all = cfg(Scope::EveryoneInAreas, &["A1"]);
        let items = vec![
            ChecklistItem::new("b", "E", "t").with_scope(all.clone()).with_order(1),
            ChecklistItem::new("a", "E", "t").with_scope(all.clone()).with_order(1),
            ChecklistItem::new("z", "E", "t").with_scope(all).with_order(0),
        ];
        let viewer = roster.viewer(&"M1".into()).unwrap();
        let ids: Vec<String> = expand(&items, &CompletionIndex::default(), &roster, &viewer, Utc::now())
            .into_iter()
            .map(|t| t.item_id.to_string())
            .collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }

    #[test]
    fn unmatched_items_are_omitted() {
        let roster = roster();
        let item = ChecklistItem::new("N", "E", "t").with_scope(cfg(Scope::EveryAreaLead, &["A1"]));
        let viewer = roster.viewer(&"M4".into()).unwrap();
        assert!(expand(&[item], &CompletionIndex::default(), &roster, &viewer, Utc::now()).is_empty());
    }
}
