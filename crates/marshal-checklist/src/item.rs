//! Checklist item definitions
//!
//! An item is authored once per event and edited in place. Its scope
//! configurations are validated while deserializing; [`ChecklistItem::validate`]
//! checks the remaining cross-field rules.

use crate::error::ChecklistError;
use chrono::{DateTime, Utc};
use marshal_scope::{CheckpointId, EventId, ItemId, ScopeConfiguration};
use serde::{Deserialize, Serialize};

/// One checklist item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    /// Item id
    pub id: ItemId,
    /// Owning event
    pub event_id: EventId,
    /// Task text
    pub text: String,
    /// Sort key
    #[serde(default)]
    pub display_order: i32,
    /// Must be completed
    #[serde(default)]
    pub is_required: bool,
    /// Completable from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_from: Option<DateTime<Utc>>,
    /// Completable until
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_until: Option<DateTime<Utc>>,
    /// Hard deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_complete_by: Option<DateTime<Utc>>,
    /// Completing checks the owner in
    #[serde(default)]
    pub links_to_check_in: bool,
    /// Checkpoint the linked check-in targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_checkpoint_id: Option<CheckpointId>,
    /// Audience and completion rules, in priority order
    #[serde(default)]
    pub scope_configurations: Vec<ScopeConfiguration>,
}

impl ChecklistItem {
    /// Create item with no audience
    #[must_use]
    pub fn new(id: impl Into<ItemId>, event_id: impl Into<EventId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            text: text.into(),
            display_order: 0,
            is_required: false,
            visible_from: None,
            visible_until: None,
            must_complete_by: None,
            links_to_check_in: false,
            linked_checkpoint_id: None,
            scope_configurations: Vec::new(),
        }
    }

    /// With a scope configuration appended
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, config: ScopeConfiguration) -> Self {
        self.scope_configurations.push(config);
        self
    }

    /// With display order
    #[inline]
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }

    /// Mark as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// With visibility window
    #[inline]
    #[must_use]
    pub fn with_window(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.visible_from = from;
        self.visible_until = until;
        self
    }

    /// With deadline
    #[inline]
    #[must_use]
    pub fn due_by(mut self, deadline: DateTime<Utc>) -> Self {
        self.must_complete_by = Some(deadline);
        self
    }

    /// Link completion to a check-in, optionally at a fixed checkpoint
    #[inline]
    #[must_use]
    pub fn linked_to_check_in(mut self, checkpoint: Option<CheckpointId>) -> Self {
        self.links_to_check_in = true;
        self.linked_checkpoint_id = checkpoint;
        self
    }

    /// Whether `now` falls inside the visibility window
    #[must_use]
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        self.visible_from.map_or(true, |from| now >= from)
            && self.visible_until.map_or(true, |until| now <= until)
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.must_complete_by.is_some_and(|deadline| now > deadline)
    }

    /// Whether any configuration shares completion across a group
    #[must_use]
    pub fn has_shared_scope(&self) -> bool {
        self.scope_configurations
            .iter()
            .any(|c| c.scope().is_shared())
    }

    /// Check cross-field rules
    ///
    /// # Errors
    /// [`ChecklistError::InvalidItem`] describing the first violation
    pub fn validate(&self) -> Result<(), ChecklistError> {
        if self.text.trim().is_empty() {
            return Err(ChecklistError::InvalidItem(format!("{}: empty text", self.id)));
        }
        if let (Some(from), Some(until)) = (self.visible_from, self.visible_until) {
            if from > until {
                return Err(ChecklistError::InvalidItem(format!(
                    "{}: visibleFrom is after visibleUntil",
                    self.id
                )));
            }
        }
        if self.linked_checkpoint_id.is_some() && !self.links_to_check_in {
            return Err(ChecklistError::InvalidItem(format!(
                "{}: linkedCheckpointId set without linksToCheckIn",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marshal_scope::Scope;

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let item = ChecklistItem::new("i", "E", "t").with_window(Some(now), Some(now));
        assert!(item.window_open(now));
        assert!(!item.window_open(now + Duration::seconds(1)));
        assert!(!item.window_open(now - Duration::seconds(1)));
    }

    #[test]
    fn deadline_passed_only_after_deadline() {
        let now = Utc::now();
        let item = ChecklistItem::new("i", "E", "t").due_by(now);
        assert!(!item.deadline_passed(now));
        assert!(item.deadline_passed(now + Duration::minutes(1)));
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let now = Utc::now();
        let item = ChecklistItem::new("i", "E", "t")
            .with_window(Some(now), Some(now - Duration::hours(1)));
        assert!(matches!(item.validate(), Err(ChecklistError::InvalidItem(_))));
    }

    #[test]
    fn validate_rejects_orphan_linked_checkpoint() {
        let mut item = ChecklistItem::new("i", "E", "t");
        item.linked_checkpoint_id = Some("C1".into());
        assert!(item.validate().is_err());
        assert!(item.linked_to_check_in(Some("C1".into())).validate().is_ok());
    }

    #[test]
    fn parses_camel_case_json_with_scopes() {
        let json = r#"{
            "id": "X", "eventId": "E1", "text": "Collect radio",
            "displayOrder": 3, "linksToCheckIn": true,
            "scopeConfigurations": [
                {"scope":"OnePerCheckpoint","itemType":"Checkpoint","ids":["C1"]}
            ]
        }"#;
        let item: ChecklistItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.display_order, 3);
        assert!(item.links_to_check_in);
        assert_eq!(item.scope_configurations[0].scope(), Scope::OnePerCheckpoint);
        assert!(item.has_shared_scope());
    }
}
