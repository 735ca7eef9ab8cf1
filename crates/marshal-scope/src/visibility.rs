//! Note/Contact visibility filter
//!
//! Read-only content uses the same matcher as checklist items, restricted to
//! the scope kinds that do not share completion state. There is no completion
//! step: a viewer either sees the record or does not.

use crate::ids::{ContactId, EventId, NoteId};
use crate::matcher::select_where;
use crate::roster::Viewer;
use crate::scope::{Scope, ScopeConfiguration};
use serde::{Deserialize, Serialize};

/// Content governed by an ordered scope configuration list
pub trait Scoped {
    /// Configurations deciding who sees this record
    fn scope_configurations(&self) -> &[ScopeConfiguration];

    /// Sort key among siblings
    fn display_order(&self) -> i32;

    /// Tie-break key among siblings
    fn sort_id(&self) -> &str;
}

/// Informational note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Note id
    pub id: NoteId,
    /// Owning event
    pub event_id: EventId,
    /// Title
    pub title: String,
    /// Body
    #[serde(default)]
    pub content: String,
    /// Pinned notes sort first in the UI
    #[serde(default)]
    pub is_pinned: bool,
    /// Sort key
    #[serde(default)]
    pub display_order: i32,
    /// Audience
    #[serde(default)]
    pub scope_configurations: Vec<ScopeConfiguration>,
}

impl Scoped for Note {
    fn scope_configurations(&self) -> &[ScopeConfiguration] {
        &self.scope_configurations
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn sort_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Contact record (who to call about what)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Contact id
    pub id: ContactId,
    /// Owning event
    pub event_id: EventId,
    /// Person or service name
    pub name: String,
    /// Role description
    #[serde(default)]
    pub role: String,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Sort key
    #[serde(default)]
    pub display_order: i32,
    /// Audience
    #[serde(default)]
    pub scope_configurations: Vec<ScopeConfiguration>,
}

impl Scoped for Contact {
    fn scope_configurations(&self) -> &[ScopeConfiguration] {
        &self.scope_configurations
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn sort_id(&self) -> &str {
        self.id.as_str()
    }
}

/// A record the viewer can see, with the scope that let them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Visible<T> {
    /// The record
    #[serde(flatten)]
    pub item: T,
    /// Scope of the winning configuration
    pub matched_scope: Scope,
}

/// Filter read-only content down to what a viewer may see
///
/// Completion-sharing scopes are ignored here. Output is ordered by display
/// order, then id.
#[must_use]
pub fn filter_visible<T>(items: &[T], viewer: &Viewer) -> Vec<Visible<T>>
where
    T: Scoped + Clone,
{
    let mut visible: Vec<Visible<T>> = items
        .iter()
        .filter_map(|item| {
            select_where(item.scope_configurations(), viewer, |c| {
                c.scope().applies_to_read_only()
            })
            .map(|selected| Visible {
                item: item.clone(),
                matched_scope: selected.scope(),
            })
        })
        .collect();

    visible.sort_by(|a, b| {
        a.item
            .display_order()
            .cmp(&b.item.display_order())
            .then_with(|| a.item.sort_id().cmp(b.item.sort_id()))
    });

    tracing::debug!(
        marshal = %viewer.marshal_id,
        total = items.len(),
        visible = visible.len(),
        "filtered read-only content"
    );

    visible
}
