//! Completion Context Resolver
//!
//! Turns the winning scope match into the context a completion is recorded
//! against. The variant decides who shares the completion:
//! - `Personal`, `Checkpoint`, `Area`: one record per marshal
//! - `SharedCheckpoint`, `SharedArea`: one record for the whole group

use marshal_scope::{Anchor, AreaId, CheckpointId, EventRoster, ItemId, MarshalId, ScopeMatch, Viewer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of completion context, as stored on a completion record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextType {
    /// Marshal-owned
    Personal,
    /// Checkpoint-scoped
    Checkpoint,
    /// Area-scoped
    Area,
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextType::Personal => "Personal",
            ContextType::Checkpoint => "Checkpoint",
            ContextType::Area => "Area",
        };
        f.write_str(name)
    }
}

/// Where a completion lives and who shares it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompletionContext {
    /// Only this marshal
    Personal {
        /// Owner
        marshal_id: MarshalId,
    },
    /// Per marshal at a checkpoint
    #[serde(rename_all = "camelCase")]
    Checkpoint {
        /// Checkpoint
        checkpoint_id: CheckpointId,
        /// Owner
        owner: MarshalId,
    },
    /// Per marshal in an area
    #[serde(rename_all = "camelCase")]
    Area {
        /// Area
        area_id: AreaId,
        /// Owner
        owner: MarshalId,
    },
    /// One completion for the checkpoint
    #[serde(rename_all = "camelCase")]
    SharedCheckpoint {
        /// Checkpoint
        checkpoint_id: CheckpointId,
    },
    /// One completion for the area
    #[serde(rename_all = "camelCase")]
    SharedArea {
        /// Area
        area_id: AreaId,
    },
}

impl CompletionContext {
    /// Stored context type
    #[must_use]
    pub fn context_type(&self) -> ContextType {
        match self {
            Self::Personal { .. } => ContextType::Personal,
            Self::Checkpoint { .. } | Self::SharedCheckpoint { .. } => ContextType::Checkpoint,
            Self::Area { .. } | Self::SharedArea { .. } => ContextType::Area,
        }
    }

    /// Stored context id
    #[must_use]
    pub fn context_id(&self) -> &str {
        match self {
            Self::Personal { marshal_id } => marshal_id.as_str(),
            Self::Checkpoint { checkpoint_id, .. } | Self::SharedCheckpoint { checkpoint_id } => {
                checkpoint_id.as_str()
            }
            Self::Area { area_id, .. } | Self::SharedArea { area_id } => area_id.as_str(),
        }
    }

    /// Owning marshal, `None` for shared contexts
    #[must_use]
    pub fn owner(&self) -> Option<&MarshalId> {
        match self {
            Self::Personal { marshal_id } => Some(marshal_id),
            Self::Checkpoint { owner, .. } | Self::Area { owner, .. } => Some(owner),
            Self::SharedCheckpoint { .. } | Self::SharedArea { .. } => None,
        }
    }

    /// Whether one completion covers the whole group
    #[inline]
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.owner().is_none()
    }

    /// Checkpoint of the context, if it is checkpoint-scoped
    #[must_use]
    pub fn checkpoint_id(&self) -> Option<&CheckpointId> {
        match self {
            Self::Checkpoint { checkpoint_id, .. } | Self::SharedCheckpoint { checkpoint_id } => {
                Some(checkpoint_id)
            }
            _ => None,
        }
    }

    /// Whether the context sits inside an area the lead leads
    ///
    /// Personal contexts count when their owner is assigned inside one.
    #[must_use]
    pub fn within_led_areas(&self, roster: &EventRoster, lead: &Viewer) -> bool {
        match self {
            Self::Area { area_id, .. } | Self::SharedArea { area_id } => lead.leads(area_id),
            Self::Checkpoint { checkpoint_id, .. } | Self::SharedCheckpoint { checkpoint_id } => roster
                .checkpoint(checkpoint_id)
                .is_some_and(|c| c.area_ids.iter().any(|a| lead.leads(a))),
            Self::Personal { marshal_id } => roster.marshals_in_areas(&lead.lead_area_ids).contains(marshal_id),
        }
    }

    /// Storage key of this context for an item
    #[must_use]
    pub fn key(&self, item_id: &ItemId) -> CompletionKey {
        CompletionKey {
            item_id: item_id.clone(),
            context_type: self.context_type(),
            context_id: self.context_id().to_string(),
            owner: self.owner().cloned(),
        }
    }

    /// Whether an explicit caller-supplied reference names this context
    #[must_use]
    pub fn agrees_with(&self, reference: &ContextRef) -> bool {
        self.context_type() == reference.context_type && self.context_id() == reference.context_id
    }
}

impl fmt::Display for CompletionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner() {
            Some(owner) => write!(f, "{}:{}@{}", self.context_type(), self.context_id(), owner),
            None => write!(f, "{}:{}", self.context_type(), self.context_id()),
        }
    }
}

/// Caller-supplied context type and id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRef {
    /// Context type
    pub context_type: ContextType,
    /// Context id
    pub context_id: String,
}

impl ContextRef {
    /// Create reference
    #[inline]
    #[must_use]
    pub fn new(context_type: ContextType, context_id: impl Into<String>) -> Self {
        Self {
            context_type,
            context_id: context_id.into(),
        }
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.context_type, self.context_id)
    }
}

/// Identity of at most one active completion
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionKey {
    /// Item
    pub item_id: ItemId,
    /// Context type
    pub context_type: ContextType,
    /// Context id
    pub context_id: String,
    /// Owner for per-marshal contexts
    pub owner: Option<MarshalId>,
}

impl CompletionKey {
    /// Row part of the two-part storage key (the event id is the partition)
    ///
    /// Parts are escaped so `|` only separates them and a bare `*` only
    /// stands for a shared context.
    #[must_use]
    pub fn row_key(&self) -> String {
        let owner = self
            .owner
            .as_ref()
            .map_or_else(|| "*".to_string(), |o| escape(o.as_str()));
        format!(
            "{}|{}|{}|{}",
            escape(self.item_id.as_str()),
            self.context_type,
            escape(&self.context_id),
            owner
        )
    }
}

fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            '*' => out.push_str("%2A"),
            _ => out.push(c),
        }
    }
    out
}

/// Derive the completion context of a winning match
///
/// Linked items are always per marshal, since check-in state is per marshal.
#[must_use]
pub fn resolve_context(selected: &ScopeMatch, owner: &MarshalId, links_to_check_in: bool) -> CompletionContext {
    let shared = selected.scope().is_shared() && !links_to_check_in;

    match selected.anchor() {
        Anchor::Marshal(marshal_id) => CompletionContext::Personal {
            marshal_id: marshal_id.clone(),
        },
        Anchor::Checkpoint(checkpoint_id) if shared => CompletionContext::SharedCheckpoint {
            checkpoint_id: checkpoint_id.clone(),
        },
        Anchor::Checkpoint(checkpoint_id) => CompletionContext::Checkpoint {
            checkpoint_id: checkpoint_id.clone(),
            owner: owner.clone(),
        },
        Anchor::Area(area_id) if shared => CompletionContext::SharedArea {
            area_id: area_id.clone(),
        },
        Anchor::Area(area_id) => CompletionContext::Area {
            area_id: area_id.clone(),
            owner: owner.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marshal_scope::{select, Scope, ScopeConfiguration, Viewer};

    fn resolve_for(configs: &[ScopeConfiguration], viewer: &Viewer, linked: bool) -> CompletionContext {
        let selected = select(configs, viewer).unwrap();
        resolve_context(&selected, &viewer.marshal_id, linked)
    }

    fn cfg(scope: Scope, ids: &[&str]) -> ScopeConfiguration {
        ScopeConfiguration::for_ids(scope, ids.iter().copied()).unwrap()
    }

    #[test]
    fn one_per_checkpoint_is_shared_checkpoint() {
        let viewer = Viewer::new("M").at_checkpoint("C1").in_area("A1");
        let configs = vec![
            cfg(Scope::OnePerCheckpoint, &["C1"]),
            cfg(Scope::EveryoneInAreas, &["A1"]),
        ];
        let context = resolve_for(&configs, &viewer, false);
        assert_eq!(context.context_type(), ContextType::Checkpoint);
        assert_eq!(context.context_id(), "C1");
        assert!(context.is_shared());
    }

    #[test]
    fn everyone_at_checkpoint_is_per_marshal() {
        let viewer = Viewer::new("M").at_checkpoint("C1");
        let context = resolve_for(&[cfg(Scope::EveryoneAtCheckpoints, &["C1"])], &viewer, false);
        assert_eq!(
            context,
            CompletionContext::Checkpoint {
                checkpoint_id: "C1".into(),
                owner: "M".into()
            }
        );
    }

    #[test]
    fn specific_people_is_personal() {
        let viewer = Viewer::new("M");
        let context = resolve_for(&[cfg(Scope::SpecificPeople, &["M"])], &viewer, false);
        assert_eq!(context.context_type(), ContextType::Personal);
        assert_eq!(context.owner(), Some(&MarshalId::new("M")));
    }

    #[test]
    fn lead_scopes_share_per_area() {
        let viewer = Viewer::new("L").leading("A2");
        for scope in [Scope::EveryAreaLead, Scope::OneLeadPerArea, Scope::OnePerArea] {
            let viewer = if scope == Scope::OnePerArea {
                Viewer::new("L").in_area("A2")
            } else {
                viewer.clone()
            };
            let context = resolve_for(&[cfg(scope, &["A2"])], &viewer, false);
            assert_eq!(context, CompletionContext::SharedArea { area_id: "A2".into() });
        }
    }

    #[test]
    fn linked_items_stay_per_marshal() {
        let viewer = Viewer::new("M").at_checkpoint("C1");
        let context = resolve_for(&[cfg(Scope::OnePerCheckpoint, &["C1"])], &viewer, true);
        assert!(!context.is_shared());
        assert_eq!(context.checkpoint_id(), Some(&CheckpointId::new("C1")));
    }

    #[test]
    fn row_keys_distinguish_owners() {
        let a = CompletionContext::Checkpoint {
            checkpoint_id: "C1".into(),
            owner: "A".into(),
        };
        let b = CompletionContext::Checkpoint {
            checkpoint_id: "C1".into(),
            owner: "B".into(),
        };
        let shared = CompletionContext::SharedCheckpoint {
            checkpoint_id: "C1".into(),
        };
        let item = ItemId::new("X");
        assert_ne!(a.key(&item).row_key(), b.key(&item).row_key());
        assert_eq!(shared.key(&item).row_key(), "X|Checkpoint|C1|*");
    }

    #[test]
    fn row_keys_escape_separators() {
        let starred = CompletionContext::Checkpoint {
            checkpoint_id: "C1".into(),
            owner: "*".into(),
        };
        let shared = CompletionContext::SharedCheckpoint {
            checkpoint_id: "C1".into(),
        };
        let item = ItemId::new("X");
        assert_eq!(starred.key(&item).row_key(), "X|Checkpoint|C1|%2A");
        assert_ne!(starred.key(&item).row_key(), shared.key(&item).row_key());

        let piped = CompletionContext::Personal {
            marshal_id: "C1".into(),
        };
        assert_eq!(piped.key(&"X|Checkpoint".into()).row_key(), "X%7CCheckpoint|Personal|C1|C1");
    }

    #[test]
    fn agrees_with_explicit_reference() {
        let context = CompletionContext::SharedArea { area_id: "A1".into() };
        assert!(context.agrees_with(&ContextRef::new(ContextType::Area, "A1")));
        assert!(!context.agrees_with(&ContextRef::new(ContextType::Checkpoint, "A1")));
    }
}
