//! Event roster and viewers
//!
//! The roster is what the surrounding record store knows about people and
//! places: checkpoints (each inside zero or more areas), marshals, checkpoint
//! assignments and area-lead roles. A [`Viewer`] is computed from it per
//! request and never persisted.

use crate::ids::{AreaId, CheckpointId, EventId, MarshalId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A location marshals are assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Checkpoint id
    pub id: CheckpointId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Areas containing this checkpoint
    #[serde(default)]
    pub area_ids: Vec<AreaId>,
}

/// A volunteer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marshal {
    /// Marshal id
    pub id: MarshalId,
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Marshal placed at a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assigned marshal
    pub marshal_id: MarshalId,
    /// Target checkpoint
    pub checkpoint_id: CheckpointId,
}

/// Area-lead role held by a marshal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaLead {
    /// Lead marshal
    pub marshal_id: MarshalId,
    /// Led area
    pub area_id: AreaId,
}

/// People and places of one event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRoster {
    /// Owning event
    pub event_id: EventId,
    /// Checkpoints
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    /// Marshals
    #[serde(default)]
    pub marshals: Vec<Marshal>,
    /// Checkpoint assignments
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// Area-lead roles
    #[serde(default)]
    pub area_leads: Vec<AreaLead>,
}

impl EventRoster {
    /// Create empty roster for an event
    #[inline]
    #[must_use]
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            ..Self::default()
        }
    }

    /// Look up a marshal
    #[must_use]
    pub fn marshal(&self, id: &MarshalId) -> Option<&Marshal> {
        self.marshals.iter().find(|m| &m.id == id)
    }

    /// Display name of a marshal, falling back to the id
    #[must_use]
    pub fn marshal_name(&self, id: &MarshalId) -> String {
        self.marshal(id)
            .filter(|m| !m.name.is_empty())
            .map_or_else(|| id.to_string(), |m| m.name.clone())
    }

    /// Look up a checkpoint
    #[must_use]
    pub fn checkpoint(&self, id: &CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| &c.id == id)
    }

    /// Whether a marshal is assigned to a checkpoint
    #[must_use]
    pub fn is_assigned(&self, marshal_id: &MarshalId, checkpoint_id: &CheckpointId) -> bool {
        self.assignments
            .iter()
            .any(|a| &a.marshal_id == marshal_id && &a.checkpoint_id == checkpoint_id)
    }

    /// Build the viewer for a marshal, `None` if the marshal is unknown
    #[must_use]
    pub fn viewer(&self, marshal_id: &MarshalId) -> Option<Viewer> {
        self.marshal(marshal_id)?;

        let checkpoint_ids: IndexSet<CheckpointId> = self
            .assignments
            .iter()
            .filter(|a| &a.marshal_id == marshal_id)
            .map(|a| a.checkpoint_id.clone())
            .collect();

        let area_ids: IndexSet<AreaId> = checkpoint_ids
            .iter()
            .filter_map(|id| self.checkpoint(id))
            .flat_map(|c| c.area_ids.iter().cloned())
            .collect();

        let lead_area_ids: IndexSet<AreaId> = self
            .area_leads
            .iter()
            .filter(|l| &l.marshal_id == marshal_id)
            .map(|l| l.area_id.clone())
            .collect();

        Some(Viewer {
            marshal_id: marshal_id.clone(),
            checkpoint_ids,
            area_ids,
            lead_area_ids,
        })
    }

    /// Checkpoints inside any of the given areas
    #[must_use]
    pub fn checkpoints_in_areas<'a>(
        &'a self,
        areas: &'a IndexSet<AreaId>,
    ) -> impl Iterator<Item = &'a Checkpoint> + 'a {
        self.checkpoints
            .iter()
            .filter(move |c| c.area_ids.iter().any(|a| areas.contains(a)))
    }

    /// Marshals assigned anywhere inside the given areas, deduplicated and sorted
    #[must_use]
    pub fn marshals_in_areas(&self, areas: &IndexSet<AreaId>) -> BTreeSet<MarshalId> {
        let checkpoints: BTreeSet<&CheckpointId> =
            self.checkpoints_in_areas(areas).map(|c| &c.id).collect();

        self.assignments
            .iter()
            .filter(|a| checkpoints.contains(&a.checkpoint_id))
            .map(|a| a.marshal_id.clone())
            .collect()
    }

    /// Whether `lead_id` leads an area containing one of the marshal's checkpoints
    #[must_use]
    pub fn leads_over(&self, lead_id: &MarshalId, marshal_id: &MarshalId) -> bool {
        let Some(lead) = self.viewer(lead_id) else {
            return false;
        };
        self.marshals_in_areas(&lead.lead_area_ids).contains(marshal_id)
    }
}

/// Who is asking: a marshal and what they cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// Requesting marshal
    pub marshal_id: MarshalId,
    /// Assigned checkpoints, roster order
    pub checkpoint_ids: IndexSet<CheckpointId>,
    /// Areas containing an assigned checkpoint
    pub area_ids: IndexSet<AreaId>,
    /// Areas the marshal leads
    pub lead_area_ids: IndexSet<AreaId>,
}

impl Viewer {
    /// Viewer with no assignments and no roles
    #[inline]
    #[must_use]
    pub fn new(marshal_id: impl Into<MarshalId>) -> Self {
        Self {
            marshal_id: marshal_id.into(),
            checkpoint_ids: IndexSet::new(),
            area_ids: IndexSet::new(),
            lead_area_ids: IndexSet::new(),
        }
    }

    /// With an assigned checkpoint
    #[inline]
    #[must_use]
    pub fn at_checkpoint(mut self, id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_ids.insert(id.into());
        self
    }

    /// With an area containing an assigned checkpoint
    #[inline]
    #[must_use]
    pub fn in_area(mut self, id: impl Into<AreaId>) -> Self {
        self.area_ids.insert(id.into());
        self
    }

    /// With an area-lead role
    #[inline]
    #[must_use]
    pub fn leading(mut self, id: impl Into<AreaId>) -> Self {
        self.lead_area_ids.insert(id.into());
        self
    }

    /// Whether the viewer leads any area
    #[inline]
    #[must_use]
    pub fn is_area_lead(&self) -> bool {
        !self.lead_area_ids.is_empty()
    }

    /// Whether the viewer leads an area
    #[inline]
    #[must_use]
    pub fn leads(&self, area_id: &AreaId) -> bool {
        self.lead_area_ids.contains(area_id)
    }

    /// Areas the viewer is in or leads, assignment areas first
    pub fn covered_areas(&self) -> impl Iterator<Item = &AreaId> + '_ {
        self.area_ids
            .iter()
            .chain(self.lead_area_ids.iter().filter(|a| !self.area_ids.contains(*a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> EventRoster {
        EventRoster {
            event_id: EventId::new("E1"),
            checkpoints: vec![
                Checkpoint {
                    id: "C1".into(),
                    name: "Start".into(),
                    area_ids: vec!["A1".into()],
                },
                Checkpoint {
                    id: "C2".into(),
                    name: "Bridge".into(),
                    area_ids: vec!["A1".into(), "A2".into()],
                },
                Checkpoint {
                    id: "C3".into(),
                    name: "Finish".into(),
                    area_ids: vec!["A2".into()],
                },
            ],
            marshals: vec![
                Marshal {
                    id: "m1".into(),
                    name: "Ana".into(),
                },
                Marshal {
                    id: "m2".into(),
                    name: String::new(),
                },
                Marshal {
                    id: "lead".into(),
                    name: "Lee".into(),
                },
            ],
            assignments: vec![
                Assignment {
                    marshal_id: "m1".into(),
                    checkpoint_id: "C1".into(),
                },
                Assignment {
                    marshal_id: "m2".into(),
                    checkpoint_id: "C2".into(),
                },
                Assignment {
                    marshal_id: "m2".into(),
                    checkpoint_id: "C3".into(),
                },
            ],
            area_leads: vec![AreaLead {
                marshal_id: "lead".into(),
                area_id: "A1".into(),
            }],
        }
    }

    #[test]
    fn viewer_collects_checkpoints_and_areas() {
        let viewer = roster().viewer(&"m2".into()).unwrap();
        assert_eq!(viewer.checkpoint_ids.len(), 2);
        let areas: Vec<&str> = viewer.area_ids.iter().map(AreaId::as_str).collect();
        assert_eq!(areas, vec!["A1", "A2"]);
        assert!(!viewer.is_area_lead());
    }

    #[test]
    fn unknown_marshal_has_no_viewer() {
        assert!(roster().viewer(&"ghost".into()).is_none());
    }

    #[test]
    fn lead_viewer_has_lead_areas_without_assignments() {
        let viewer = roster().viewer(&"lead".into()).unwrap();
        assert!(viewer.checkpoint_ids.is_empty());
        assert!(viewer.is_area_lead());
    }

    #[test]
    fn covered_areas_puts_assignment_areas_before_led_ones() {
        let viewer = Viewer::new("m").in_area("A2").leading("A1").leading("A2");
        let areas: Vec<&str> = viewer.covered_areas().map(AreaId::as_str).collect();
        assert_eq!(areas, vec!["A2", "A1"]);
        assert!(viewer.leads(&"A1".into()));
        assert!(!Viewer::new("m").in_area("A1").leads(&"A1".into()));
    }

    #[test]
    fn marshals_in_areas_dedupes() {
        let roster = roster();
        let areas: IndexSet<AreaId> = ["A1".into(), "A2".into()].into_iter().collect();
        let marshals: Vec<String> = roster
            .marshals_in_areas(&areas)
            .into_iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(marshals, vec!["m1", "m2"]);
    }

    #[test]
    fn leads_over_checks_area_membership() {
        let roster = roster();
        assert!(roster.leads_over(&"lead".into(), &"m1".into()));
        assert!(roster.leads_over(&"lead".into(), &"m2".into()));
        assert!(!roster.leads_over(&"m1".into(), &"m2".into()));
    }

    #[test]
    fn marshal_name_falls_back_to_id() {
        let roster = roster();
        assert_eq!(roster.marshal_name(&"m1".into()), "Ana");
        assert_eq!(roster.marshal_name(&"m2".into()), "m2");
    }
}
