//! Scope Matcher and Most Specific Wins selection
//!
//! [`matches`] decides whether one configuration applies to a viewer and what
//! it anchors on (the checkpoint, area or marshal the match came through).
//! [`select`] runs it over an item's whole configuration list and keeps
//! exactly one winner:
//! - lowest [`Specificity`] rank wins (Marshal < Checkpoint < Area < none)
//! - on a tie, the earlier configuration wins
//!
//! Both are pure functions of their inputs.

use crate::ids::{AreaId, CheckpointId, MarshalId};
use crate::roster::Viewer;
use crate::scope::{Scope, ScopeConfiguration, Specificity};
use serde::{Deserialize, Serialize};

/// What a match came through
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Anchor {
    /// The viewer's own marshal id
    Marshal(MarshalId),
    /// A checkpoint the viewer is assigned to
    Checkpoint(CheckpointId),
    /// An area the viewer is in, or leads
    Area(AreaId),
}

/// Outcome of matching one configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Scope of the matching configuration
    pub scope: Scope,
    /// Its specificity
    pub specificity: Specificity,
    /// Entity the match came through
    pub anchor: Anchor,
}

/// The configuration selected for an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeMatch {
    /// Position in the item's configuration list
    pub index: usize,
    /// Match details
    pub result: MatchResult,
}

impl ScopeMatch {
    /// Scope that won (the item's `matchedScope` for this viewer)
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.result.scope
    }

    /// Anchor of the winning match
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> &Anchor {
        &self.result.anchor
    }
}

/// Match one configuration against a viewer
#[must_use]
pub fn matches(config: &ScopeConfiguration, viewer: &Viewer) -> Option<MatchResult> {
    let targets = config.targets();
    let anchor = match config.scope() {
        Scope::SpecificPeople => targets
            .covers(viewer.marshal_id.as_str())
            .then(|| Anchor::Marshal(viewer.marshal_id.clone())),
        Scope::EveryoneAtCheckpoints | Scope::OnePerCheckpoint => targets
            .first_covered(viewer.checkpoint_ids.iter())
            .map(|id| Anchor::Checkpoint(id.clone())),
        Scope::EveryoneInAreas | Scope::OnePerArea | Scope::OneLeadPerArea => targets
            .first_covered(viewer.covered_areas())
            .map(|id| Anchor::Area(id.clone())),
        Scope::EveryAreaLead => targets
            .first_covered(viewer.lead_area_ids.iter())
            .map(|id| Anchor::Area(id.clone())),
    }?;

    Some(MatchResult {
        scope: config.scope(),
        specificity: config.specificity(),
        anchor,
    })
}

/// Pick the winning configuration by Most Specific Wins
///
/// `None` means the item is invisible to this viewer.
#[must_use]
pub fn select(configs: &[ScopeConfiguration], viewer: &Viewer) -> Option<ScopeMatch> {
    select_where(configs, viewer, |_| true)
}

/// Like [`select`], considering only configurations accepted by `filter`
pub fn select_where<F>(configs: &[ScopeConfiguration], viewer: &Viewer, filter: F) -> Option<ScopeMatch>
where
    F: Fn(&ScopeConfiguration) -> bool,
{
    let mut best: Option<ScopeMatch> = None;

    for (index, config) in configs.iter().enumerate() {
        if !filter(config) {
            continue;
        }
        let Some(result) = matches(config, viewer) else {
            continue;
        };
        // Strictly lower rank only: ties keep the earlier configuration.
        let better = best
            .as_ref()
            .map_or(true, |b| result.specificity < b.result.specificity);
        if better {
            best = Some(ScopeMatch { index, result });
        }
    }

    if let Some(selected) = &best {
        tracing::debug!(
            marshal = %viewer.marshal_id,
            index = selected.index,
            scope = %selected.result.scope,
            "selected scope configuration"
        );
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ALL_AREAS, ALL_MARSHALS};

    fn cfg(scope: Scope, ids: &[&str]) -> ScopeConfiguration {
        ScopeConfiguration::for_ids(scope, ids.iter().copied()).unwrap()
    }

    fn marshal_at_c1() -> Viewer {
        Viewer::new("M").at_checkpoint("C1").in_area("A1")
    }

    #[test]
    fn checkpoint_beats_area() {
        let configs = vec![
            cfg(Scope::EveryoneInAreas, &["A1"]),
            cfg(Scope::OnePerCheckpoint, &["C1"]),
        ];
        let selected = select(&configs, &marshal_at_c1()).unwrap();
        assert_eq!(selected.index, 1);
        assert_eq!(selected.scope(), Scope::OnePerCheckpoint);
        assert_eq!(selected.anchor(), &Anchor::Checkpoint("C1".into()));
    }

    #[test]
    fn tie_keeps_first_configuration() {
        let configs = vec![
            cfg(Scope::OnePerArea, &["A1"]),
            cfg(Scope::EveryoneInAreas, &["A1"]),
        ];
        let selected = select(&configs, &marshal_at_c1()).unwrap();
        assert_eq!(selected.index, 0);
        assert_eq!(selected.scope(), Scope::OnePerArea);
    }

    #[test]
    fn specific_people_is_most_specific() {
        let configs = vec![
            cfg(Scope::OnePerCheckpoint, &["C1"]),
            cfg(Scope::SpecificPeople, &["M"]),
        ];
        let selected = select(&configs, &marshal_at_c1()).unwrap();
        assert_eq!(selected.scope(), Scope::SpecificPeople);
        assert_eq!(selected.anchor(), &Anchor::Marshal("M".into()));
    }

    #[test]
    fn all_marshals_sentinel_matches_anyone() {
        let config = cfg(Scope::SpecificPeople, &[ALL_MARSHALS]);
        assert!(matches(&config, &Viewer::new("anyone")).is_some());
    }

    #[test]
    fn audience_wide_loses_to_everything() {
        let configs = vec![
            ScopeConfiguration::audience_wide(Scope::EveryoneAtCheckpoints),
            cfg(Scope::EveryoneInAreas, &["A1"]),
        ];
        let selected = select(&configs, &marshal_at_c1()).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn area_lead_scopes_ignore_plain_marshals() {
        let config = cfg(Scope::EveryAreaLead, &[ALL_AREAS]);
        assert!(matches(&config, &marshal_at_c1()).is_none());

        let lead = Viewer::new("L").leading("A1");
        let result = matches(&config, &lead).unwrap();
        assert_eq!(result.anchor, Anchor::Area("A1".into()));
    }

    #[test]
    fn one_lead_per_area_matches_like_one_per_area() {
        let config = cfg(Scope::OneLeadPerArea, &["A1"]);
        let result = matches(&config, &marshal_at_c1()).unwrap();
        assert_eq!(result.anchor, Anchor::Area("A1".into()));
        assert!(matches(&config, &Viewer::new("L").leading("A1")).is_some());
        assert!(matches(&config, &Viewer::new("L").leading("A2")).is_none());
    }

    #[test]
    fn area_scopes_match_led_areas_without_assignments() {
        let lead = Viewer::new("L").leading("A1");
        for scope in [Scope::EveryoneInAreas, Scope::OnePerArea] {
            let selected = select(&[cfg(scope, &["A1"])], &lead).unwrap();
            assert_eq!(selected.anchor(), &Anchor::Area("A1".into()));
        }
        assert!(select(&[cfg(Scope::EveryoneInAreas, &["A2"])], &lead).is_none());
    }

    #[test]
    fn assignment_area_anchors_before_led_area() {
        let viewer = Viewer::new("M").at_checkpoint("C3").in_area("A2").leading("A1");
        let result = matches(&cfg(Scope::EveryoneInAreas, &[ALL_AREAS]), &viewer).unwrap();
        assert_eq!(result.anchor, Anchor::Area("A2".into()));
    }

    #[test]
    fn unassigned_viewer_matches_nothing_checkpoint_based() {
        let viewer = Viewer::new("nobody");
        let configs = vec![
            cfg(Scope::EveryoneAtCheckpoints, &["C1"]),
            cfg(Scope::EveryAreaLead, &["A1"]),
        ];
        assert!(select(&configs, &viewer).is_none());
    }

    #[test]
    fn empty_list_is_visible_to_no_one() {
        assert!(select(&[], &marshal_at_c1()).is_none());
    }

    #[test]
    fn anchor_follows_configuration_order() {
        let viewer = Viewer::new("M").at_checkpoint("C1").at_checkpoint("C2");
        let result = matches(&cfg(Scope::OnePerCheckpoint, &["C2", "C1"]), &viewer).unwrap();
        assert_eq!(result.anchor, Anchor::Checkpoint("C2".into()));
    }

    #[test]
    fn select_where_skips_filtered_configurations() {
        let configs = vec![
            cfg(Scope::OnePerCheckpoint, &["C1"]),
            cfg(Scope::EveryoneInAreas, &["A1"]),
        ];
        let selected = select_where(&configs, &marshal_at_c1(), |c| !c.scope().is_shared()).unwrap();
        assert_eq!(selected.scope(), Scope::EveryoneInAreas);
    }
}
