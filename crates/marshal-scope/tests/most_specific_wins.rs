//! Property tests for Most Specific Wins.
//!
//! Exercises the selection rule over randomly generated configuration lists
//! and viewers:
//! - Selection is a pure function (no hidden randomness).
//! - Reordering configurations never changes the winner when the winning
//!   specificity is unique among the matches.
//! - A viewer without assignments or lead roles never sees checkpoint-only or
//!   lead-only items.

use marshal_scope::{
    matches, select, ItemType, Scope, ScopeConfiguration, Viewer, ALL_AREAS, ALL_CHECKPOINTS,
    ALL_MARSHALS,
};
use proptest::prelude::*;

const MARSHALS: [&str; 3] = ["m1", "m2", "m3"];
const CHECKPOINTS: [&str; 3] = ["C1", "C2", "C3"];
const AREAS: [&str; 2] = ["A1", "A2"];

fn universe(item_type: ItemType) -> &'static [&'static str] {
    match item_type {
        ItemType::Marshal => &MARSHALS,
        ItemType::Checkpoint => &CHECKPOINTS,
        ItemType::Area => &AREAS,
    }
}

fn sentinel(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Marshal => ALL_MARSHALS,
        ItemType::Checkpoint => ALL_CHECKPOINTS,
        ItemType::Area => ALL_AREAS,
    }
}

fn config_strategy() -> impl Strategy<Value = ScopeConfiguration> {
    (0..Scope::ALL.len(), any::<bool>(), proptest::bits::u8::between(0, 3)).prop_map(
        |(scope_idx, use_sentinel, mask)| {
            let scope = Scope::ALL[scope_idx];
            let family = scope.item_type();
            let pool = universe(family);
            let mut ids: Vec<&str> = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| *id)
                .collect();
            if use_sentinel || ids.is_empty() {
                ids = vec![sentinel(family)];
            }
            ScopeConfiguration::for_ids(scope, ids).unwrap()
        },
    )
}

fn viewer_strategy() -> impl Strategy<Value = Viewer> {
    (
        0..MARSHALS.len(),
        proptest::bits::u8::between(0, 3),
        proptest::bits::u8::between(0, 2),
        proptest::bits::u8::between(0, 2),
    )
        .prop_map(|(m, checkpoints, areas, leads)| {
            let mut viewer = Viewer::new(MARSHALS[m]);
            for (i, c) in CHECKPOINTS.iter().enumerate() {
                if checkpoints & (1 << i) != 0 {
                    viewer = viewer.at_checkpoint(*c);
                }
            }
            for (i, a) in AREAS.iter().enumerate() {
                if areas & (1 << i) != 0 {
                    viewer = viewer.in_area(*a);
                }
                if leads & (1 << i) != 0 {
                    viewer = viewer.leading(*a);
                }
            }
            viewer
        })
}

proptest! {
    #[test]
    fn selection_is_deterministic(
        configs in proptest::collection::vec(config_strategy(), 0..6),
        viewer in viewer_strategy(),
    ) {
        prop_assert_eq!(select(&configs, &viewer), select(&configs, &viewer));
    }

    #[test]
    fn unique_winning_specificity_is_order_independent(
        (configs, shuffled) in proptest::collection::vec(config_strategy(), 1..6)
            .prop_flat_map(|configs| (Just(configs.clone()), Just(configs).prop_shuffle())),
        viewer in viewer_strategy(),
    ) {
        let Some(winner) = select(&configs, &viewer) else {
            prop_assert!(select(&shuffled, &viewer).is_none());
            return Ok(());
        };

        let tied = configs
            .iter()
            .filter_map(|c| matches(c, &viewer))
            .filter(|m| m.specificity == winner.result.specificity)
            .count();
        prop_assume!(tied == 1);

        let reordered = select(&shuffled, &viewer).unwrap();
        prop_assert_eq!(reordered.result, winner.result);
    }

    #[test]
    fn unassigned_viewer_never_sees_checkpoint_or_lead_items(
        configs in proptest::collection::vec(config_strategy(), 0..6),
        m in 0..MARSHALS.len(),
    ) {
        let only_restricted: Vec<ScopeConfiguration> = configs
            .into_iter()
            .filter(|c| matches!(c.scope(), Scope::EveryoneAtCheckpoints | Scope::EveryAreaLead))
            .collect();
        let viewer = Viewer::new(MARSHALS[m]);
        prop_assert!(select(&only_restricted, &viewer).is_none());
    }
}

#[test]
fn concrete_scenario_one_per_checkpoint_wins() {
    let configs: Vec<ScopeConfiguration> = serde_json::from_str(
        r#"[
            {"scope":"OnePerCheckpoint","itemType":"Checkpoint","ids":["C1"]},
            {"scope":"EveryoneInAreas","itemType":"Area","ids":["A1"]}
        ]"#,
    )
    .unwrap();
    let viewer = Viewer::new("M").at_checkpoint("C1").in_area("A1");

    let selected = select(&configs, &viewer).unwrap();
    assert_eq!(selected.scope(), Scope::OnePerCheckpoint);
    assert_eq!(selected.result.specificity.rank(), 2);
}
