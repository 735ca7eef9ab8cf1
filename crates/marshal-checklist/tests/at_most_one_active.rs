//! Any interleaving of completes and uncompletes leaves at most one active
//! record per key, and exactly the keys whose last write was a complete.

use marshal_checklist::{resolve_item, CompletionKey, CompletionRequest, CompletionStore};
use marshal_test_utils::{scenario_items, scenario_roster, TestEngine, EVENT};
use proptest::prelude::*;
use std::collections::BTreeSet;

const ITEMS: [&str; 4] = ["X", "H", "S", "W"];
const OWNERS: [&str; 4] = ["M", "P", "Q", "R"];

fn expected_key(item: &str, owner: &str) -> Option<CompletionKey> {
    let roster = scenario_roster();
    let viewer = roster.viewer(&owner.into())?;
    let item = scenario_items().into_iter().find(|i| i.id.as_str() == item)?;
    let (_, context) = resolve_item(&item, &viewer)?;
    Some(context.key(&item.id))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_active_record_per_key(ops in prop::collection::vec((0..4usize, 0..4usize, any::<bool>()), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let t = TestEngine::scenario();
        let mut model: BTreeSet<CompletionKey> = BTreeSet::new();

        runtime.block_on(async {
            for (item, owner, complete) in ops {
                let request = CompletionRequest::new(EVENT, ITEMS[item], OWNERS[owner]);
                let result = if complete {
                    t.engine.complete_task(&request).await
                } else {
                    t.engine.uncomplete_task(&request).await
                };

                match expected_key(ITEMS[item], OWNERS[owner]) {
                    Some(key) => {
                        prop_assert!(result.is_ok());
                        if complete {
                            model.insert(key);
                        } else {
                            model.remove(&key);
                        }
                    }
                    None => prop_assert_eq!(result.unwrap_err().status_code(), 403),
                }
            }

            let active = t.completions.active_completions(&t.event()).await.unwrap();
            let keys: BTreeSet<CompletionKey> = active.iter().map(|c| c.key()).collect();
            prop_assert_eq!(keys.len(), active.len());
            prop_assert_eq!(keys, model);
            Ok(())
        })?;
    }
}
