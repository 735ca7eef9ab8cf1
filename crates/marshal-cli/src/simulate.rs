//! Offline replay simulator
//!
//! Generates a random event from a seed, queues random completes, uncompletes
//! and check-ins on a device, and replays them through a flaky link into a
//! live engine. The link can fail before delivery or lose the acknowledgement
//! after the engine applied the action, so replays are duplicated.
//!
//! Checked after the queue drains:
//! - no completion key has more than one active record
//! - the active records are exactly what applying the queue in order yields
//!   (skipped when an action exhausted its retries and was replayed late)

use marshal_checklist::{
    may_complete, resolve_item, ChecklistEngine, ChecklistItem, CompletionKey, EngineConfig, EventSnapshot,
    MemoryCheckInLedger, MemoryCompletionStore, MemoryDirectory,
};
use marshal_offline::{
    ActionPayload, ActionTransport, ActionType, AlwaysOnline, CheckInPayload, ChecklistActionPayload, DrainReport,
    EngineTransport, OfflineAction, OfflineQueue, QueueError, SyncConfig, SyncEngine, TransportError,
};
use marshal_scope::{AreaLead, Assignment, Checkpoint, EventId, EventRoster, Marshal, Scope, ScopeConfiguration};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const EVENT: &str = "SIM";
const MAX_PASSES: usize = 100_000;

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimulatorConfig {
    /// Random seed for reproducibility
    pub(crate) seed: u64,
    /// Actions to queue
    pub(crate) operations: usize,
    /// Event size
    pub(crate) areas: usize,
    pub(crate) checkpoints: usize,
    pub(crate) marshals: usize,
    pub(crate) items: usize,
    /// Chance a send fails before reaching the engine
    pub(crate) failure_rate: f64,
    /// Chance a delivered send loses its acknowledgement
    pub(crate) lost_ack_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            operations: 1_000,
            areas: 3,
            checkpoints: 8,
            marshals: 20,
            items: 12,
            failure_rate: 0.2,
            lost_ack_rate: 0.1,
        }
    }
}

/// Invariant breach found after the run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Violation {
    /// Several active records for one key
    DuplicateActive { key: String, count: usize },
    /// Active in the engine, not in the model
    UnexpectedActive { key: String },
    /// Active in the model, not in the engine
    MissingActive { key: String },
    /// Drain never emptied the queue
    QueueNotDrained { remaining: usize },
}

/// Counters collected during the run
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct SimulatorStats {
    pub(crate) queued: usize,
    pub(crate) passes: usize,
    pub(crate) sends: usize,
    pub(crate) delivered: usize,
    pub(crate) lost_acks: usize,
    pub(crate) transient_failures: usize,
    pub(crate) permanent_failures: usize,
    pub(crate) exhausted: usize,
    pub(crate) active_completions: usize,
}

/// Final report from the simulator
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimulatorReport {
    pub(crate) config: SimulatorConfig,
    pub(crate) stats: SimulatorStats,
    /// Whether the model comparison ran
    pub(crate) order_checked: bool,
    pub(crate) violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    pub(crate) fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    pub(crate) fn generate_text(&self) -> String {
        let stats = &self.stats;
        let mut report = String::new();

        report.push_str("=== Offline Replay Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Queued actions: {}\n", stats.queued));
        report.push_str(&format!("Drain passes: {}\n", stats.passes));
        report.push_str(&format!("Sends: {}\n", stats.sends));
        report.push_str(&format!("Delivered: {} ({} acks lost)\n", stats.delivered, stats.lost_acks));
        report.push_str(&format!("Transient failures: {}\n", stats.transient_failures));
        report.push_str(&format!("Permanent failures: {}\n", stats.permanent_failures));
        report.push_str(&format!("Exhausted retries: {}\n", stats.exhausted));
        report.push_str(&format!("Active completions: {}\n", stats.active_completions));
        report.push_str(&format!(
            "Order check: {}\n",
            if self.order_checked { "ran" } else { "skipped" }
        ));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Link that drops sends and acknowledgements at random
struct FlakyTransport {
    inner: EngineTransport,
    rng: Mutex<StdRng>,
    failure_rate: f64,
    lost_ack_rate: f64,
    sends: Mutex<(usize, usize)>,
}

#[async_trait::async_trait]
impl ActionTransport for FlakyTransport {
    async fn send(&self, action: &OfflineAction) -> Result<(), TransportError> {
        let (fail, lose_ack, status) = {
            let mut rng = self.rng.lock();
            (
                rng.random_bool(self.failure_rate),
                rng.random_bool(self.lost_ack_rate),
                rng.random_bool(0.5),
            )
        };
        if fail {
            return Err(if status {
                TransportError::Status(503)
            } else {
                TransportError::Network("connection reset".into())
            });
        }

        self.inner.send(action).await?;
        let mut sends = self.sends.lock();
        sends.0 += 1;
        if lose_ack {
            sends.1 += 1;
            return Err(TransportError::Timeout);
        }
        Ok(())
    }
}

fn random_roster(rng: &mut StdRng, config: &SimulatorConfig) -> EventRoster {
    let areas = config.areas.max(1);
    let checkpoints = config.checkpoints.max(1);
    let mut roster = EventRoster::new(EVENT.into());

    for c in 0..checkpoints {
        roster.checkpoints.push(Checkpoint {
            id: format!("C{c}").into(),
            name: format!("Checkpoint {c}"),
            area_ids: vec![format!("A{}", rng.random_range(0..areas)).into()],
        });
    }
    for m in 0..config.marshals.max(1) {
        let id = format!("M{m}");
        roster.marshals.push(Marshal {
            id: id.as_str().into(),
            name: format!("Marshal {m}"),
        });
        let posts = if rng.random_bool(0.2) { 2 } else { 1 };
        for _ in 0..posts {
            let checkpoint = format!("C{}", rng.random_range(0..checkpoints));
            if !roster.is_assigned(&id.as_str().into(), &checkpoint.as_str().into()) {
                roster.assignments.push(Assignment {
                    marshal_id: id.as_str().into(),
                    checkpoint_id: checkpoint.into(),
                });
            }
        }
    }
    for a in 0..areas {
        let lead = rng.random_range(0..roster.marshals.len());
        roster.area_leads.push(AreaLead {
            marshal_id: roster.marshals[lead].id.clone(),
            area_id: format!("A{a}").into(),
        });
    }
    roster
}

fn random_scope(rng: &mut StdRng, config: &SimulatorConfig) -> ScopeConfiguration {
    let scope = Scope::ALL[rng.random_range(0..Scope::ALL.len())];
    let item_type = scope.item_type();
    let id = if rng.random_bool(0.25) {
        item_type.sentinel().to_string()
    } else {
        match item_type {
            marshal_scope::ItemType::Marshal => format!("M{}", rng.random_range(0..config.marshals.max(1))),
            marshal_scope::ItemType::Checkpoint => format!("C{}", rng.random_range(0..config.checkpoints.max(1))),
            marshal_scope::ItemType::Area => format!("A{}", rng.random_range(0..config.areas.max(1))),
        }
    };
    ScopeConfiguration::for_ids(scope, [id]).unwrap_or_else(|_| ScopeConfiguration::audience_wide(scope))
}

fn random_items(rng: &mut StdRng, config: &SimulatorConfig) -> Vec<ChecklistItem> {
    (0..config.items.max(1))
        .map(|i| {
            let mut item = ChecklistItem::new(format!("I{i}"), EVENT, format!("Task {i}"))
                .with_order(i32::try_from(i).unwrap_or(i32::MAX));
            for _ in 0..rng.random_range(1..=2) {
                item = item.with_scope(random_scope(rng, config));
            }
            if rng.random_bool(0.15) {
                item = item.linked_to_check_in(None);
            }
            item
        })
        .collect()
}

fn random_action(rng: &mut StdRng, roster: &EventRoster, items: &[ChecklistItem]) -> Result<OfflineAction, QueueError> {
    let marshal = &roster.marshals[rng.random_range(0..roster.marshals.len())].id;
    let roll = rng.random_range(0..100);

    if roll < 20 {
        let checkpoint = &roster.checkpoints[rng.random_range(0..roster.checkpoints.len())].id;
        return OfflineAction::check_in(&CheckInPayload {
            event_id: EVENT.into(),
            marshal_id: marshal.clone(),
            checkpoint_id: checkpoint.clone(),
            checked_in: rng.random_bool(0.5),
            actor: None,
        });
    }

    let item = &items[rng.random_range(0..items.len())].id;
    let payload = ChecklistActionPayload::new(EVENT, item.clone(), marshal.clone());
    if roll < 65 {
        OfflineAction::complete(&payload)
    } else {
        OfflineAction::uncomplete(&payload)
    }
}

fn tally(stats: &mut SimulatorStats, report: &DrainReport) {
    stats.passes += 1;
    stats.sends += report.attempted;
    stats.transient_failures += report.retried + report.failed;
    stats.permanent_failures += report.permanent;
    stats.exhausted += report.failed;
}

/// Active keys after applying checklist actions in queue order
fn model(roster: &EventRoster, items: &[ChecklistItem], actions: &[OfflineAction]) -> BTreeSet<CompletionKey> {
    let mut active = BTreeSet::new();
    for action in actions {
        let Ok(ActionPayload::Checklist(payload)) = action.decode() else {
            continue;
        };
        let Some(item) = items.iter().find(|i| i.id == payload.item_id) else {
            continue;
        };
        let Some(owner) = roster.viewer(&payload.owner_marshal_id) else {
            continue;
        };
        let Some((selected, context)) = resolve_item(item, &owner) else {
            continue;
        };
        if !may_complete(roster, &selected, &context, &owner) {
            continue;
        }
        let key = context.key(&item.id);
        if action.action_type == ActionType::ChecklistComplete {
            active.insert(key);
        } else {
            active.remove(&key);
        }
    }
    active
}

/// Run the simulator
pub(crate) async fn run_simulator(
    config: SimulatorConfig,
    engine_config: EngineConfig,
    sync_config: SyncConfig,
) -> anyhow::Result<SimulatorReport> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let roster = random_roster(&mut rng, &config);
    let items = random_items(&mut rng, &config);
    let event_id = EventId::new(EVENT);

    let directory = MemoryDirectory::new();
    directory.insert(EventSnapshot {
        roster: roster.clone(),
        checklist_items: items.clone(),
        ..EventSnapshot::default()
    });
    let completions = Arc::new(MemoryCompletionStore::new());
    let engine = ChecklistEngine::new(
        Arc::new(directory),
        completions.clone(),
        Arc::new(MemoryCheckInLedger::new()),
    )
    .with_config(engine_config);

    let transport = Arc::new(FlakyTransport {
        inner: EngineTransport::new(Arc::new(engine)),
        rng: Mutex::new(StdRng::seed_from_u64(config.seed.wrapping_add(1))),
        failure_rate: config.failure_rate.clamp(0.0, 0.95),
        lost_ack_rate: config.lost_ack_rate.clamp(0.0, 0.95),
        sends: Mutex::new((0, 0)),
    });
    let sync = SyncEngine::new(
        Arc::new(OfflineQueue::in_memory()),
        transport.clone(),
        Arc::new(AlwaysOnline),
        sync_config,
    );

    let mut stats = SimulatorStats::default();
    let mut queued = Vec::with_capacity(config.operations);
    let mut order_checked = true;

    for _ in 0..config.operations {
        let action = random_action(&mut rng, &roster, &items)?;
        queued.push(action.clone());
        sync.queue().enqueue_action(action)?;
        stats.queued += 1;

        if rng.random_bool(0.25) {
            tally(&mut stats, &sync.drain_once().await?);
        }
    }

    while !sync.queue().actions().is_empty() && stats.passes < MAX_PASSES {
        if sync.queue().is_drained() {
            order_checked = false;
            sync.queue().retry_failed()?;
        }
        tally(&mut stats, &sync.drain_once().await?);
    }
    if stats.exhausted > 0 {
        order_checked = false;
    }

    let (delivered, lost_acks) = *transport.sends.lock();
    stats.delivered = delivered;
    stats.lost_acks = lost_acks;

    let mut violations = Vec::new();
    let remaining = sync.queue().actions().len();
    if remaining > 0 {
        violations.push(Violation::QueueNotDrained { remaining });
    }

    let mut per_key: BTreeMap<CompletionKey, usize> = BTreeMap::new();
    for record in completions.all_records(&event_id) {
        if record.value.is_active() {
            *per_key.entry(record.value.key()).or_default() += 1;
        }
    }
    stats.active_completions = per_key.len();
    for (key, count) in &per_key {
        if *count > 1 {
            violations.push(Violation::DuplicateActive {
                key: key.row_key(),
                count: *count,
            });
        }
    }

    if order_checked {
        let expected = model(&roster, &items, &queued);
        let actual: BTreeSet<CompletionKey> = per_key.into_keys().collect();
        for key in actual.difference(&expected) {
            violations.push(Violation::UnexpectedActive { key: key.row_key() });
        }
        for key in expected.difference(&actual) {
            violations.push(Violation::MissingActive { key: key.row_key() });
        }
    }

    tracing::info!(
        seed = config.seed,
        passes = stats.passes,
        violations = violations.len(),
        "simulation finished"
    );
    Ok(SimulatorReport {
        config,
        stats,
        order_checked,
        violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed,
            operations: 200,
            ..SimulatorConfig::default()
        }
    }

    #[tokio::test]
    async fn flaky_link_converges_without_violations() {
        let report = run_simulator(small(7), EngineConfig::default(), SyncConfig::default())
            .await
            .unwrap();
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.queued, 200);
        assert!(report.stats.lost_acks > 0);
    }

    #[tokio::test]
    async fn same_seed_same_report() {
        let a = run_simulator(small(3), EngineConfig::default(), SyncConfig::default())
            .await
            .unwrap();
        let b = run_simulator(small(3), EngineConfig::default(), SyncConfig::default())
            .await
            .unwrap();
        assert_eq!(a.stats.sends, b.stats.sends);
        assert_eq!(a.stats.active_completions, b.stats.active_completions);
    }

    #[tokio::test]
    async fn reliable_link_checks_order() {
        let config = SimulatorConfig {
            failure_rate: 0.0,
            lost_ack_rate: 0.0,
            ..small(11)
        };
        let report = run_simulator(config, EngineConfig::default(), SyncConfig::default())
            .await
            .unwrap();
        assert!(report.order_checked);
        assert!(report.passed());
        assert_eq!(report.stats.transient_failures, 0);
    }
}
