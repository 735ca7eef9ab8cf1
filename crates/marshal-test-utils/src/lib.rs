//! Testing utilities for the marshal workspace
//!
//! Shared fixtures, engine bundles and scripted stores/transports.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use marshal_checklist::{
    ChecklistCompletion, ChecklistEngine, ChecklistItem, CompletionKey, CompletionStore, EngineConfig, EventSnapshot,
    MemoryCheckInLedger, MemoryCompletionStore, MemoryDirectory, StoreError, Versioned,
};
use marshal_offline::{ActionTransport, OfflineAction, TransportError};
use marshal_scope::{
    AreaLead, Assignment, Checkpoint, Contact, EventId, EventRoster, ItemId, Marshal, Note, Scope, ScopeConfiguration,
    ALL_AREAS, ALL_CHECKPOINTS,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const EVENT: &str = "E1";

/// Roster built up fluently
#[derive(Debug, Clone)]
pub struct RosterBuilder {
    roster: EventRoster,
}

impl RosterBuilder {
    pub fn new(event_id: &str) -> Self {
        Self {
            roster: EventRoster::new(event_id.into()),
        }
    }

    pub fn checkpoint(mut self, id: &str, areas: &[&str]) -> Self {
        self.roster.checkpoints.push(Checkpoint {
            id: id.into(),
            name: format!("Checkpoint {id}"),
            area_ids: areas.iter().map(|a| (*a).into()).collect(),
        });
        self
    }

    pub fn marshal(mut self, id: &str, name: &str, checkpoints: &[&str]) -> Self {
        self.roster.marshals.push(Marshal {
            id: id.into(),
            name: name.to_string(),
        });
        for checkpoint in checkpoints {
            self.roster.assignments.push(Assignment {
                marshal_id: id.into(),
                checkpoint_id: (*checkpoint).into(),
            });
        }
        self
    }

    pub fn lead(mut self, marshal_id: &str, area_id: &str) -> Self {
        self.roster.area_leads.push(AreaLead {
            marshal_id: marshal_id.into(),
            area_id: area_id.into(),
        });
        self
    }

    pub fn build(self) -> EventRoster {
        self.roster
    }
}

pub fn scope(scope: Scope, ids: &[&str]) -> ScopeConfiguration {
    ScopeConfiguration::for_ids(scope, ids.iter().copied()).unwrap()
}

pub fn item(id: &str, text: &str, scopes: Vec<ScopeConfiguration>) -> ChecklistItem {
    scopes
        .into_iter()
        .fold(ChecklistItem::new(id, EVENT, text), ChecklistItem::with_scope)
}

/// Area A1 holds C1 and C2, area A2 holds C3.
///
/// - M (Morgan) and P (Pat) at C1, Q (Quinn) at C2, R (Riley) at C3
/// - L (Lee) leads A1 without a checkpoint of their own
pub fn scenario_roster() -> EventRoster {
    RosterBuilder::new(EVENT)
        .checkpoint("C1", &["A1"])
        .checkpoint("C2", &["A1"])
        .checkpoint("C3", &["A2"])
        .marshal("M", "Morgan", &["C1"])
        .marshal("P", "Pat", &["C1"])
        .marshal("Q", "Quinn", &["C2"])
        .marshal("R", "Riley", &["C3"])
        .marshal("L", "Lee", &[])
        .lead("L", "A1")
        .build()
}

/// - X: one radio per C1, otherwise everyone in A1 for themselves
/// - H: everyone reads the briefing, per area
/// - S: sign in, linked to check-in at the marshal's checkpoint
/// - W: one sweep per area for A1
pub fn scenario_items() -> Vec<ChecklistItem> {
    vec![
        item(
            "X",
            "Collect radio",
            vec![scope(Scope::OnePerCheckpoint, &["C1"]), scope(Scope::EveryoneInAreas, &["A1"])],
        )
        .with_order(1),
        item("H", "Read safety briefing", vec![scope(Scope::EveryoneInAreas, &[ALL_AREAS])]).with_order(2),
        item("S", "Sign in at post", vec![scope(Scope::OnePerCheckpoint, &[ALL_CHECKPOINTS])])
            .with_order(3)
            .linked_to_check_in(None),
        item("W", "Sweep area for litter", vec![scope(Scope::OnePerArea, &["A1"])]).with_order(4),
    ]
}

pub fn scenario_notes() -> Vec<Note> {
    vec![
        Note {
            id: "N1".into(),
            event_id: EVENT.into(),
            title: "Parking".into(),
            content: "Use the north lot".into(),
            is_pinned: false,
            display_order: 1,
            scope_configurations: vec![scope(Scope::EveryoneInAreas, &["A1"])],
        },
        Note {
            id: "N2".into(),
            event_id: EVENT.into(),
            title: "Riley only".into(),
            content: String::new(),
            is_pinned: true,
            display_order: 2,
            scope_configurations: vec![scope(Scope::SpecificPeople, &["R"])],
        },
    ]
}

pub fn scenario_contacts() -> Vec<Contact> {
    vec![Contact {
        id: "K1".into(),
        event_id: EVENT.into(),
        name: "Event control".into(),
        role: "Control".into(),
        phone: Some("0100".into()),
        email: None,
        display_order: 1,
        scope_configurations: vec![scope(Scope::EveryoneAtCheckpoints, &[ALL_CHECKPOINTS])],
    }]
}

pub fn scenario_snapshot() -> EventSnapshot {
    EventSnapshot {
        roster: scenario_roster(),
        checklist_items: scenario_items(),
        notes: scenario_notes(),
        contacts: scenario_contacts(),
        completions: Vec::new(),
    }
}

/// Engine over memory stores, stores kept reachable for assertions
pub struct TestEngine {
    pub engine: Arc<ChecklistEngine>,
    pub directory: Arc<MemoryDirectory>,
    pub completions: Arc<MemoryCompletionStore>,
    pub check_ins: Arc<MemoryCheckInLedger>,
}

impl TestEngine {
    pub fn new(snapshot: EventSnapshot) -> Self {
        Self::with_config(snapshot, EngineConfig::default())
    }

    pub fn scenario() -> Self {
        Self::new(scenario_snapshot())
    }

    pub fn with_config(snapshot: EventSnapshot, config: EngineConfig) -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        let completions = Arc::new(MemoryCompletionStore::new());
        completions.seed(&snapshot.roster.event_id, snapshot.completions.clone());
        directory.insert(snapshot);
        let check_ins = Arc::new(MemoryCheckInLedger::new());

        let engine = ChecklistEngine::new(directory.clone(), completions.clone(), check_ins.clone()).with_config(config);
        Self {
            engine: Arc::new(engine),
            directory,
            completions,
            check_ins,
        }
    }

    pub fn event(&self) -> EventId {
        EVENT.into()
    }

    /// Active records per key; more than one would break the store contract
    pub fn active_per_key(&self) -> Vec<(CompletionKey, usize)> {
        let mut counts: Vec<(CompletionKey, usize)> = Vec::new();
        for record in self.completions.all_records(&self.event()) {
            if !record.value.is_active() {
                continue;
            }
            let key = record.value.key();
            match counts.iter_mut().find(|(k, _)| k == &key) {
                Some((_, n)) => *n += 1,
                None => counts.push((key, 1)),
            }
        }
        counts
    }
}

/// Completion store that loses the next `n` conditional writes
pub struct ConflictingStore {
    inner: Arc<MemoryCompletionStore>,
    conflicts: AtomicUsize,
}

impl ConflictingStore {
    pub fn new(inner: Arc<MemoryCompletionStore>, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts: AtomicUsize::new(conflicts),
        }
    }

    pub fn remaining(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionStore for ConflictingStore {
    async fn active_completions(&self, event_id: &EventId) -> Result<Vec<ChecklistCompletion>, StoreError> {
        self.inner.active_completions(event_id).await
    }

    async fn get(
        &self,
        event_id: &EventId,
        key: &CompletionKey,
    ) -> Result<Option<Versioned<ChecklistCompletion>>, StoreError> {
        self.inner.get(event_id, key).await
    }

    async fn put(
        &self,
        event_id: &EventId,
        record: ChecklistCompletion,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let lose = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lose {
            return Err(StoreError::Conflict {
                key: record.key().row_key(),
                expected,
                actual: expected.map(|v| v + 1),
            });
        }
        self.inner.put(event_id, record, expected).await
    }

    async fn purge_item(&self, event_id: &EventId, item_id: &ItemId) -> Result<usize, StoreError> {
        self.inner.purge_item(event_id, item_id).await
    }
}

/// Transport answering from a script, `Ok` once the script runs out
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(), TransportError>>>,
    sent: Mutex<Vec<OfflineAction>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Result<(), TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(times: usize, status: u16) -> Self {
        Self::new(std::iter::repeat_with(|| Err(TransportError::Status(status))).take(times))
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent(&self) -> Vec<OfflineAction> {
        self.sent.lock().clone()
    }
}

#[async_trait::async_trait]
impl ActionTransport for ScriptedTransport {
    async fn send(&self, action: &OfflineAction) -> Result<(), TransportError> {
        self.sent.lock().push(action.clone());
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}
