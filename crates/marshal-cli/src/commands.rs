//! Snapshot subcommands: validate, tasks, notes, contacts

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use marshal_checklist::{
    lint_snapshot, ChecklistEngine, EngineConfig, EventSnapshot, MemoryCheckInLedger, MemoryCompletionStore,
    MemoryDirectory, TaskInstance,
};
use marshal_scope::{EventId, MarshalId};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Engine over one snapshot held in memory
pub(crate) struct SnapshotEngine {
    pub(crate) engine: ChecklistEngine,
    pub(crate) event_id: EventId,
}

impl SnapshotEngine {
    pub(crate) fn load(path: &Path, config: EngineConfig) -> Result<Self> {
        let snapshot =
            EventSnapshot::from_json(&read(path)?).with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self::new(snapshot, config))
    }

    pub(crate) fn new(snapshot: EventSnapshot, config: EngineConfig) -> Self {
        let event_id = snapshot.roster.event_id.clone();
        let completions = MemoryCompletionStore::new();
        completions.seed(&event_id, snapshot.completions.clone());
        let directory = MemoryDirectory::new();
        directory.insert(snapshot);

        let engine = ChecklistEngine::new(
            Arc::new(directory),
            Arc::new(completions),
            Arc::new(MemoryCheckInLedger::new()),
        )
        .with_config(config);
        Self { engine, event_id }
    }
}

/// Lint a snapshot, returning whether it is clean
pub(crate) fn validate(path: &Path, json: bool) -> Result<bool> {
    let issues = lint_snapshot(&read(path)?).with_context(|| format!("Failed to parse {}", path.display()))?;

    if json {
        print_json(&issues)?;
    } else if issues.is_empty() {
        println!("{}: ok", path.display());
    } else {
        for issue in &issues {
            println!("{issue}");
        }
        println!("{} issue(s)", issues.len());
    }
    Ok(issues.is_empty())
}

fn task_line(task: &TaskInstance) -> String {
    let mark = if task.is_completed { "x" } else { " " };
    let mut line = format!("[{mark}] {:>3} {} ({})", task.display_order, task.text, task.context);
    if let Some(owner) = &task.shadow_for {
        line.push_str(&format!(" for {owner}"));
    }
    if let Some(by) = &task.completed_by {
        line.push_str(&format!(" by {}", by.actor_name));
    }
    if task.is_overdue {
        line.push_str(" OVERDUE");
    }
    if !task.can_be_completed_by_me {
        line.push_str(" locked");
    }
    line
}

pub(crate) async fn tasks(
    snapshot: &SnapshotEngine,
    marshal: &MarshalId,
    at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let now = at.unwrap_or_else(Utc::now);
    let tasks = snapshot
        .engine
        .tasks_for_viewer_at(&snapshot.event_id, marshal, now)
        .await?;

    if json {
        return print_json(&tasks);
    }
    for task in &tasks {
        println!("{}", task_line(task));
    }
    Ok(())
}

pub(crate) async fn notes(snapshot: &SnapshotEngine, marshal: &MarshalId, json: bool) -> Result<()> {
    let notes = snapshot.engine.visible_notes(&snapshot.event_id, marshal).await?;
    if json {
        return print_json(&notes);
    }
    for note in &notes {
        let pin = if note.item.is_pinned { "*" } else { " " };
        println!("{pin} {} [{}]", note.item.title, note.matched_scope);
    }
    Ok(())
}

pub(crate) async fn contacts(snapshot: &SnapshotEngine, marshal: &MarshalId, json: bool) -> Result<()> {
    let contacts = snapshot.engine.visible_contacts(&snapshot.event_id, marshal).await?;
    if json {
        return print_json(&contacts);
    }
    for contact in &contacts {
        let phone = contact.item.phone.as_deref().unwrap_or("-");
        println!("{} ({}) {}", contact.item.name, contact.item.role, phone);
    }
    Ok(())
}
