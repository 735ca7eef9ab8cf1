//! Event snapshots
//!
//! A snapshot is the JSON document an event's definitions are exchanged in:
//! roster, checklist items, notes, contacts and (optionally) completions.
//! [`EventSnapshot::from_json`] loads it strictly. [`lint_snapshot`] walks the
//! raw document instead and reports every invalid record, so one bad scope
//! configuration does not hide the rest.

use crate::completion::ChecklistCompletion;
use crate::item::ChecklistItem;
use marshal_scope::{validate_configurations, validate_read_only, Contact, EventRoster, Note, RawScopeConfiguration};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Everything known about one event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    /// Roster
    pub roster: EventRoster,
    /// Checklist item definitions
    #[serde(default)]
    pub checklist_items: Vec<ChecklistItem>,
    /// Notes
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Contacts
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Completion records, active or not
    #[serde(default)]
    pub completions: Vec<ChecklistCompletion>,
}

impl EventSnapshot {
    /// Parse and validate a snapshot document
    ///
    /// # Errors
    /// Any JSON or scope configuration error, or an item failing
    /// [`ChecklistItem::validate`] (reported as a custom serde error)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: Self = serde_json::from_str(json)?;
        for item in &snapshot.checklist_items {
            item.validate().map_err(serde::de::Error::custom)?;
        }
        Ok(snapshot)
    }
}

/// Kind of record an issue was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordKind {
    /// Checklist item
    ChecklistItem,
    /// Note
    Note,
    /// Contact
    Contact,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::ChecklistItem => "checklist item",
            RecordKind::Note => "note",
            RecordKind::Contact => "contact",
        };
        f.write_str(name)
    }
}

/// One invalid record found by [`lint_snapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIssue {
    /// Record kind
    pub kind: RecordKind,
    /// Record id (empty when missing)
    pub id: String,
    /// Failing configuration index, when the issue is in one
    pub index: Option<usize>,
    /// Description
    pub message: String,
}

impl fmt::Display for SnapshotIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{} {} configuration #{}: {}", self.kind, self.id, index, self.message),
            None => write!(f, "{} {}: {}", self.kind, self.id, self.message),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    scope_configurations: Vec<RawScopeConfiguration>,
}

/// Report every invalid record in a snapshot document
///
/// # Errors
/// Only when the document is not JSON or its collections are not arrays of
/// objects; per-record problems are returned as issues.
pub fn lint_snapshot(json: &str) -> Result<Vec<SnapshotIssue>, serde_json::Error> {
    let document: Value = serde_json::from_str(json)?;
    let mut issues = Vec::new();

    for (field, kind) in [
        ("checklistItems", RecordKind::ChecklistItem),
        ("notes", RecordKind::Note),
        ("contacts", RecordKind::Contact),
    ] {
        let Some(records) = document.get(field) else {
            continue;
        };
        let records: Vec<Value> = serde_json::from_value(records.clone())?;
        for value in records {
            lint_record(kind, value, &mut issues)?;
        }
    }

    Ok(issues)
}

fn lint_record(kind: RecordKind, value: Value, issues: &mut Vec<SnapshotIssue>) -> Result<(), serde_json::Error> {
    let raw: RawRecord = serde_json::from_value(value.clone())?;
    let id = raw.id;

    let configs = match validate_configurations(raw.scope_configurations) {
        Ok(configs) => configs,
        Err(err) => {
            issues.push(SnapshotIssue {
                kind,
                id,
                index: err.index(),
                message: root_message(&err),
            });
            return Ok(());
        }
    };

    match kind {
        RecordKind::ChecklistItem => match serde_json::from_value::<ChecklistItem>(value) {
            Ok(item) => {
                if let Err(err) = item.validate() {
                    issues.push(SnapshotIssue {
                        kind,
                        id,
                        index: None,
                        message: err.to_string(),
                    });
                }
            }
            Err(err) => issues.push(SnapshotIssue {
                kind,
                id,
                index: None,
                message: err.to_string(),
            }),
        },
        RecordKind::Note | RecordKind::Contact => {
            if let Err(err) = validate_read_only(&configs) {
                issues.push(SnapshotIssue {
                    kind,
                    id,
                    index: err.index(),
                    message: root_message(&err),
                });
            }
        }
    }
    Ok(())
}

fn root_message(err: &marshal_scope::ScopeError) -> String {
    match err {
        marshal_scope::ScopeError::AtIndex { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
