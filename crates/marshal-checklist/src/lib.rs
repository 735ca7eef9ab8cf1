//! Marshal Checklist - completion semantics for scoped checklist items
//!
//! Builds on `marshal-scope` to answer "what does done mean" for an item:
//! - [`resolve_context`]: winning scope match to [`CompletionContext`]
//! - [`ChecklistCompletion`]: one record per context, soft-deleted on undo
//! - [`expand`]: per-viewer task lists, with shadow rows for area leads
//! - [`ChecklistEngine`]: the read and write operations over pluggable stores
//!
//! # Example
//!
//! ```rust
//! use marshal_checklist::{
//!     ChecklistEngine, ChecklistItem, CompletionRequest, EventSnapshot, MemoryCheckInLedger,
//!     MemoryCompletionStore, MemoryDirectory,
//! };
//! use marshal_scope::{Assignment, Checkpoint, EventRoster, Marshal, Scope, ScopeConfiguration};
//! use std::sync::Arc;
//!
//! let mut roster = EventRoster::new("E1".into());
//! roster.checkpoints.push(Checkpoint { id: "C1".into(), name: "Gate".into(), area_ids: vec![] });
//! roster.marshals.push(Marshal { id: "M".into(), name: "Morgan".into() });
//! roster.assignments.push(Assignment { marshal_id: "M".into(), checkpoint_id: "C1".into() });
//!
//! let item = ChecklistItem::new("X", "E1", "Collect radio")
//!     .with_scope(ScopeConfiguration::for_ids(Scope::OnePerCheckpoint, ["C1"]).unwrap());
//!
//! let directory = MemoryDirectory::new();
//! directory.insert(EventSnapshot { roster, checklist_items: vec![item], ..Default::default() });
//! let engine = ChecklistEngine::new(
//!     Arc::new(directory),
//!     Arc::new(MemoryCompletionStore::new()),
//!     Arc::new(MemoryCheckInLedger::new()),
//! );
//! let _request = CompletionRequest::new("E1", "X", "M");
//! # let _ = engine;
//! ```

#![warn(unreachable_pub)]

pub mod completion;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod expand;
pub mod item;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use completion::{
    validate_transition, Actor, ActorRef, ActorType, ChecklistCompletion, CompletionCycle, CompletionState,
};
pub use config::{CheckInLinkPolicy, EngineConfig};
pub use context::{resolve_context, CompletionContext, CompletionKey, ContextRef, ContextType};
pub use engine::{
    CheckInOutcome, CheckInSkip, ChecklistEngine, CompletionOutcome, CompletionRequest, CompletionResult,
    LinkedCheckIn,
};
pub use error::{ChecklistError, StoreError};
pub use expand::{expand, may_complete, resolve_item, CompletionIndex, TaskInstance};
pub use item::ChecklistItem;
pub use memory::{MemoryCheckInLedger, MemoryCompletionStore, MemoryDirectory};
pub use snapshot::{lint_snapshot, EventSnapshot, RecordKind, SnapshotIssue};
pub use store::{CheckInLedger, CompletionStore, EventDirectory, Versioned};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
