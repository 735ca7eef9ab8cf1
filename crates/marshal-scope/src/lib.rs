//! Marshal Scope - audience rules for checklist items, notes and contacts
//!
//! Provides the pieces that decide who sees what:
//! - Identifier newtypes and the event roster
//! - [`Viewer`]: a marshal with their checkpoints, areas and lead roles
//! - [`ScopeConfiguration`]: validated declarative audience rule
//! - [`matches`] / [`select`]: the Scope Matcher with Most Specific Wins
//! - [`filter_visible`]: the note/contact visibility filter
//!
//! # Example
//!
//! ```rust
//! use marshal_scope::{select, Scope, ScopeConfiguration, Viewer};
//!
//! let configs = vec![
//!     ScopeConfiguration::for_ids(Scope::OnePerCheckpoint, ["C1"]).unwrap(),
//!     ScopeConfiguration::for_ids(Scope::EveryoneInAreas, ["A1"]).unwrap(),
//! ];
//! let viewer = Viewer::new("M").at_checkpoint("C1").in_area("A1");
//!
//! let selected = select(&configs, &viewer).unwrap();
//! assert_eq!(selected.scope(), Scope::OnePerCheckpoint);
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod ids;
pub mod matcher;
pub mod roster;
pub mod scope;
pub mod visibility;

pub use error::ScopeError;
pub use ids::{AreaId, CheckpointId, ContactId, EventId, ItemId, MarshalId, NoteId};
pub use matcher::{matches, select, select_where, Anchor, MatchResult, ScopeMatch};
pub use roster::{AreaLead, Assignment, Checkpoint, EventRoster, Marshal, Viewer};
pub use scope::{
    validate_configurations, validate_read_only, ItemType, RawScopeConfiguration, Scope,
    ScopeConfiguration, ScopeTargets, Specificity, ALL_AREAS, ALL_CHECKPOINTS, ALL_MARSHALS,
};
pub use visibility::{filter_visible, Contact, Note, Scoped, Visible};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
