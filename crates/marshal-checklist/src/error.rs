//! Error types for the checklist engine
//!
//! Errors fall into two groups the sync layer cares about:
//! - permanent: the request can never succeed as sent (unknown item, not
//!   eligible, not authorized, malformed). Replaying it is pointless.
//! - transient: storage unavailable or a concurrency conflict that survived
//!   the local retry. The caller should re-fetch and try again.

use crate::completion::CompletionState;
use marshal_scope::{ItemId, MarshalId, ScopeError};

/// Storage layer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Record or partition does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Conditional write lost against a concurrent writer
    #[error("version conflict on {key}: expected {expected:?}, found {actual:?}")]
    Conflict {
        /// Row key of the contested record
        key: String,
        /// Version the writer read
        expected: Option<u64>,
        /// Version currently stored
        actual: Option<u64>,
    },

    /// Backend unreachable or failing
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Checklist engine errors
#[derive(Debug, thiserror::Error)]
pub enum ChecklistError {
    /// Item does not exist (or was deleted)
    #[error("checklist item not found: {0}")]
    ItemNotFound(ItemId),

    /// Marshal is not on the event roster
    #[error("unknown marshal: {0}")]
    UnknownMarshal(MarshalId),

    /// Checkpoint is not on the event roster
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(String),

    /// No configuration of the item matches the owner
    #[error("item {item_id} does not apply to marshal {marshal_id}")]
    NotEligible {
        /// Requested item
        item_id: ItemId,
        /// Owner the request was made for
        marshal_id: MarshalId,
    },

    /// Explicit context disagrees with the resolved one
    #[error("requested context {requested} does not match resolved context {resolved}")]
    ContextMismatch {
        /// Context named by the caller
        requested: String,
        /// Context the resolver produced
        resolved: String,
    },

    /// Actor may not act on the owner's context
    #[error("{actor} may not act for {owner}")]
    NotAuthorized {
        /// Acting id
        actor: String,
        /// Context owner
        owner: MarshalId,
    },

    /// Item's visibility window excludes now
    #[error("item {0} is outside its visibility window")]
    OutsideWindow(ItemId),

    /// Completion record asked to make a transition it does not allow
    #[error("illegal completion transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: CompletionState,
        /// Requested state
        to: CompletionState,
    },

    /// Item definition is inconsistent
    #[error("invalid checklist item: {0}")]
    InvalidItem(String),

    /// Scope configuration failed validation
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// Conditional write kept conflicting after the local retry
    #[error("concurrent update on {key}, re-fetch and retry")]
    ConcurrencyConflict {
        /// Row key of the contested record
        key: String,
    },

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChecklistError {
    /// Whether retrying the same request later may succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. }
                | Self::Store(StoreError::Unavailable(_) | StoreError::Conflict { .. })
        )
    }

    /// Whether the request can never succeed as sent
    #[inline]
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// HTTP-style status for transports
    ///
    /// Permanent errors map to 4xx, transient ones to 5xx.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ItemNotFound(_)
            | Self::UnknownMarshal(_)
            | Self::UnknownCheckpoint(_)
            | Self::Store(StoreError::NotFound(_)) => 404,
            Self::NotEligible { .. } | Self::NotAuthorized { .. } => 403,
            Self::OutsideWindow(_) | Self::IllegalTransition { .. } => 409,
            Self::ContextMismatch { .. } | Self::InvalidItem(_) | Self::Scope(_) => 400,
            Self::ConcurrencyConflict { .. }
            | Self::Store(StoreError::Unavailable(_) | StoreError::Conflict { .. }) => 503,
        }
    }
}
