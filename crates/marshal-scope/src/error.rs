//! Error types for scope configuration
//!
//! A malformed configuration is rejected where it enters the system (admin
//! write, snapshot load). A configuration that simply does not match a viewer
//! is not an error and never shows up here.

use crate::scope::{ItemType, Scope};

/// Scope configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// `scope` is not one of the known kinds
    #[error("unknown scope: {0:?}")]
    UnknownScope(String),

    /// `itemType` is not one of the known kinds
    #[error("unknown item type: {0:?}")]
    UnknownItemType(String),

    /// `itemType` disagrees with the scope family
    #[error("scope {scope} requires item type {expected}, got {actual}")]
    ItemTypeMismatch {
        /// Configured scope
        scope: Scope,
        /// Item type the scope family requires
        expected: ItemType,
        /// Item type found on the configuration
        actual: ItemType,
    },

    /// `itemType` absent while concrete ids are listed
    #[error("scope {scope} lists concrete ids but has no item type")]
    MissingItemType {
        /// Configured scope
        scope: Scope,
    },

    /// No ids at all
    #[error("scope {scope} has no ids")]
    EmptyIds {
        /// Configured scope
        scope: Scope,
    },

    /// A sentinel from another family, e.g. `ALL_MARSHALS` on an area scope
    #[error("sentinel {sentinel} is not valid for scope {scope}")]
    ForeignSentinel {
        /// Configured scope
        scope: Scope,
        /// Offending sentinel
        sentinel: String,
    },

    /// The family sentinel listed next to concrete ids
    #[error("sentinel {sentinel} cannot be mixed with concrete ids")]
    MixedSentinel {
        /// Offending sentinel
        sentinel: String,
    },

    /// Blank id
    #[error("scope {scope} contains a blank id")]
    BlankId {
        /// Configured scope
        scope: Scope,
    },

    /// Completion-sharing scope on read-only content
    #[error("scope {0} only applies to checklist items")]
    SharedScopeOnReadOnly(Scope),

    /// Failure located in a configuration list
    #[error("configuration #{index}: {source}")]
    AtIndex {
        /// Position in the owning list
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Attach the position within a configuration list
    #[inline]
    #[must_use]
    pub fn at(self, index: usize) -> Self {
        Self::AtIndex {
            index,
            source: Box::new(self),
        }
    }

    /// Position within the owning list, if known
    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::AtIndex { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_scope() {
        let err = ScopeError::EmptyIds {
            scope: Scope::OnePerArea,
        };
        assert_eq!(err.to_string(), "scope OnePerArea has no ids");
    }

    #[test]
    fn at_index_wraps_and_reports() {
        let err = ScopeError::UnknownScope("Bogus".into()).at(2);
        assert_eq!(err.index(), Some(2));
        assert!(err.to_string().starts_with("configuration #2"));
    }
}
