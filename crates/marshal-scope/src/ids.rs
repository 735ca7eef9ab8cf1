//! Identifier newtypes
//!
//! Every record the core touches is keyed by an opaque string id handed out by
//! the surrounding record store. Wrapping them keeps a checkpoint id from being
//! passed where an area id is expected.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create id from any string-like value
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Event identifier (partition key of every record)
    EventId
);
string_id!(
    /// Marshal (volunteer) identifier
    MarshalId
);
string_id!(
    /// Checkpoint (location) identifier
    CheckpointId
);
string_id!(
    /// Area (group of checkpoints) identifier
    AreaId
);
string_id!(
    /// Checklist item identifier
    ItemId
);
string_id!(
    /// Note identifier
    NoteId
);
string_id!(
    /// Contact identifier
    ContactId
);
