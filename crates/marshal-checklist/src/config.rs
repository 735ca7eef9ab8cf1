//! Engine configuration

use serde::{Deserialize, Serialize};

/// When completing a linked item checks its owner in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInLinkPolicy {
    /// Only when the owner is assigned to the target checkpoint
    #[default]
    AssignedOnly,
    /// For any target checkpoint on the roster
    Always,
    /// Never
    Never,
}

/// Checklist engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Linked check-in trigger
    pub check_in_link_policy: CheckInLinkPolicy,
    /// Re-reads after a conflicting conditional write
    pub conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_in_link_policy: CheckInLinkPolicy::default(),
            conflict_retries: 1,
        }
    }
}

impl EngineConfig {
    /// Create new config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With linked check-in policy
    #[inline]
    #[must_use]
    pub fn with_check_in_link_policy(mut self, policy: CheckInLinkPolicy) -> Self {
        self.check_in_link_policy = policy;
        self
    }

    /// With conflict retries
    #[inline]
    #[must_use]
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }
}
