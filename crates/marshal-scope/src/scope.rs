//! Scope configuration model
//!
//! A [`ScopeConfiguration`] is one declarative rule binding a checklist item,
//! note or contact to an audience. On the wire it is a loose
//! `{ scope, itemType, ids }` record ([`RawScopeConfiguration`]); it is
//! validated into the typed form as soon as it is deserialized, so the matcher
//! never inspects raw strings.

use crate::error::ScopeError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel id meaning "every marshal"
pub const ALL_MARSHALS: &str = "ALL_MARSHALS";
/// Sentinel id meaning "every checkpoint"
pub const ALL_CHECKPOINTS: &str = "ALL_CHECKPOINTS";
/// Sentinel id meaning "every area"
pub const ALL_AREAS: &str = "ALL_AREAS";

const SENTINELS: [&str; 3] = [ALL_MARSHALS, ALL_CHECKPOINTS, ALL_AREAS];

/// Audience / completion rule kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every marshal assigned within the listed areas, each on their own
    EveryoneInAreas,
    /// Every marshal at the listed checkpoints, each on their own
    EveryoneAtCheckpoints,
    /// Explicitly listed marshals
    SpecificPeople,
    /// One shared completion per checkpoint
    OnePerCheckpoint,
    /// One shared completion per area
    OnePerArea,
    /// One shared completion per area, by one of its leads
    OneLeadPerArea,
    /// Area leads of the listed areas, shared per area
    EveryAreaLead,
}

impl Scope {
    /// All kinds, in declaration order
    pub const ALL: [Scope; 7] = [
        Scope::EveryoneInAreas,
        Scope::EveryoneAtCheckpoints,
        Scope::SpecificPeople,
        Scope::OnePerCheckpoint,
        Scope::OnePerArea,
        Scope::OneLeadPerArea,
        Scope::EveryAreaLead,
    ];

    /// Item type the ids of this scope refer to
    #[inline]
    #[must_use]
    pub fn item_type(self) -> ItemType {
        match self {
            Scope::SpecificPeople => ItemType::Marshal,
            Scope::EveryoneAtCheckpoints | Scope::OnePerCheckpoint => ItemType::Checkpoint,
            Scope::EveryoneInAreas
            | Scope::OnePerArea
            | Scope::OneLeadPerArea
            | Scope::EveryAreaLead => ItemType::Area,
        }
    }

    /// Whether one completion is shared by the whole group
    #[inline]
    #[must_use]
    pub fn is_shared(self) -> bool {
        matches!(
            self,
            Scope::OnePerCheckpoint
                | Scope::OnePerArea
                | Scope::OneLeadPerArea
                | Scope::EveryAreaLead
        )
    }

    /// Whether only a lead of the matched area may complete it
    #[inline]
    #[must_use]
    pub fn is_lead_only(self) -> bool {
        matches!(self, Scope::OneLeadPerArea | Scope::EveryAreaLead)
    }

    /// Whether the scope is meaningful for read-only content (notes, contacts)
    #[inline]
    #[must_use]
    pub fn applies_to_read_only(self) -> bool {
        matches!(
            self,
            Scope::EveryoneInAreas
                | Scope::EveryoneAtCheckpoints
                | Scope::SpecificPeople
                | Scope::EveryAreaLead
        )
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::EveryoneInAreas => "EveryoneInAreas",
            Scope::EveryoneAtCheckpoints => "EveryoneAtCheckpoints",
            Scope::SpecificPeople => "SpecificPeople",
            Scope::OnePerCheckpoint => "OnePerCheckpoint",
            Scope::OnePerArea => "OnePerArea",
            Scope::OneLeadPerArea => "OneLeadPerArea",
            Scope::EveryAreaLead => "EveryAreaLead",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| ScopeError::UnknownScope(s.to_string()))
    }
}

/// What the ids of a configuration refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    /// Marshal ids
    Marshal,
    /// Checkpoint ids
    Checkpoint,
    /// Area ids
    Area,
}

impl ItemType {
    /// Specificity of a configuration carrying this item type
    #[inline]
    #[must_use]
    pub fn specificity(self) -> Specificity {
        match self {
            ItemType::Marshal => Specificity::Marshal,
            ItemType::Checkpoint => Specificity::Checkpoint,
            ItemType::Area => Specificity::Area,
        }
    }

    /// The "all" sentinel of this family
    #[inline]
    #[must_use]
    pub fn sentinel(self) -> &'static str {
        match self {
            ItemType::Marshal => ALL_MARSHALS,
            ItemType::Checkpoint => ALL_CHECKPOINTS,
            ItemType::Area => ALL_AREAS,
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Marshal => "Marshal",
            ItemType::Checkpoint => "Checkpoint",
            ItemType::Area => "Area",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Marshal" => Ok(ItemType::Marshal),
            "Checkpoint" => Ok(ItemType::Checkpoint),
            "Area" => Ok(ItemType::Area),
            other => Err(ScopeError::UnknownItemType(other.to_string())),
        }
    }
}

/// Rank used by Most Specific Wins; lower wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Specificity {
    /// Marshal-targeted
    Marshal = 1,
    /// Checkpoint-targeted
    Checkpoint = 2,
    /// Area-targeted
    Area = 3,
    /// No item type
    Unspecified = 4,
}

impl Specificity {
    /// Numeric rank (1 = most specific)
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Loose wire form of a scope configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScopeConfiguration {
    /// Scope kind name
    pub scope: String,
    /// Item type name, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    /// Ids, possibly a sentinel
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Validated set of targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTargets {
    /// The family sentinel: everything of that item type
    All,
    /// Concrete ids, in configuration order
    Ids(IndexSet<String>),
}

impl ScopeTargets {
    /// Whether `id` is covered
    #[inline]
    #[must_use]
    pub fn covers(&self, id: &str) -> bool {
        match self {
            ScopeTargets::All => true,
            ScopeTargets::Ids(ids) => ids.contains(id),
        }
    }

    /// First covered candidate
    ///
    /// Concrete ids are tried in configuration order; with the sentinel the
    /// candidates' own order decides.
    pub fn first_covered<'a, T, I>(&self, candidates: I) -> Option<&'a T>
    where
        T: AsRef<str> + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        match self {
            ScopeTargets::All => candidates.into_iter().next(),
            ScopeTargets::Ids(ids) => {
                let candidates: Vec<&'a T> = candidates.into_iter().collect();
                ids.iter().find_map(|id| {
                    candidates.iter().copied().find(|candidate| {
                        let candidate: &str = (*candidate).as_ref();
                        candidate == id.as_str()
                    })
                })
            }
        }
    }

    /// Whether this is the sentinel
    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, ScopeTargets::All)
    }
}

/// One validated scope rule
///
/// Serializes as [`RawScopeConfiguration`] and validates on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScopeConfiguration", into = "RawScopeConfiguration")]
pub struct ScopeConfiguration {
    scope: Scope,
    item_type: Option<ItemType>,
    targets: ScopeTargets,
}

impl ScopeConfiguration {
    /// Validate a configuration from its parts
    ///
    /// # Errors
    /// Any [`ScopeError`] validation failure
    pub fn new<I, S>(scope: Scope, item_type: Option<ItemType>, ids: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::try_from(RawScopeConfiguration {
            scope: scope.as_str().to_string(),
            item_type: item_type.map(|t| t.as_str().to_string()),
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    /// Validate a configuration whose item type follows the scope family
    ///
    /// # Errors
    /// Any [`ScopeError`] validation failure
    pub fn for_ids<I, S>(scope: Scope, ids: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(scope, Some(scope.item_type()), ids)
    }

    /// Audience-wide rule without an item type (least specific)
    #[must_use]
    pub fn audience_wide(scope: Scope) -> Self {
        Self {
            scope,
            item_type: None,
            targets: ScopeTargets::All,
        }
    }

    /// Scope kind
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Configured item type
    #[inline]
    #[must_use]
    pub fn item_type(&self) -> Option<ItemType> {
        self.item_type
    }

    /// Validated targets
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &ScopeTargets {
        &self.targets
    }

    /// Most Specific Wins rank
    #[inline]
    #[must_use]
    pub fn specificity(&self) -> Specificity {
        self.item_type
            .map_or(Specificity::Unspecified, ItemType::specificity)
    }
}

impl TryFrom<RawScopeConfiguration> for ScopeConfiguration {
    type Error = ScopeError;

    fn try_from(raw: RawScopeConfiguration) -> Result<Self, Self::Error> {
        let scope: Scope = raw.scope.parse()?;
        let family = scope.item_type();

        let item_type = raw
            .item_type
            .as_deref()
            .map(ItemType::from_str)
            .transpose()?;

        if let Some(actual) = item_type {
            if actual != family {
                return Err(ScopeError::ItemTypeMismatch {
                    scope,
                    expected: family,
                    actual,
                });
            }
        }

        if raw.ids.is_empty() {
            return Err(ScopeError::EmptyIds { scope });
        }

        let mut ids = IndexSet::with_capacity(raw.ids.len());
        let mut saw_sentinel = false;
        for id in raw.ids {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                return Err(ScopeError::BlankId { scope });
            }
            if SENTINELS.contains(&trimmed) {
                if trimmed != family.sentinel() {
                    return Err(ScopeError::ForeignSentinel {
                        scope,
                        sentinel: trimmed.to_string(),
                    });
                }
                saw_sentinel = true;
                continue;
            }
            ids.insert(trimmed.to_string());
        }

        let targets = match (saw_sentinel, ids.is_empty()) {
            (true, true) => ScopeTargets::All,
            (true, false) => {
                return Err(ScopeError::MixedSentinel {
                    sentinel: family.sentinel().to_string(),
                })
            }
            (false, _) => {
                if item_type.is_none() {
                    return Err(ScopeError::MissingItemType { scope });
                }
                ScopeTargets::Ids(ids)
            }
        };

        Ok(Self {
            scope,
            item_type,
            targets,
        })
    }
}

impl From<ScopeConfiguration> for RawScopeConfiguration {
    fn from(config: ScopeConfiguration) -> Self {
        let ids = match config.targets {
            ScopeTargets::All => vec![config.scope.item_type().sentinel().to_string()],
            ScopeTargets::Ids(ids) => ids.into_iter().collect(),
        };
        Self {
            scope: config.scope.as_str().to_string(),
            item_type: config.item_type.map(|t| t.as_str().to_string()),
            ids,
        }
    }
}

/// Validate an ordered configuration list
///
/// An empty list is valid and means "visible to no one".
///
/// # Errors
/// The first failure, wrapped with its position via [`ScopeError::AtIndex`]
pub fn validate_configurations(
    raw: Vec<RawScopeConfiguration>,
) -> Result<Vec<ScopeConfiguration>, ScopeError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, config)| ScopeConfiguration::try_from(config).map_err(|e| e.at(index)))
        .collect()
}

/// Check that a list only uses scopes meaningful for read-only content
///
/// # Errors
/// [`ScopeError::SharedScopeOnReadOnly`] wrapped with its position
pub fn validate_read_only(configs: &[ScopeConfiguration]) -> Result<(), ScopeError> {
    for (index, config) in configs.iter().enumerate() {
        if !config.scope().applies_to_read_only() {
            return Err(ScopeError::SharedScopeOnReadOnly(config.scope()).at(index));
        }
    }
    Ok(())
}
