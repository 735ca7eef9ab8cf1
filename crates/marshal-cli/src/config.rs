//! CLI configuration file
//!
//! ```toml
//! [engine]
//! check_in_link_policy = "assigned_only"
//! conflict_retries = 1
//!
//! [sync]
//! max_attempts = 5
//! request_timeout_ms = 10000
//!
//! [log]
//! level = "info"
//! format = "compact"
//! ```
//!
//! Every section and key is optional.

use anyhow::{Context, Result};
use marshal_checklist::EngineConfig;
use marshal_offline::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LogConfig {
    /// Filter directive used when `MARSHAL_LOG` is unset
    pub(crate) level: String,
    /// Output format
    pub(crate) format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MarshalConfig {
    /// Checklist engine
    pub(crate) engine: EngineConfig,
    /// Offline sync
    pub(crate) sync: SyncConfig,
    /// Logging
    pub(crate) log: LogConfig,
}

impl MarshalConfig {
    /// Parse TOML text
    pub(crate) fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load from a file, defaults when no path is given
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marshal_checklist::CheckInLinkPolicy;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(MarshalConfig::from_toml("").unwrap(), MarshalConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = MarshalConfig::from_toml(
            r#"
            [engine]
            check_in_link_policy = "never"

            [sync]
            max_attempts = 3

            [log]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.check_in_link_policy, CheckInLinkPolicy::Never);
        assert_eq!(config.engine.conflict_retries, 1);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.jitter_bounds(), (1000, 5000));
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = MarshalConfig::from_toml("[engine]\ncheck_in_link_policy = \"sometimes\"").unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nhealth_check_interval_ms = 5000").unwrap();

        let config = MarshalConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.sync.health_check_interval_ms, 5000);
        assert!(MarshalConfig::load(Some(Path::new("/nonexistent/marshal.toml"))).is_err());
    }
}
