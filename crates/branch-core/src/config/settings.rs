//! Typed indexer settings

use std::fs;
use std::path::Path;
use std::time::Duration;

use branch_naming::{DEFAULT_MAX_SAFE_LENGTH, NameEncoder};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What happens to a child that is no longer discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanedItemStrategy {
    /// Remove the child (and its history) immediately
    #[default]
    Delete,
    /// Keep the child, flagged obsolete, until it is pruned or rediscovered
    MarkObsolete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    /// Maximum number of indexing passes running at once
    pub workers: usize,
    /// Seconds between periodic ticks
    pub tick_interval_secs: u64,
    pub orphaned_items: OrphanedItemStrategy,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            tick_interval_secs: 300,
            orphaned_items: OrphanedItemStrategy::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Maximum number of builds executing at once
    pub executors: usize,
    /// Request a build when a branch is first discovered
    pub build_on_create: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            executors: 2,
            build_on_create: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingSettings {
    /// Longest remote name stored verbatim
    pub max_safe_length: usize,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            max_safe_length: DEFAULT_MAX_SAFE_LENGTH,
        }
    }
}

/// Complete indexer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub indexing: IndexingSettings,
    pub builds: BuildSettings,
    pub naming: NamingSettings,
}

impl IndexerConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or holds unusable values.
    pub fn parse(content: &str) -> Result<Self> {
        let config: IndexerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::debug!(?path, "Loaded indexer configuration");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.indexing.tick_interval_secs)
    }

    pub fn encoder(&self) -> NameEncoder {
        NameEncoder::new(self.naming.max_safe_length)
    }

    fn validate(&self) -> Result<()> {
        if self.indexing.workers == 0 {
            return Err(Error::InvalidConfig {
                message: "indexing.workers must be at least 1".to_string(),
            });
        }
        if self.builds.executors == 0 {
            return Err(Error::InvalidConfig {
                message: "builds.executors must be at least 1".to_string(),
            });
        }
        if self.indexing.tick_interval_secs == 0 {
            return Err(Error::InvalidConfig {
                message: "indexing.tick_interval_secs must be at least 1".to_string(),
            });
        }
        if self.naming.max_safe_length == 0 {
            return Err(Error::InvalidConfig {
                message: "naming.max_safe_length must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
