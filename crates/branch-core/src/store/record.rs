//! Persisted item records

use serde::{Deserialize, Serialize};

use crate::branding::{Decoration, Decorations};
use crate::model::{ItemInfo, ItemPath};
use crate::provider::Revision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Organization,
    Project,
    Branch,
}

/// Stored state of one item.
///
/// Build history is not part of the record; only the revision of the last
/// indexing build is kept so a restart does not rebuild unchanged branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub kind: ItemKind,
    pub path: ItemPath,
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_built_revision: Option<Revision>,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<Decoration>,
}

impl ItemRecord {
    pub fn new(kind: ItemKind, path: ItemPath, original_name: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            original_name: original_name.into(),
            identity: None,
            revision: None,
            last_built_revision: None,
            obsolete: false,
            indexed: false,
            decorations: Vec::new(),
        }
    }

    pub(crate) fn from_info(kind: ItemKind, path: ItemPath, info: &ItemInfo) -> Self {
        Self {
            identity: info.identity.clone(),
            obsolete: info.obsolete,
            indexed: info.decorations.is_indexed(),
            decorations: info.decorations.to_vec(),
            ..Self::new(kind, path, info.original_name.clone())
        }
    }

    pub(crate) fn with_revisions(
        mut self,
        revision: Option<Revision>,
        last_built_revision: Option<Revision>,
    ) -> Self {
        self.revision = revision;
        self.last_built_revision = last_built_revision;
        self
    }

    /// Encoded name of the item.
    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub(crate) fn info(&self) -> ItemInfo {
        ItemInfo {
            name: self.name().to_string(),
            original_name: self.original_name.clone(),
            identity: self.identity.clone(),
            decorations: Decorations::restore(self.decorations.iter().cloned(), self.indexed),
            obsolete: self.obsolete,
        }
    }
}
