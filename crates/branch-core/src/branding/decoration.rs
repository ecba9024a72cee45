//! Decoration kinds and values

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of decoration kinds an item can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecorationKind {
    OrganizationLink,
    SourceLink,
    BranchLink,
    RevisionLink,
    ObjectMetadata,
    Icon,
}

impl DecorationKind {
    pub const ALL: [DecorationKind; 6] = [
        Self::OrganizationLink,
        Self::SourceLink,
        Self::BranchLink,
        Self::RevisionLink,
        Self::ObjectMetadata,
        Self::Icon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrganizationLink => "organization-link",
            Self::SourceLink => "source-link",
            Self::BranchLink => "branch-link",
            Self::RevisionLink => "revision-link",
            Self::ObjectMetadata => "object-metadata",
            Self::Icon => "icon",
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(
            self,
            Self::OrganizationLink | Self::SourceLink | Self::BranchLink | Self::RevisionLink
        )
    }
}

impl fmt::Display for DecorationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link back to the provider's view of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Description, URL and display name of a remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ObjectMetadata {
    /// Build object metadata from optional fields, `None` when all are absent.
    pub fn from_fields(
        description: Option<String>,
        url: Option<String>,
        display_name: Option<String>,
    ) -> Option<Self> {
        let metadata = Self {
            description,
            url,
            display_name,
        };
        (!metadata.is_empty()).then_some(metadata)
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.url.is_none() && self.display_name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub class_name: String,
}

impl Icon {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }
}

/// One decoration value; the variant determines its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Decoration {
    OrganizationLink(Link),
    SourceLink(Link),
    BranchLink(Link),
    RevisionLink(Link),
    ObjectMetadata(ObjectMetadata),
    Icon(Icon),
}

impl Decoration {
    pub fn kind(&self) -> DecorationKind {
        match self {
            Self::OrganizationLink(_) => DecorationKind::OrganizationLink,
            Self::SourceLink(_) => DecorationKind::SourceLink,
            Self::BranchLink(_) => DecorationKind::BranchLink,
            Self::RevisionLink(_) => DecorationKind::RevisionLink,
            Self::ObjectMetadata(_) => DecorationKind::ObjectMetadata,
            Self::Icon(_) => DecorationKind::Icon,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Self::OrganizationLink(link)
            | Self::SourceLink(link)
            | Self::BranchLink(link)
            | Self::RevisionLink(link) => Some(link),
            _ => None,
        }
    }
}

/// Decorations attached to one item, at most one per kind.
///
/// `indexed` records whether any indexing pass has run for the item, so an
/// item that was indexed with no metadata can be told apart from one that
/// was never indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decorations {
    entries: BTreeMap<DecorationKind, Decoration>,
    indexed: bool,
}

impl Decorations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted values.
    pub fn restore(values: impl IntoIterator<Item = Decoration>, indexed: bool) -> Self {
        Self {
            entries: values.into_iter().map(|d| (d.kind(), d)).collect(),
            indexed,
        }
    }

    pub fn get(&self, kind: DecorationKind) -> Option<&Decoration> {
        self.entries.get(&kind)
    }

    pub fn link(&self, kind: DecorationKind) -> Option<&Link> {
        self.get(kind).and_then(Decoration::as_link)
    }

    pub fn object_metadata(&self) -> Option<&ObjectMetadata> {
        match self.get(DecorationKind::ObjectMetadata) {
            Some(Decoration::ObjectMetadata(metadata)) => Some(metadata),
            _ => None,
        }
    }

    pub fn icon(&self) -> Option<&Icon> {
        match self.get(DecorationKind::Icon) {
            Some(Decoration::Icon(icon)) => Some(icon),
            _ => None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<Decoration> {
        self.entries.values().cloned().collect()
    }

    /// Attach or replace; returns whether the stored value changed.
    pub(crate) fn set(&mut self, decoration: Decoration) -> bool {
        let kind = decoration.kind();
        if self.entries.get(&kind) == Some(&decoration) {
            return false;
        }
        self.entries.insert(kind, decoration);
        true
    }

    /// Remove a kind; returns whether anything was attached.
    pub(crate) fn remove(&mut self, kind: DecorationKind) -> bool {
        self.entries.remove(&kind).is_some()
    }

    /// Returns true the first time it is called.
    pub(crate) fn mark_indexed(&mut self) -> bool {
        !std::mem::replace(&mut self.indexed, true)
    }
}
