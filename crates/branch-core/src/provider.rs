//! Discovery provider interfaces
//!
//! Providers are the source of truth for which repositories and branches
//! exist. The core never talks to a source-control system directly; it calls
//! these traits and reconciles the answers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::branding::{Decoration, Icon, Metadata, ObjectMetadata};
use crate::cause::Cause;
use crate::model::ItemPath;

/// Opaque pointer to a revision (commit hash, change number, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repository reported by a navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRepository {
    /// Remote name, used verbatim for display
    pub name: String,
    /// Stable identity that survives renames, when the provider has one
    pub identity: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon_class: Option<String>,
}

impl DiscoveredRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: None,
            display_name: None,
            description: None,
            url: None,
            icon_class: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_icon_class(mut self, icon_class: impl Into<String>) -> Self {
        self.icon_class = Some(icon_class.into());
        self
    }

    /// Decorations described by the repository entry itself.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(object) = ObjectMetadata::from_fields(
            self.description.clone(),
            self.url.clone(),
            self.display_name.clone(),
        ) {
            metadata.push(Decoration::ObjectMetadata(object));
        }
        if let Some(icon) = &self.icon_class {
            metadata.push(Decoration::Icon(Icon::new(icon.clone())));
        }
        metadata
    }
}

/// A branch reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBranch {
    /// Remote branch name, used verbatim for display
    pub name: String,
    /// Stable identity that survives renames, when the provider has one
    pub identity: Option<String>,
    pub revision: Revision,
    pub metadata: Metadata,
}

impl DiscoveredBranch {
    pub fn new(name: impl Into<String>, revision: Revision) -> Self {
        Self {
            name: name.into(),
            identity: None,
            revision,
            metadata: Metadata::new(),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// What a navigator is asked to enumerate.
#[derive(Debug, Clone)]
pub struct OrganizationContext {
    /// Original (unencoded) organization name
    pub organization: String,
    pub path: ItemPath,
}

/// What a source is asked to enumerate.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    /// Original (unencoded) repository name
    pub repository: String,
    pub path: ItemPath,
}

/// Failure of a provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("credentials rejected: {0}")]
    Credentials(String),

    #[error("{0}")]
    Other(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Discovers the repositories of one organization.
#[async_trait]
pub trait Navigator: Send + Sync {
    fn id(&self) -> &str;

    /// Provider-side organization this navigator enumerates.
    fn organization(&self) -> &str;

    async fn list_repositories(
        &self,
        context: &OrganizationContext,
    ) -> ProviderResult<Vec<DiscoveredRepository>>;

    /// Organization-level decorations. Providers without any return nothing.
    async fn organization_metadata(&self, _context: &OrganizationContext) -> ProviderResult<Metadata> {
        Ok(Metadata::new())
    }

    /// Source enumerating the branches of a discovered repository.
    fn source_for(&self, repository: &DiscoveredRepository) -> Arc<dyn Source>;
}

/// Discovers the branches of one repository.
#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> &str;

    /// Provider-side repository this source enumerates.
    fn repository(&self) -> &str;

    async fn list_branches(&self, context: &RepositoryContext) -> ProviderResult<Vec<DiscoveredBranch>>;

    /// Repository-level decorations (source link, description, icon).
    async fn repository_metadata(&self, _context: &RepositoryContext) -> ProviderResult<Metadata> {
        Ok(Metadata::new())
    }

    /// Decorations for the build of a branch's current revision.
    async fn revision_metadata(&self, _branch: &DiscoveredBranch) -> ProviderResult<Metadata> {
        Ok(Metadata::new())
    }

    /// Extra causes for a build of the branch's current revision.
    async fn contributed_causes(&self, _branch: &DiscoveredBranch) -> ProviderResult<Vec<Cause>> {
        Ok(Vec::new())
    }
}
