//! Provider-pushed change events and their routing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::tree::{IndexTarget, ItemTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Created,
    Updated,
    Removed,
}

/// What part of the provider an event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventScope {
    /// Anything may have changed
    Global,
    Organization {
        organization: String,
    },
    Repository {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        organization: Option<String>,
        repository: String,
    },
}

/// A change notification from a provider, e.g. a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmEvent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub kind: EventKind,
    pub scope: EventScope,
    /// Who sent the event (host, hook name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ScmEvent {
    pub fn new(kind: EventKind, scope: EventScope) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            scope,
            origin: None,
            timestamp: Utc::now(),
        }
    }

    pub fn global(kind: EventKind) -> Self {
        Self::new(kind, EventScope::Global)
    }

    pub fn organization(kind: EventKind, organization: impl Into<String>) -> Self {
        Self::new(
            kind,
            EventScope::Organization {
                organization: organization.into(),
            },
        )
    }

    pub fn repository(
        kind: EventKind,
        organization: Option<&str>,
        repository: impl Into<String>,
    ) -> Self {
        Self::new(
            kind,
            EventScope::Repository {
                organization: organization.map(str::to_string),
                repository: repository.into(),
            },
        )
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Parse an event payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid event.
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Items an event should trigger a pass for.
pub(crate) fn route(tree: &ItemTree, event: &ScmEvent) -> Vec<IndexTarget> {
    match &event.scope {
        EventScope::Global => tree.items(),
        EventScope::Organization { organization } => tree
            .organizations()
            .into_iter()
            .filter(|org| org.navigates(organization))
            .map(IndexTarget::Organization)
            .collect(),
        EventScope::Repository {
            organization,
            repository,
        } => {
            let navigates = |org: &crate::model::Organization| {
                organization
                    .as_deref()
                    .is_none_or(|name| org.navigates(name))
            };

            let mut targets: Vec<IndexTarget> = tree
                .all_targets()
                .into_iter()
                .filter(|target| match target {
                    IndexTarget::Project(project) => {
                        project.has_source_for(repository)
                            && match project.organization() {
                                Some(path) => match tree.find(path) {
                                    Some(IndexTarget::Organization(org)) => navigates(&org),
                                    _ => false,
                                },
                                None => true,
                            }
                    }
                    IndexTarget::Organization(_) => false,
                })
                .collect();

            if event.kind != EventKind::Updated || targets.is_empty() {
                targets.extend(
                    tree.organizations()
                        .into_iter()
                        .filter(|org| navigates(org))
                        .map(IndexTarget::Organization),
                );
            }
            targets
        }
    }
}
