//! Build causes and their aggregation
//!
//! Every build requested by an indexing pass records why it ran. The
//! indexing cause is always present; providers may contribute more (the user
//! who pushed, the remote host that sent a hook, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a build was started.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Cause {
    /// Requested because indexing discovered a new branch or revision
    BranchIndexing,
    /// Started on behalf of a user
    UserId {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    /// Started by a remote host
    Remote {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Started by another build finishing
    Upstream { project: String, build: u64 },
    /// Provider-specific cause
    Custom { label: String, description: String },
}

/// Discriminant of a [`Cause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CauseKind {
    BranchIndexing,
    UserId,
    Remote,
    Upstream,
    Custom,
}

impl Cause {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::UserId {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous_user() -> Self {
        Self::UserId { user_id: None }
    }

    pub fn remote(address: impl Into<String>, note: impl Into<String>) -> Self {
        Self::Remote {
            address: address.into(),
            note: Some(note.into()),
        }
    }

    pub fn kind(&self) -> CauseKind {
        match self {
            Self::BranchIndexing => CauseKind::BranchIndexing,
            Self::UserId { .. } => CauseKind::UserId,
            Self::Remote { .. } => CauseKind::Remote,
            Self::Upstream { .. } => CauseKind::Upstream,
            Self::Custom { .. } => CauseKind::Custom,
        }
    }

    /// Whether two causes describe the same reason.
    ///
    /// Causes of different kinds are never the same, even when their fields
    /// happen to hold equal values.
    pub fn same_as(&self, other: &Cause) -> bool {
        self.kind() == other.kind() && self == other
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchIndexing => write!(f, "Branch indexing"),
            Self::UserId { user_id: Some(id) } => write!(f, "Started by user {}", id),
            Self::UserId { user_id: None } => write!(f, "Started by an anonymous user"),
            Self::Remote {
                address,
                note: Some(note),
            } => write!(f, "Started by remote host {} with note: {}", address, note),
            Self::Remote {
                address,
                note: None,
            } => write!(f, "Started by remote host {}", address),
            Self::Upstream { project, build } => {
                write!(f, "Started by upstream project {} build number {}", project, build)
            }
            Self::Custom { label, description } => write!(f, "{}: {}", label, description),
        }
    }
}

/// Ordered causes of one build, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseSet {
    causes: Vec<Cause>,
}

impl CauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cause; returns false if an equivalent cause is present.
    pub fn push(&mut self, cause: Cause) -> bool {
        if self.causes.iter().any(|existing| existing.same_as(&cause)) {
            return false;
        }
        self.causes.push(cause);
        true
    }

    pub fn contains(&self, cause: &Cause) -> bool {
        self.causes.iter().any(|existing| existing.same_as(cause))
    }

    pub fn count_of(&self, kind: CauseKind) -> usize {
        self.causes.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn as_slice(&self) -> &[Cause] {
        &self.causes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cause> {
        self.causes.iter()
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

impl FromIterator<Cause> for CauseSet {
    fn from_iter<I: IntoIterator<Item = Cause>>(iter: I) -> Self {
        let mut set = CauseSet::new();
        for cause in iter {
            set.push(cause);
        }
        set
    }
}

/// Causes for a build requested by an indexing pass.
///
/// The branch indexing cause comes first, followed by the provider's
/// contributed causes in the order given, minus exact repeats.
pub fn build_causes(contributed: impl IntoIterator<Item = Cause>) -> CauseSet {
    let mut set = CauseSet::new();
    set.push(Cause::BranchIndexing);
    for cause in contributed {
        let description = cause.to_string();
        if !set.push(cause) {
            tracing::debug!(cause = %description, "Dropped duplicate build cause");
        }
    }
    set
}
