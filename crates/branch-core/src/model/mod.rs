//! Item tree model
//!
//! Three levels of items: organizations own multi-branch projects, which own
//! branch projects. Every item has a stable encoded name (its path segment)
//! and keeps the original remote name for display.

mod branch;
mod children;
mod organization;
mod project;

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::branding::Decorations;

pub use branch::BranchProject;
pub use children::ChildSet;
pub use organization::Organization;
pub use project::MultiBranchProject;

pub(crate) use organization::OrganizationState;
pub(crate) use project::ProjectState;

/// Location of an item in the tree, as encoded names from the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemPath(Vec<String>);

impl ItemPath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn from_segments(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<ItemPath> {
        (self.0.len() > 1).then(|| Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Encoded name of the item itself.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn starts_with(&self, other: &ItemPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Naming and branding state shared by every kind of item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    /// Encoded name, fixed for the item's lifetime
    pub name: String,
    /// Remote name, updated when the remote object is renamed
    pub original_name: String,
    /// Provider identity used to follow renames
    pub identity: Option<String>,
    pub decorations: Decorations,
    /// No longer discovered, kept under the mark-obsolete strategy
    pub obsolete: bool,
}

impl ItemInfo {
    pub fn new(name: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_name: original_name.into(),
            identity: None,
            decorations: Decorations::new(),
            obsolete: false,
        }
    }

    pub fn with_identity(mut self, identity: Option<String>) -> Self {
        self.identity = identity;
        self
    }

    /// Provider display override, else the original name.
    pub fn display_name(&self) -> &str {
        self.decorations
            .object_metadata()
            .and_then(|metadata| metadata.display_name.as_deref())
            .unwrap_or(&self.original_name)
    }

    pub fn description(&self) -> Option<&str> {
        self.decorations
            .object_metadata()
            .and_then(|metadata| metadata.description.as_deref())
    }
}

/// Outcome of the indexing passes run for an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStatus {
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// The last pass was aborted and should be re-run
    pub needs_retry: bool,
    /// Completed passes
    pub passes: u64,
}

impl IndexingStatus {
    pub(crate) fn started(&mut self) {
        self.last_started = Some(Utc::now());
    }

    pub(crate) fn succeeded(&mut self) {
        self.last_finished = Some(Utc::now());
        self.last_error = None;
        self.needs_retry = false;
        self.passes += 1;
    }

    pub(crate) fn failed(&mut self, error: &crate::Error) {
        self.last_finished = Some(Utc::now());
        self.last_error = Some(error.to_string());
        self.needs_retry = true;
    }
}

/// Lock an item's state, recovering from a poisoned lock.
///
/// State is only mutated in short synchronous sections, so a panic while
/// holding the lock cannot leave it half-written in a way later passes
/// would not repair.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
