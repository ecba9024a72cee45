//! Build records and the build engine collaborator
//!
//! The core never runs builds itself. Indexing queues a [`BuildRecord`] on
//! the branch and hands a [`BuildRequest`] to a [`BuildEngine`]; the engine's
//! answer becomes the record's terminal status.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::branding::Decorations;
use crate::cause::CauseSet;
use crate::model::ItemPath;
use crate::provider::Revision;

/// Terminal outcome of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildResult {
    Success,
    Failure,
    Aborted,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    Queued,
    Running,
    Completed(BuildResult),
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn result(&self) -> Option<BuildResult> {
        match self {
            Self::Completed(result) => Some(*result),
            _ => None,
        }
    }
}

/// One requested build of a branch project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    /// Per-branch build number, starting at 1
    pub number: u64,
    pub causes: CauseSet,
    pub revision: Revision,
    /// Revision-level decorations attached when the build was requested
    pub decorations: Decorations,
    pub status: BuildStatus,
    pub queued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What the build engine is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Branch project the build belongs to
    pub path: ItemPath,
    pub number: u64,
    /// Original branch name
    pub display_name: String,
    pub revision: Revision,
    pub causes: CauseSet,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("build engine failed: {0}")]
pub struct BuildEngineError(pub String);

/// Executes builds on behalf of the coordinator.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    async fn execute(&self, request: BuildRequest) -> Result<BuildResult, BuildEngineError>;
}

/// Engine that completes every build immediately with success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBuildEngine;

#[async_trait]
impl BuildEngine for NoopBuildEngine {
    async fn execute(&self, _request: BuildRequest) -> Result<BuildResult, BuildEngineError> {
        Ok(BuildResult::Success)
    }
}

/// Follows one build until it completes.
#[derive(Debug, Clone)]
pub struct BuildHandle {
    path: ItemPath,
    number: u64,
    status: watch::Receiver<BuildStatus>,
}

impl BuildHandle {
    pub(crate) fn new(path: ItemPath, number: u64, status: watch::Receiver<BuildStatus>) -> Self {
        Self {
            path,
            number,
            status,
        }
    }

    pub fn path(&self) -> &ItemPath {
        &self.path
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn status(&self) -> BuildStatus {
        *self.status.borrow()
    }

    /// Wait for the build to finish.
    ///
    /// A build whose executor went away before finishing counts as aborted.
    pub async fn wait(mut self) -> BuildResult {
        let finished = match self.status.wait_for(BuildStatus::is_terminal).await {
            Ok(status) => status.result(),
            Err(_) => None,
        };
        finished
            .or_else(|| self.status.borrow().result())
            .unwrap_or(BuildResult::Aborted)
    }
}
