//! Reconciliation engine
//!
//! An indexing pass asks the item's providers what exists now, diffs the
//! answer against the item's children, and creates, renames, revives or
//! retires children to match. Provider I/O happens before the item is
//! locked; the diff-and-mutate step runs under the item's lock with no
//! awaits, so a pass never observes a half-applied sibling pass.

mod organization;
mod plan;
mod project;
mod report;

use std::sync::Arc;

use crate::build::BuildRequest;
use crate::config::IndexerConfig;
use crate::model::MultiBranchProject;
use crate::store::ItemStore;

pub use report::{ReconcileReport, Rename, SkippedItem};

pub(crate) use project::revision_decorations;

/// Runs indexing passes against a configured store.
#[derive(Clone)]
pub struct Reconciler {
    config: Arc<IndexerConfig>,
    store: Arc<dyn ItemStore>,
}

/// Result of indexing a multi-branch project.
#[derive(Debug)]
pub struct ProjectPass {
    pub report: ReconcileReport,
    /// Builds queued on branches, ready to hand to a build engine
    pub builds: Vec<BuildRequest>,
}

/// Result of indexing an organization.
#[derive(Debug)]
pub struct OrganizationPass {
    pub report: ReconcileReport,
    /// Projects that should be indexed next (new, renamed, revived or
    /// left failing by an earlier pass)
    pub child_passes: Vec<Arc<MultiBranchProject>>,
}

impl Reconciler {
    pub fn new(config: Arc<IndexerConfig>, store: Arc<dyn ItemStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
