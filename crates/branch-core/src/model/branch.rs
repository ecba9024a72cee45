//! Branch projects, the leaves of the tree

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::{ItemInfo, ItemPath, lock};
use crate::branding::Decorations;
use crate::build::{BuildRecord, BuildRequest, BuildStatus};
use crate::cause::CauseSet;
use crate::provider::{DiscoveredBranch, Revision, Source};
use crate::store::{ItemKind, ItemRecord};

/// One discovered branch and its build history.
pub struct BranchProject {
    path: ItemPath,
    deleted: AtomicBool,
    state: Mutex<BranchState>,
}

pub(crate) struct BranchState {
    pub(crate) info: ItemInfo,
    pub(crate) revision: Option<Revision>,
    /// Revision of the last build requested by indexing
    pub(crate) last_built_revision: Option<Revision>,
    /// Branch as last reported by its source
    pub(crate) head: Option<DiscoveredBranch>,
    pub(crate) source: Option<Arc<dyn Source>>,
    pub(crate) builds: Vec<BuildRecord>,
    pub(crate) next_build: u64,
}

impl BranchProject {
    pub(crate) fn new(path: ItemPath, info: ItemInfo) -> Self {
        Self {
            path,
            deleted: AtomicBool::new(false),
            state: Mutex::new(BranchState {
                info,
                revision: None,
                last_built_revision: None,
                head: None,
                source: None,
                builds: Vec::new(),
                next_build: 1,
            }),
        }
    }

    pub(crate) fn restore(record: &ItemRecord) -> Self {
        let branch = Self::new(record.path.clone(), record.info());
        {
            let mut state = branch.lock();
            state.revision = record.revision.clone();
            state.last_built_revision = record.last_built_revision.clone();
        }
        branch
    }

    pub fn path(&self) -> &ItemPath {
        &self.path
    }

    /// Encoded name; never changes after creation.
    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn original_name(&self) -> String {
        self.lock().info.original_name.clone()
    }

    /// Branches always display their remote name verbatim.
    pub fn display_name(&self) -> String {
        self.original_name()
    }

    pub fn identity(&self) -> Option<String> {
        self.lock().info.identity.clone()
    }

    pub fn revision(&self) -> Option<Revision> {
        self.lock().revision.clone()
    }

    pub fn decorations(&self) -> Decorations {
        self.lock().info.decorations.clone()
    }

    pub fn is_indexed(&self) -> bool {
        self.lock().info.decorations.is_indexed()
    }

    pub fn is_obsolete(&self) -> bool {
        self.lock().info.obsolete
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn builds(&self) -> Vec<BuildRecord> {
        self.lock().builds.clone()
    }

    pub fn build(&self, number: u64) -> Option<BuildRecord> {
        self.lock().builds.iter().find(|b| b.number == number).cloned()
    }

    pub fn last_build(&self) -> Option<BuildRecord> {
        self.lock().builds.last().cloned()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BranchState> {
        lock(&self.state)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    /// Snapshot of what a build of the current head needs.
    pub(crate) fn head(&self) -> Option<(DiscoveredBranch, Option<Arc<dyn Source>>)> {
        let state = self.lock();
        state.head.clone().map(|head| (head, state.source.clone()))
    }

    /// Record a queued build and return the request to execute.
    ///
    /// Returns `None` when the branch has been deleted.
    pub(crate) fn queue_build(
        &self,
        causes: CauseSet,
        revision: Revision,
        decorations: Decorations,
    ) -> Option<BuildRequest> {
        let mut state = self.lock();
        if self.is_deleted() {
            return None;
        }
        let number = state.next_build;
        state.next_build += 1;
        state.builds.push(BuildRecord {
            number,
            causes: causes.clone(),
            revision: revision.clone(),
            decorations,
            status: BuildStatus::Queued,
            queued_at: Utc::now(),
            finished_at: None,
        });
        tracing::debug!(branch = %self.path, number, revision = %revision, "Queued build");

        Some(BuildRequest {
            path: self.path.clone(),
            number,
            display_name: state.info.original_name.clone(),
            revision,
            causes,
        })
    }

    pub(crate) fn set_build_status(&self, number: u64, status: BuildStatus) {
        let mut state = self.lock();
        if let Some(record) = state.builds.iter_mut().find(|b| b.number == number) {
            if status.is_terminal() {
                record.finished_at = Some(Utc::now());
            }
            record.status = status;
        }
    }

    pub(crate) fn record(&self) -> ItemRecord {
        let state = self.lock();
        ItemRecord::from_info(ItemKind::Branch, self.path.clone(), &state.info)
            .with_revisions(state.revision.clone(), state.last_built_revision.clone())
    }
}

impl fmt::Debug for BranchProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchProject")
            .field("path", &self.path)
            .field("deleted", &self.is_deleted())
            .finish_non_exhaustive()
    }
}
