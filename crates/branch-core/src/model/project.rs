//! Multi-branch projects

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use branch_naming::NameEncoder;

use super::{BranchProject, ChildSet, IndexingStatus, ItemInfo, ItemPath, lock};
use crate::branding::Decorations;
use crate::provider::Source;
use crate::store::{ItemKind, ItemRecord};

/// One repository and the branch projects discovered in it.
///
/// A project is either a child of an organization, in which case the
/// organization's pass supplies its sources and its description, or a
/// standalone project configured with its own sources.
pub struct MultiBranchProject {
    path: ItemPath,
    organization: Option<ItemPath>,
    deleted: AtomicBool,
    state: Mutex<ProjectState>,
}

pub(crate) struct ProjectState {
    pub(crate) info: ItemInfo,
    pub(crate) sources: Vec<Arc<dyn Source>>,
    pub(crate) branches: ChildSet<BranchProject>,
    pub(crate) status: IndexingStatus,
}

impl MultiBranchProject {
    pub(crate) fn new(
        path: ItemPath,
        organization: Option<ItemPath>,
        info: ItemInfo,
        sources: Vec<Arc<dyn Source>>,
        encoder: NameEncoder,
    ) -> Self {
        Self {
            path,
            organization,
            deleted: AtomicBool::new(false),
            state: Mutex::new(ProjectState {
                info,
                sources,
                branches: ChildSet::new(encoder),
                status: IndexingStatus::default(),
            }),
        }
    }

    pub fn path(&self) -> &ItemPath {
        &self.path
    }

    /// Encoded name; never changes after creation.
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Owning organization, `None` for a standalone project.
    pub fn organization(&self) -> Option<&ItemPath> {
        self.organization.as_ref()
    }

    pub fn is_standalone(&self) -> bool {
        self.organization.is_none()
    }

    pub fn original_name(&self) -> String {
        self.lock().info.original_name.clone()
    }

    pub fn display_name(&self) -> String {
        self.lock().info.display_name().to_string()
    }

    pub fn description(&self) -> Option<String> {
        self.lock().info.description().map(str::to_string)
    }

    pub fn identity(&self) -> Option<String> {
        self.lock().info.identity.clone()
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

    pub fn status(&self) -> IndexingStatus {
        self.lock().status.clone()
    }

    pub fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.lock().sources.clone()
    }

    /// Whether any source enumerates the given repository.
    pub fn has_source_for(&self, repository: &str) -> bool {
        self.lock()
            .sources
            .iter()
            .any(|source| source.repository() == repository)
    }

    /// Branch projects in order of first discovery.
    pub fn branches(&self) -> Vec<Arc<BranchProject>> {
        self.lock().branches.iter().cloned().collect()
    }

    /// Branch projects ordered by branch name.
    pub fn branches_sorted(&self) -> Vec<Arc<BranchProject>> {
        self.lock().branches.sorted()
    }

    /// Branch project for a remote branch name.
    pub fn branch(&self, original: &str) -> Option<Arc<BranchProject>> {
        self.lock().branches.get_by_original(original).cloned()
    }

    /// Branch project by encoded name.
    pub fn branch_by_name(&self, encoded: &str) -> Option<Arc<BranchProject>> {
        self.lock().branches.get(encoded).cloned()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ProjectState> {
        lock(&self.state)
    }

    /// Mark this project and every branch deleted.
    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        for branch in self.lock().branches.iter() {
            branch.mark_deleted();
        }
    }

    pub(crate) fn record(&self) -> ItemRecord {
        let state = self.lock();
        ItemRecord::from_info(ItemKind::Project, self.path.clone(), &state.info)
    }
}

impl fmt::Debug for MultiBranchProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiBranchProject")
            .field("path", &self.path)
            .field("organization", &self.organization)
            .field("deleted", &self.is_deleted())
            .finish_non_exhaustive()
    }
}
