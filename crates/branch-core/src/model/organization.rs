//! Organizations

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use branch_naming::NameEncoder;

use super::{ChildSet, IndexingStatus, ItemInfo, ItemPath, MultiBranchProject, lock};
use crate::branding::Decorations;
use crate::factory::ProjectFactory;
use crate::provider::Navigator;
use crate::store::{ItemKind, ItemRecord};

/// A root item whose navigators discover repositories.
///
/// Each discovered repository one of its factories recognises becomes a
/// [`MultiBranchProject`] child.
/// Organizations are created and deleted by an operator, never by indexing.
pub struct Organization {
    path: ItemPath,
    navigators: Vec<Arc<dyn Navigator>>,
    factories: Vec<Arc<dyn ProjectFactory>>,
    deleted: AtomicBool,
    state: Mutex<OrganizationState>,
}

pub(crate) struct OrganizationState {
    pub(crate) info: ItemInfo,
    pub(crate) projects: ChildSet<MultiBranchProject>,
    pub(crate) status: IndexingStatus,
}

impl Organization {
    pub(crate) fn new(
        path: ItemPath,
        info: ItemInfo,
        navigators: Vec<Arc<dyn Navigator>>,
        factories: Vec<Arc<dyn ProjectFactory>>,
        encoder: NameEncoder,
    ) -> Self {
        Self {
            path,
            navigators,
            factories,
            deleted: AtomicBool::new(false),
            state: Mutex::new(OrganizationState {
                info,
                projects: ChildSet::new(encoder),
                status: IndexingStatus::default(),
            }),
        }
    }

    pub fn path(&self) -> &ItemPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn navigators(&self) -> &[Arc<dyn Navigator>] {
        &self.navigators
    }

    /// Factories in order of precedence.
    pub fn factories(&self) -> &[Arc<dyn ProjectFactory>] {
        &self.factories
    }

    /// Whether any navigator enumerates the given provider organization.
    pub fn navigates(&self, organization: &str) -> bool {
        self.navigators
            .iter()
            .any(|navigator| navigator.organization() == organization)
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

    pub fn decorations(&self) -> Decorations {
        self.lock().info.decorations.clone()
    }

    pub fn is_indexed(&self) -> bool {
        self.lock().info.decorations.is_indexed()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn status(&self) -> IndexingStatus {
        self.lock().status.clone()
    }

    /// Projects in order of first discovery.
    pub fn projects(&self) -> Vec<Arc<MultiBranchProject>> {
        self.lock().projects.iter().cloned().collect()
    }

    /// Projects ordered by repository name.
    pub fn projects_sorted(&self) -> Vec<Arc<MultiBranchProject>> {
        self.lock().projects.sorted()
    }

    /// Project for a remote repository name.
    pub fn project(&self, original: &str) -> Option<Arc<MultiBranchProject>> {
        self.lock().projects.get_by_original(original).cloned()
    }

    /// Project by encoded name.
    pub fn project_by_name(&self, encoded: &str) -> Option<Arc<MultiBranchProject>> {
        self.lock().projects.get(encoded).cloned()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, OrganizationState> {
        lock(&self.state)
    }

    /// Mark this organization and everything below it deleted.
    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        let projects: Vec<_> = self.lock().projects.iter().cloned().collect();
        for project in projects {
            project.mark_deleted();
        }
    }

    pub(crate) fn record(&self) -> ItemRecord {
        let state = self.lock();
        ItemRecord::from_info(ItemKind::Organization, self.path.clone(), &state.info)
    }
}

impl fmt::Debug for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Organization")
            .field("path", &self.path)
            .field("navigators", &self.navigators.len())
            .field("factories", &self.factories.len())
            .field("deleted", &self.is_deleted())
            .finish_non_exhaustive()
    }
}
