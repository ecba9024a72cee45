//! Root catalog of organizations and standalone projects

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::IndexerConfig;
use crate::factory::{BasicProjectFactory, ProjectFactory};
use crate::model::{
    BranchProject, ChildSet, ItemInfo, ItemPath, MultiBranchProject, Organization, lock,
};
use crate::provider::{DiscoveredRepository, Navigator, Source};
use crate::store::{ItemKind, ItemRecord, ItemStore, forget, persist};
use crate::{Error, Result};

/// Something an indexing pass can run against.
#[derive(Debug, Clone)]
pub enum IndexTarget {
    Organization(Arc<Organization>),
    Project(Arc<MultiBranchProject>),
}

impl IndexTarget {
    pub fn path(&self) -> &ItemPath {
        match self {
            Self::Organization(organization) => organization.path(),
            Self::Project(project) => project.path(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Self::Organization(organization) => organization.is_deleted(),
            Self::Project(project) => project.is_deleted(),
        }
    }

    pub fn needs_retry(&self) -> bool {
        match self {
            Self::Organization(organization) => organization.status().needs_retry,
            Self::Project(project) => project.status().needs_retry,
        }
    }
}

/// Supplies provider handles for items restored from a store.
///
/// Navigators and sources are live objects and are never persisted.
pub trait ProviderResolver {
    fn navigators(&self, organization: &ItemRecord) -> Vec<Arc<dyn Navigator>>;

    fn sources(&self, project: &ItemRecord) -> Vec<Arc<dyn Source>>;

    /// Project factories of a restored organization.
    fn factories(&self, _organization: &ItemRecord) -> Vec<Arc<dyn ProjectFactory>> {
        vec![BasicProjectFactory::new().into_arc()]
    }
}

/// Organizations and standalone projects, keyed by encoded name.
pub struct ItemTree {
    config: Arc<IndexerConfig>,
    store: Arc<dyn ItemStore>,
    items: Mutex<ChildSet<IndexTarget>>,
}

impl ItemTree {
    pub fn new(config: Arc<IndexerConfig>, store: Arc<dyn ItemStore>) -> Self {
        let items = ChildSet::new(config.encoder());
        Self {
            config,
            store,
            items: Mutex::new(items),
        }
    }

    /// Rebuild the tree from the store.
    ///
    /// Encoded names are taken from the stored records, so every item keeps
    /// the name it had before the restart. Navigated projects get their
    /// source from the organization's first navigator until the next
    /// organization pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds conflicting
    /// names.
    pub fn load(
        config: Arc<IndexerConfig>,
        store: Arc<dyn ItemStore>,
        resolver: &dyn ProviderResolver,
    ) -> Result<Self> {
        let tree = Self::new(config, store);
        let records = tree.store.load_children(None)?;
        let mut items = tree.lock();

        for record in records {
            let target = match record.kind {
                ItemKind::Organization => {
                    let organization = Arc::new(Organization::new(
                        record.path.clone(),
                        record.info(),
                        resolver.navigators(&record),
                        resolver.factories(&record),
                        tree.config.encoder(),
                    ));
                    tree.restore_projects(&organization)?;
                    IndexTarget::Organization(organization)
                }
                ItemKind::Project => {
                    let project = Arc::new(MultiBranchProject::new(
                        record.path.clone(),
                        None,
                        record.info(),
                        resolver.sources(&record),
                        tree.config.encoder(),
                    ));
                    tree.restore_branches(&project)?;
                    IndexTarget::Project(project)
                }
                ItemKind::Branch => {
                    tracing::warn!(item = %record.path, "Branch record at top level, skipping");
                    continue;
                }
            };
            items.restore(record.name(), &record.original_name, Arc::new(target))?;
        }

        tracing::info!(items = items.len(), "Loaded item tree");
        drop(items);
        Ok(tree)
    }

    fn restore_projects(&self, organization: &Arc<Organization>) -> Result<()> {
        let records = self.store.load_children(Some(organization.path()))?;
        let mut state = organization.lock();
        for record in records.into_iter().filter(|r| r.kind == ItemKind::Project) {
            let info = record.info();
            let mut repository = DiscoveredRepository::new(info.original_name.clone());
            repository.identity = info.identity.clone();
            let sources = organization
                .navigators()
                .first()
                .map(|navigator| vec![navigator.source_for(&repository)])
                .unwrap_or_default();
            let project = Arc::new(MultiBranchProject::new(
                record.path.clone(),
                Some(organization.path().clone()),
                info,
                sources,
                self.config.encoder(),
            ));
            self.restore_branches(&project)?;
            state
                .projects
                .restore(record.name(), &record.original_name, project)?;
        }
        Ok(())
    }

    fn restore_branches(&self, project: &Arc<MultiBranchProject>) -> Result<()> {
        let records = self.store.load_children(Some(project.path()))?;
        let mut state = project.lock();
        for record in records.into_iter().filter(|r| r.kind == ItemKind::Branch) {
            let branch = Arc::new(BranchProject::restore(&record));
            state
                .branches
                .restore(record.name(), &record.original_name, branch)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Arc<IndexerConfig> {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, ChildSet<IndexTarget>> {
        lock(&self.items)
    }

    /// Create an organization driven by the given navigators, turning every
    /// discovered repository into a project.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemExists`] if a top-level item already has this
    /// name, or a naming error if the name cannot be encoded.
    pub fn create_organization(
        &self,
        name: &str,
        navigators: Vec<Arc<dyn Navigator>>,
    ) -> Result<Arc<Organization>> {
        self.create_organization_with_factories(
            name,
            navigators,
            vec![BasicProjectFactory::new().into_arc()],
        )
    }

    /// Create an organization whose factories decide which discovered
    /// repositories become projects.
    ///
    /// # Errors
    ///
    /// Same as [`ItemTree::create_organization`].
    pub fn create_organization_with_factories(
        &self,
        name: &str,
        navigators: Vec<Arc<dyn Navigator>>,
        factories: Vec<Arc<dyn ProjectFactory>>,
    ) -> Result<Arc<Organization>> {
        let mut items = self.lock();
        if items.encoded_name(name).is_some() {
            return Err(Error::ItemExists {
                name: name.to_string(),
            });
        }
        let encoded = items.register(name)?;
        let organization = Arc::new(Organization::new(
            ItemPath::root(&encoded),
            ItemInfo::new(encoded.clone(), name),
            navigators,
            factories,
            self.config.encoder(),
        ));
        items.insert(encoded, Arc::new(IndexTarget::Organization(Arc::clone(&organization))));
        persist(self.store.as_ref(), &organization.record());

        tracing::info!(organization = %organization.path(), name, "Created organization");
        Ok(organization)
    }

    /// Create a standalone project with its own sources.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemExists`] if a top-level item already has this
    /// name, or a naming error if the name cannot be encoded.
    pub fn create_project(
        &self,
        name: &str,
        sources: Vec<Arc<dyn Source>>,
    ) -> Result<Arc<MultiBranchProject>> {
        let mut items = self.lock();
        if items.encoded_name(name).is_some() {
            return Err(Error::ItemExists {
                name: name.to_string(),
            });
        }
        let encoded = items.register(name)?;
        let project = Arc::new(MultiBranchProject::new(
            ItemPath::root(&encoded),
            None,
            ItemInfo::new(encoded.clone(), name),
            sources,
            self.config.encoder(),
        ));
        items.insert(encoded, Arc::new(IndexTarget::Project(Arc::clone(&project))));
        persist(self.store.as_ref(), &project.record());

        tracing::info!(project = %project.path(), name, "Created project");
        Ok(project)
    }

    /// Top-level items in creation order.
    pub fn items(&self) -> Vec<IndexTarget> {
        self.lock().iter().map(|item| item.as_ref().clone()).collect()
    }

    pub fn organizations(&self) -> Vec<Arc<Organization>> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                IndexTarget::Organization(organization) => Some(organization),
                IndexTarget::Project(_) => None,
            })
            .collect()
    }

    /// Standalone projects in creation order.
    pub fn projects(&self) -> Vec<Arc<MultiBranchProject>> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                IndexTarget::Project(project) => Some(project),
                IndexTarget::Organization(_) => None,
            })
            .collect()
    }

    /// Organization by its original name.
    pub fn organization(&self, name: &str) -> Option<Arc<Organization>> {
        match self.lock().get_by_original(name).map(|item| item.as_ref().clone()) {
            Some(IndexTarget::Organization(organization)) => Some(organization),
            _ => None,
        }
    }

    /// Standalone project by its original name.
    pub fn project(&self, name: &str) -> Option<Arc<MultiBranchProject>> {
        match self.lock().get_by_original(name).map(|item| item.as_ref().clone()) {
            Some(IndexTarget::Project(project)) => Some(project),
            _ => None,
        }
    }

    /// Every organization and every project, nested ones included.
    pub fn all_targets(&self) -> Vec<IndexTarget> {
        let mut targets = Vec::new();
        for item in self.items() {
            if let IndexTarget::Organization(organization) = &item {
                targets.push(item.clone());
                targets.extend(organization.projects().into_iter().map(IndexTarget::Project));
            } else {
                targets.push(item);
            }
        }
        targets
    }

    /// Organization or project at `path`.
    pub fn find(&self, path: &ItemPath) -> Option<IndexTarget> {
        let top = self.lock().get(path.segments().first()?)?.as_ref().clone();
        match (top, path.depth()) {
            (top, 1) => Some(top),
            (IndexTarget::Organization(organization), 2) => organization
                .project_by_name(path.name())
                .map(IndexTarget::Project),
            _ => None,
        }
    }

    /// Branch project at `path`.
    pub fn find_branch(&self, path: &ItemPath) -> Option<Arc<BranchProject>> {
        let parent = path.parent()?;
        match self.find(&parent)? {
            IndexTarget::Project(project) => project.branch_by_name(path.name()),
            IndexTarget::Organization(_) => None,
        }
    }

    /// Delete the item at `path` and everything below it.
    ///
    /// In-flight passes for deleted items notice before mutating and do
    /// nothing. A deleted navigated project comes back on the next
    /// organization pass if its repository is still discovered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing exists at `path`.
    pub fn delete(&self, path: &ItemPath) -> Result<()> {
        let not_found = || Error::NotFound(path.to_string());
        match path.parent() {
            None if path.depth() == 0 => return Err(not_found()),
            None => {
                let item = self.lock().remove(path.name()).ok_or_else(not_found)?;
                match item.as_ref() {
                    IndexTarget::Organization(organization) => organization.mark_deleted(),
                    IndexTarget::Project(project) => project.mark_deleted(),
                }
            }
            Some(parent) => match self.find(&parent).ok_or_else(not_found)? {
                IndexTarget::Organization(organization) => {
                    let project = organization
                        .lock()
                        .projects
                        .remove(path.name())
                        .ok_or_else(not_found)?;
                    project.mark_deleted();
                }
                IndexTarget::Project(project) => {
                    let branch = project
                        .lock()
                        .branches
                        .remove(path.name())
                        .ok_or_else(not_found)?;
                    branch.mark_deleted();
                }
            },
        }

        forget(self.store.as_ref(), path);
        tracing::info!(item = %path, "Deleted item");
        Ok(())
    }
}

impl fmt::Debug for ItemTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTree")
            .field("items", &self.lock().len())
            .finish_non_exhaustive()
    }
}
