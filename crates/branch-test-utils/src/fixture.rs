//! Ready-made indexer wired to the mock provider.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use branch_core::{
    BranchProject, Cause, Coordinator, FsItemStore, IndexTarget, IndexerConfig, ItemPath,
    ItemStore, ItemTree, MultiBranchProject, NullStore, Organization, ProjectFactory, Watermark,
};

use crate::engine::RecordingBuildEngine;
use crate::scm::MockScmController;

/// A coordinator, its tree, a mock provider and a recording build engine.
///
/// # Example
///
/// ```ignore
/// let indexer = TestIndexer::new();
/// indexer.scm.create_repository("foo");
/// let project = indexer.project("foo");
/// indexer.index_project(&project).await;
/// assert_eq!(indexer.engine.built_names(), vec!["master"]);
/// ```
pub struct TestIndexer {
    pub scm: MockScmController,
    pub engine: RecordingBuildEngine,
    pub tree: Arc<ItemTree>,
    pub coordinator: Coordinator,
    config: Arc<IndexerConfig>,
    store_dir: Option<TempDir>,
}

impl TestIndexer {
    /// Indexer with default settings and no persistence.
    pub fn new() -> Self {
        Self::with_config(IndexerConfig::default())
    }

    pub fn with_config(config: IndexerConfig) -> Self {
        Self::build(
            MockScmController::new(),
            RecordingBuildEngine::new(),
            Arc::new(config),
            Arc::new(NullStore),
            None,
        )
    }

    /// Indexer persisting into a fresh temporary directory.
    pub fn persistent() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsItemStore::new(dir.path()));
        Self::build(
            MockScmController::new(),
            RecordingBuildEngine::new(),
            Arc::new(IndexerConfig::default()),
            store,
            Some(dir),
        )
    }

    /// Use `engine` for builds instead of the default recording engine.
    pub fn with_engine(self, engine: RecordingBuildEngine) -> Self {
        let store = Arc::clone(self.tree.store());
        Self::build(self.scm, engine, self.config, store, self.store_dir)
    }

    fn build(
        scm: MockScmController,
        engine: RecordingBuildEngine,
        config: Arc<IndexerConfig>,
        store: Arc<dyn ItemStore>,
        store_dir: Option<TempDir>,
    ) -> Self {
        let tree = Arc::new(ItemTree::new(Arc::clone(&config), store));
        let coordinator = Coordinator::new(Arc::clone(&tree), Arc::new(engine.clone()));
        Self {
            scm,
            engine,
            tree,
            coordinator,
            config,
            store_dir,
        }
    }

    /// Reload the tree from the store, as after a restart.
    ///
    /// Panics for indexers without persistence.
    pub fn restart(self) -> Self {
        let dir = self.store_dir.expect("restart needs a persistent indexer");
        let store: Arc<dyn ItemStore> = Arc::new(FsItemStore::new(dir.path()));
        let tree = Arc::new(ItemTree::load(Arc::clone(&self.config), store, &self.scm).unwrap());
        let coordinator = Coordinator::new(Arc::clone(&tree), Arc::new(self.engine.clone()));
        Self {
            scm: self.scm,
            engine: self.engine,
            tree,
            coordinator,
            config: self.config,
            store_dir: Some(dir),
        }
    }

    pub fn store_root(&self) -> Option<&Path> {
        self.store_dir.as_ref().map(TempDir::path)
    }

    /// Standalone project sourcing the mock repository of the same name.
    pub fn project(&self, repository: &str) -> Arc<MultiBranchProject> {
        self.project_with_causes(repository, Vec::new())
    }

    /// Standalone project whose source contributes `causes` to every build.
    pub fn project_with_causes(&self, repository: &str, causes: Vec<Cause>) -> Arc<MultiBranchProject> {
        let source = self.scm.source(repository).with_causes(causes).into_arc();
        self.tree.create_project(repository, vec![source]).unwrap()
    }

    /// Organization navigating the mock organization of the same name.
    pub fn organization(&self, name: &str) -> Arc<Organization> {
        let navigator = self.scm.navigator(name).into_arc();
        self.tree.create_organization(name, vec![navigator]).unwrap()
    }

    /// Organization whose `factories` pick the repositories that become
    /// projects.
    pub fn organization_with_factories(
        &self,
        name: &str,
        factories: Vec<Arc<dyn ProjectFactory>>,
    ) -> Arc<Organization> {
        let navigator = self.scm.navigator(name).into_arc();
        self.tree
            .create_organization_with_factories(name, vec![navigator], factories)
            .unwrap()
    }

    /// Trigger a pass and wait for it and everything it cascaded into.
    pub async fn index(&self, target: IndexTarget) -> Watermark {
        let mark = self.coordinator.index(target);
        self.coordinator.await_watermark(mark).await;
        mark
    }

    pub async fn index_project(&self, project: &Arc<MultiBranchProject>) -> Watermark {
        self.index(IndexTarget::Project(Arc::clone(project))).await
    }

    pub async fn index_organization(&self, organization: &Arc<Organization>) -> Watermark {
        self.index(IndexTarget::Organization(Arc::clone(organization))).await
    }

    /// Branch of `project` by original name, panicking if absent.
    pub fn branch(&self, project: &MultiBranchProject, name: &str) -> Arc<BranchProject> {
        project
            .branch(name)
            .unwrap_or_else(|| panic!("branch {} not found in {}", name, project.path()))
    }

    /// Original names of a project's branches, sorted.
    pub fn branch_names(&self, project: &MultiBranchProject) -> Vec<String> {
        project
            .branches_sorted()
            .iter()
            .map(|branch| branch.original_name())
            .collect()
    }

    pub fn path(segments: &[&str]) -> ItemPath {
        ItemPath::from_segments(segments.iter().copied())
    }
}

impl Default for TestIndexer {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll `condition` until it holds, panicking after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within five seconds"
        );
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
}
