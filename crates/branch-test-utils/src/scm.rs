//! In-memory source-control provider.
//!
//! [`MockScmController`] holds repositories, branches and revisions for one
//! provider organization. [`MockNavigator`] and [`MockSource`] expose it
//! through the core's provider traits. Links carry the titles
//! `organization`, `source`, `branch` and `revision` so tests can tell them
//! apart.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use branch_core::provider::{OrganizationContext, RepositoryContext};
use branch_core::store::ItemRecord;
use branch_core::{
    Cause, Decoration, DecorationKind, DiscoveredBranch, DiscoveredRepository, Icon, Link,
    Metadata, Navigator, ObjectMetadata, ProviderError, ProviderResolver, ProviderResult, Revision,
    Source,
};

/// Base URL of every link the mock hands out.
pub const MOCK_BASE_URL: &str = "http://scm.example.com";

#[derive(Debug, Clone, Default)]
struct ObjectFields {
    description: Option<String>,
    url: Option<String>,
    display_name: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Clone)]
struct MockBranch {
    name: String,
    identity: String,
    revision: Revision,
}

#[derive(Debug, Clone)]
struct MockRepository {
    name: String,
    identity: String,
    fields: ObjectFields,
    branches: Vec<MockBranch>,
    deleted: Vec<MockBranch>,
}

#[derive(Debug, Default)]
struct ControllerState {
    organization: ObjectFields,
    repositories: Vec<MockRepository>,
    next_id: u64,
    unavailable: bool,
    unavailable_names: HashSet<String>,
    failing_kinds: Vec<DecorationKind>,
    list_calls: HashMap<String, usize>,
}

impl ControllerState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_revision(&mut self) -> Revision {
        Revision::new(format!("{:012x}", self.next_id() * 0x9e37_79b9))
    }

    fn repository(&mut self, name: &str) -> &mut MockRepository {
        self.repositories
            .iter_mut()
            .find(|repo| repo.name == name)
            .unwrap_or_else(|| panic!("no such repository: {}", name))
    }

    fn branch(&mut self, repository: &str, branch: &str) -> &mut MockBranch {
        self.repository(repository)
            .branches
            .iter_mut()
            .find(|b| b.name == branch)
            .unwrap_or_else(|| panic!("no such branch: {}/{}", repository, branch))
    }

    /// Replace decorations of failing kinds with failures.
    fn filter(&self, decorations: Vec<Decoration>) -> Metadata {
        let mut metadata = Metadata::new();
        for decoration in decorations {
            let kind = decoration.kind();
            if self.failing_kinds.contains(&kind) {
                metadata.push_failure(kind, "injected failure");
            } else {
                metadata.push(decoration);
            }
        }
        metadata
    }
}

fn object_decorations(fields: &ObjectFields) -> Vec<Decoration> {
    let mut decorations = Vec::new();
    if let Some(metadata) = ObjectMetadata::from_fields(
        fields.description.clone(),
        fields.url.clone(),
        fields.display_name.clone(),
    ) {
        decorations.push(Decoration::ObjectMetadata(metadata));
    }
    if let Some(icon) = &fields.icon {
        decorations.push(Decoration::Icon(Icon::new(icon.clone())));
    }
    decorations
}

pub fn source_url(repository: &str) -> String {
    format!("{}/{}", MOCK_BASE_URL, repository)
}

pub fn branch_url(repository: &str, branch: &str) -> String {
    format!("{}/{}/tree/{}", MOCK_BASE_URL, repository, branch)
}

pub fn revision_url(repository: &str, revision: &Revision) -> String {
    format!("{}/{}/commit/{}", MOCK_BASE_URL, repository, revision)
}

/// Shared in-memory provider state.
///
/// Cloning shares the state, so a test keeps one handle to mutate the
/// provider while navigators and sources read from it.
#[derive(Debug, Clone)]
pub struct MockScmController {
    state: Arc<Mutex<ControllerState>>,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for MockScmController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScmController {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            paused: Arc::new(paused),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap()
    }

    /// Create a repository with a `master` branch holding one revision.
    pub fn create_repository(&self, name: &str) -> Revision {
        self.create_empty_repository(name);
        self.create_branch(name, "master")
    }

    /// Create a repository with no branches.
    pub fn create_empty_repository(&self, name: &str) {
        let mut state = self.lock();
        let identity = format!("repo-{}", state.next_id());
        state.repositories.push(MockRepository {
            name: name.to_string(),
            identity,
            fields: ObjectFields::default(),
            branches: Vec::new(),
            deleted: Vec::new(),
        });
    }

    pub fn delete_repository(&self, name: &str) {
        self.lock().repositories.retain(|repo| repo.name != name);
    }

    /// Rename a repository, keeping its identity.
    pub fn rename_repository(&self, from: &str, to: &str) {
        self.lock().repository(from).name = to.to_string();
    }

    /// Create a branch with a fresh revision.
    pub fn create_branch(&self, repository: &str, branch: &str) -> Revision {
        let mut state = self.lock();
        let identity = format!("branch-{}", state.next_id());
        let revision = state.next_revision();
        state.repository(repository).branches.push(MockBranch {
            name: branch.to_string(),
            identity,
            revision: revision.clone(),
        });
        revision
    }

    pub fn delete_branch(&self, repository: &str, branch: &str) {
        let mut state = self.lock();
        let repo = state.repository(repository);
        if let Some(index) = repo.branches.iter().position(|b| b.name == branch) {
            let removed = repo.branches.remove(index);
            repo.deleted.push(removed);
        }
    }

    /// Bring back a deleted branch with its old identity and revision.
    pub fn restore_branch(&self, repository: &str, branch: &str) {
        let mut state = self.lock();
        let repo = state.repository(repository);
        let index = repo
            .deleted
            .iter()
            .position(|b| b.name == branch)
            .unwrap_or_else(|| panic!("no deleted branch: {}/{}", repository, branch));
        let restored = repo.deleted.remove(index);
        repo.branches.push(restored);
    }

    /// Rename a branch, keeping its identity and revision.
    pub fn rename_branch(&self, repository: &str, from: &str, to: &str) {
        self.lock().branch(repository, from).name = to.to_string();
    }

    /// Commit to a branch, returning the new head revision.
    pub fn add_revision(&self, repository: &str, branch: &str) -> Revision {
        let mut state = self.lock();
        let revision = state.next_revision();
        state.branch(repository, branch).revision = revision.clone();
        revision
    }

    pub fn revision(&self, repository: &str, branch: &str) -> Revision {
        self.lock().branch(repository, branch).revision.clone()
    }

    pub fn repository_identity(&self, repository: &str) -> String {
        self.lock().repository(repository).identity.clone()
    }

    pub fn set_description(&self, repository: &str, description: &str) {
        self.lock().repository(repository).fields.description = Some(description.to_string());
    }

    pub fn set_url(&self, repository: &str, url: &str) {
        self.lock().repository(repository).fields.url = Some(url.to_string());
    }

    pub fn set_display_name(&self, repository: &str, display_name: &str) {
        self.lock().repository(repository).fields.display_name = Some(display_name.to_string());
    }

    pub fn set_icon(&self, repository: &str, icon_class: &str) {
        self.lock().repository(repository).fields.icon = Some(icon_class.to_string());
    }

    pub fn set_organization_description(&self, description: &str) {
        self.lock().organization.description = Some(description.to_string());
    }

    pub fn set_organization_url(&self, url: &str) {
        self.lock().organization.url = Some(url.to_string());
    }

    pub fn set_organization_display_name(&self, display_name: &str) {
        self.lock().organization.display_name = Some(display_name.to_string());
    }

    pub fn set_organization_icon(&self, icon_class: &str) {
        self.lock().organization.icon = Some(icon_class.to_string());
    }

    /// Make every listing call fail with [`ProviderError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Fail listing calls for one repository (or organization) only.
    pub fn set_unavailable_for(&self, name: &str, unavailable: bool) {
        let mut state = self.lock();
        if unavailable {
            state.unavailable_names.insert(name.to_string());
        } else {
            state.unavailable_names.remove(name);
        }
    }

    /// Report a failure instead of a value for one decoration kind.
    pub fn fail_decoration(&self, kind: DecorationKind) {
        self.lock().failing_kinds.push(kind);
    }

    /// Hold every listing call until [`MockScmController::resume`].
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Number of listing calls made for a repository (or for the
    /// organization, under its name).
    pub fn list_calls(&self, name: &str) -> usize {
        self.lock().list_calls.get(name).copied().unwrap_or(0)
    }

    pub fn navigator(&self, organization: &str) -> MockNavigator {
        MockNavigator {
            controller: self.clone(),
            id: format!("mock-navigator-{}", organization),
            organization: organization.to_string(),
            causes: Vec::new(),
        }
    }

    pub fn source(&self, repository: &str) -> MockSource {
        MockSource {
            controller: self.clone(),
            id: format!("mock-source-{}", repository),
            repository: repository.to_string(),
            causes: Vec::new(),
        }
    }

    /// Count a listing call, hold it while paused, then fail it if the
    /// provider is unavailable.
    async fn enter(&self, name: &str) -> ProviderResult<()> {
        *self.lock().list_calls.entry(name.to_string()).or_insert(0) += 1;

        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;

        let state = self.lock();
        if state.unavailable || state.unavailable_names.contains(name) {
            return Err(ProviderError::Unavailable("mock provider offline".to_string()));
        }
        Ok(())
    }
}

/// Restored organizations navigate, and restored projects source, the
/// provider object named like the item.
impl ProviderResolver for MockScmController {
    fn navigators(&self, organization: &ItemRecord) -> Vec<Arc<dyn Navigator>> {
        vec![self.navigator(&organization.original_name).into_arc()]
    }

    fn sources(&self, project: &ItemRecord) -> Vec<Arc<dyn Source>> {
        vec![self.source(&project.original_name).into_arc()]
    }
}

/// Navigator over a [`MockScmController`].
#[derive(Debug, Clone)]
pub struct MockNavigator {
    controller: MockScmController,
    id: String,
    organization: String,
    causes: Vec<Cause>,
}

impl MockNavigator {
    /// Sources handed out by this navigator contribute these causes.
    pub fn with_causes(mut self, causes: Vec<Cause>) -> Self {
        self.causes = causes;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Navigator> {
        Arc::new(self)
    }
}

#[async_trait]
impl Navigator for MockNavigator {
    fn id(&self) -> &str {
        &self.id
    }

    fn organization(&self) -> &str {
        &self.organization
    }

    async fn list_repositories(
        &self,
        _context: &OrganizationContext,
    ) -> ProviderResult<Vec<DiscoveredRepository>> {
        self.controller.enter(&self.organization).await?;
        let state = self.controller.lock();

        Ok(state
            .repositories
            .iter()
            .map(|repo| {
                let mut discovered =
                    DiscoveredRepository::new(repo.name.clone()).with_identity(repo.identity.clone());
                discovered.description = repo.fields.description.clone();
                discovered.url = repo.fields.url.clone();
                discovered.display_name = repo.fields.display_name.clone();
                discovered.icon_class = repo.fields.icon.clone();
                discovered
            })
            .collect())
    }

    async fn organization_metadata(&self, _context: &OrganizationContext) -> ProviderResult<Metadata> {
        let state = self.controller.lock();
        let mut decorations = vec![Decoration::OrganizationLink(
            Link::new(format!("{}/{}", MOCK_BASE_URL, self.organization)).with_title("organization"),
        )];
        decorations.extend(object_decorations(&state.organization));
        Ok(state.filter(decorations))
    }

    fn source_for(&self, repository: &DiscoveredRepository) -> Arc<dyn Source> {
        Arc::new(self.controller.source(&repository.name).with_causes(self.causes.clone()))
    }
}

/// Source over one repository of a [`MockScmController`].
#[derive(Debug, Clone)]
pub struct MockSource {
    controller: MockScmController,
    id: String,
    repository: String,
    causes: Vec<Cause>,
}

impl MockSource {
    /// Contribute these causes to every build.
    pub fn with_causes(mut self, causes: Vec<Cause>) -> Self {
        self.causes = causes;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Source> {
        Arc::new(self)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    async fn list_branches(&self, _context: &RepositoryContext) -> ProviderResult<Vec<DiscoveredBranch>> {
        self.controller.enter(&self.repository).await?;
        let state = self.controller.lock();
        let Some(repo) = state.repositories.iter().find(|r| r.name == self.repository) else {
            return Ok(Vec::new());
        };

        Ok(repo
            .branches
            .iter()
            .map(|branch| {
                let link = Decoration::BranchLink(
                    Link::new(branch_url(&repo.name, &branch.name)).with_title("branch"),
                );
                DiscoveredBranch::new(branch.name.clone(), branch.revision.clone())
                    .with_identity(branch.identity.clone())
                    .with_metadata(state.filter(vec![link]))
            })
            .collect())
    }

    async fn repository_metadata(&self, _context: &RepositoryContext) -> ProviderResult<Metadata> {
        let state = self.controller.lock();
        let Some(repo) = state.repositories.iter().find(|r| r.name == self.repository) else {
            return Ok(Metadata::new());
        };

        let mut decorations = Vec::new();
        if !repo.branches.is_empty() {
            decorations.push(Decoration::SourceLink(
                Link::new(source_url(&repo.name)).with_title("source"),
            ));
        }
        decorations.extend(object_decorations(&repo.fields));
        Ok(state.filter(decorations))
    }

    async fn revision_metadata(&self, branch: &DiscoveredBranch) -> ProviderResult<Metadata> {
        let state = self.controller.lock();
        let link = Decoration::RevisionLink(
            Link::new(revision_url(&self.repository, &branch.revision)).with_title("revision"),
        );
        Ok(state.filter(vec![link]))
    }

    async fn contributed_causes(&self, _branch: &DiscoveredBranch) -> ProviderResult<Vec<Cause>> {
        Ok(self.causes.clone())
    }
}
