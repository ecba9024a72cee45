//! Indexing pass for multi-branch projects

use std::sync::Arc;

use super::plan::{Candidate, ExistingChild, Step, plan};
use super::report::{ReconcileReport, Rename};
use super::{ProjectPass, Reconciler};
use crate::branding::{DecorationKind, Decorations, Metadata, apply_decorations, scope};
use crate::build::BuildRequest;
use crate::cause::build_causes;
use crate::model::{BranchProject, ItemInfo, MultiBranchProject, ProjectState};
use crate::provider::{DiscoveredBranch, RepositoryContext, Source};
use crate::store::{ItemKind, ItemRecord, forget, persist};
use crate::{Error, Result};

impl Reconciler {
    /// Index one multi-branch project against its sources.
    ///
    /// Returns the builds queued by the pass; executing them is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`] if any source fails to list
    /// branches. Nothing is mutated in that case and the project is marked
    /// for retry.
    pub async fn index_project(&self, project: &Arc<MultiBranchProject>) -> Result<ProjectPass> {
        if project.is_deleted() {
            return Ok(aborted(project));
        }

        let (sources, repository) = {
            let mut state = project.lock();
            state.status.started();
            (state.sources.clone(), state.info.original_name.clone())
        };
        let context = RepositoryContext {
            repository,
            path: project.path().clone(),
        };
        let own_scope = if project.is_standalone() {
            scope::STANDALONE_PROJECT
        } else {
            scope::PROJECT_SOURCES
        };

        tracing::debug!(project = %project.path(), sources = sources.len(), "Indexing project");

        let discovered = match discover_branches(project, &sources, &context).await {
            Ok(discovered) => discovered,
            Err(e) => {
                tracing::warn!(project = %project.path(), error = %e, "Branch discovery failed, will retry");
                project.lock().status.failed(&e);
                return Err(e);
            }
        };
        let metadata = repository_metadata(&sources, &context, own_scope).await;

        let (mut report, to_build) = {
            let mut state = project.lock();
            if project.is_deleted() {
                return Ok(aborted(project));
            }
            let applied = self.apply_branches(project, &mut state, &sources, &discovered);
            let (mut report, to_build) = match applied {
                Ok(applied) => applied,
                Err(e) => {
                    state.status.failed(&e);
                    return Err(e);
                }
            };

            let decorated = apply_decorations(&mut state.info.decorations, own_scope, &metadata);
            if decorated.changed() {
                report.decorated.push(project.path().clone());
                persist(
                    self.store(),
                    &ItemRecord::from_info(ItemKind::Project, project.path().clone(), &state.info),
                );
            }
            state.status.succeeded();
            (report, to_build)
        };

        let builds = queue_builds(to_build).await;
        report.builds = builds.iter().map(|b| b.path.clone()).collect();
        report.log();

        Ok(ProjectPass { report, builds })
    }

    /// Diff discovered branches against the project's branch projects.
    ///
    /// Runs under the project's lock. Returns the report so far and the
    /// branches a build should be queued for.
    fn apply_branches(
        &self,
        project: &MultiBranchProject,
        state: &mut ProjectState,
        sources: &[Arc<dyn Source>],
        discovered: &[(usize, DiscoveredBranch)],
    ) -> Result<(ReconcileReport, Vec<Arc<BranchProject>>)> {
        let mut report = ReconcileReport::new(project.path().clone());
        let mut to_build = Vec::new();

        let existing: Vec<ExistingChild> = state
            .branches
            .iter()
            .map(|branch| {
                let branch_state = branch.lock();
                ExistingChild {
                    encoded: branch.name().to_string(),
                    original: branch_state.info.original_name.clone(),
                    identity: branch_state.info.identity.clone(),
                    obsolete: branch_state.info.obsolete,
                }
            })
            .collect();
        let candidates: Vec<Candidate<'_>> = discovered
            .iter()
            .map(|(_, branch)| Candidate {
                name: &branch.name,
                identity: branch.identity.as_deref(),
            })
            .collect();
        let plan = plan(
            &existing,
            &candidates,
            state.branches.encoder(),
            self.config().indexing.orphaned_items,
        );
        report.skipped = plan.skipped;

        for retirement in &plan.retire {
            if retirement.purge {
                if let Some(branch) = state.branches.remove(&retirement.encoded) {
                    branch.mark_deleted();
                    forget(self.store(), branch.path());
                    tracing::debug!(branch = %branch.path(), "Deleted branch project");
                    report.retired.push(branch.path().clone());
                }
            } else if let Some(branch) = state.branches.get(&retirement.encoded).cloned() {
                branch.lock().info.obsolete = true;
                persist(self.store(), &branch.record());
                tracing::debug!(branch = %branch.path(), "Marked branch project obsolete");
                report.obsoleted.push(branch.path().clone());
            }
        }

        let renames: Vec<(String, String)> = plan
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Retain {
                    index,
                    encoded,
                    rename_from: Some(_),
                    ..
                } => Some((encoded.clone(), discovered[*index].1.name.clone())),
                _ => None,
            })
            .collect();
        state.branches.rename_all(&renames)?;

        for step in &plan.steps {
            let (source_index, head) = &discovered[step.index()];
            let (branch, created) = match step {
                Step::Create { .. } => {
                    let encoded = state.branches.register(&head.name)?;
                    let info = ItemInfo::new(encoded.clone(), head.name.clone())
                        .with_identity(head.identity.clone());
                    let branch = Arc::new(BranchProject::new(project.path().child(&encoded), info));
                    state.branches.insert(encoded, Arc::clone(&branch));
                    tracing::debug!(branch = %branch.path(), name = %head.name, "Created branch project");
                    report.created.push(branch.path().clone());
                    (branch, true)
                }
                Step::Retain {
                    encoded,
                    rename_from,
                    revive,
                    ..
                } => {
                    let Some(branch) = state.branches.get(encoded).cloned() else {
                        continue;
                    };
                    if let Some(from) = rename_from {
                        tracing::debug!(branch = %branch.path(), from = %from, to = %head.name, "Branch renamed");
                        report.renamed.push(Rename {
                            path: branch.path().clone(),
                            from: from.clone(),
                            to: head.name.clone(),
                        });
                    }
                    if *revive {
                        report.revived.push(branch.path().clone());
                    }
                    (branch, false)
                }
            };

            let dirty = {
                let mut branch_state = branch.lock();
                let renamed = branch_state.info.original_name != head.name;
                let revived = std::mem::replace(&mut branch_state.info.obsolete, false);
                branch_state.info.original_name = head.name.clone();
                if head.identity.is_some() {
                    branch_state.info.identity = head.identity.clone();
                }

                let revision_changed = branch_state.revision.as_ref() != Some(&head.revision);
                if revision_changed && !created {
                    report.updated.push(branch.path().clone());
                }
                branch_state.revision = Some(head.revision.clone());
                branch_state.head = Some(head.clone());
                branch_state.source = sources.get(*source_index).cloned();

                let decorated =
                    apply_decorations(&mut branch_state.info.decorations, scope::BRANCH, &head.metadata);
                if decorated.changed() {
                    report.decorated.push(branch.path().clone());
                }

                let needs_build = if created {
                    self.config().builds.build_on_create
                } else {
                    branch_state.last_built_revision.as_ref() != Some(&head.revision)
                };
                if needs_build || created {
                    branch_state.last_built_revision = Some(head.revision.clone());
                }
                if needs_build {
                    to_build.push(Arc::clone(&branch));
                }

                created || renamed || revived || revision_changed || decorated.changed() || needs_build
            };
            if dirty {
                persist(self.store(), &branch.record());
            }
        }

        Ok((report, to_build))
    }
}

fn aborted(project: &MultiBranchProject) -> ProjectPass {
    let report = ReconcileReport::aborted(project.path().clone());
    report.log();
    ProjectPass {
        report,
        builds: Vec::new(),
    }
}

/// List branches from every source, in source order.
async fn discover_branches(
    project: &MultiBranchProject,
    sources: &[Arc<dyn Source>],
    context: &RepositoryContext,
) -> Result<Vec<(usize, DiscoveredBranch)>> {
    let mut discovered = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        let branches = source
            .list_branches(context)
            .await
            .map_err(|e| Error::ProviderUnavailable {
                item: project.path().to_string(),
                reason: format!("{}: {}", source.id(), e),
            })?;
        discovered.extend(branches.into_iter().map(|branch| (index, branch)));
    }
    Ok(discovered)
}

/// Merge repository metadata from every source; a failing source counts as
/// a failure of every kind in scope.
async fn repository_metadata(
    sources: &[Arc<dyn Source>],
    context: &RepositoryContext,
    kinds: &[DecorationKind],
) -> Metadata {
    let mut metadata = Metadata::new();
    for source in sources {
        match source.repository_metadata(context).await {
            Ok(found) => metadata.extend(found),
            Err(e) => {
                tracing::warn!(source = source.id(), error = %e, "Repository metadata unavailable");
                metadata.extend(Metadata::failed(kinds, &e.to_string()));
            }
        }
    }
    metadata
}

/// Revision-level decorations for a build of `head`.
pub(crate) async fn revision_decorations(source: &dyn Source, head: &DiscoveredBranch) -> Decorations {
    let metadata = match source.revision_metadata(head).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(source = source.id(), branch = %head.name, error = %e, "Revision metadata unavailable");
            Metadata::failed(scope::BUILD, &e.to_string())
        }
    };
    let mut decorations = Decorations::new();
    apply_decorations(&mut decorations, scope::BUILD, &metadata);
    decorations
}

/// Queue one build per branch, with causes and decorations from its source.
async fn queue_builds(branches: Vec<Arc<BranchProject>>) -> Vec<BuildRequest> {
    let mut requests = Vec::new();
    for branch in branches {
        let Some((head, source)) = branch.head() else {
            continue;
        };
        let (causes, decorations) = match source {
            Some(source) => {
                let contributed = match source.contributed_causes(&head).await {
                    Ok(causes) => causes,
                    Err(e) => {
                        tracing::warn!(branch = %branch.path(), error = %e, "Provider causes unavailable");
                        Vec::new()
                    }
                };
                (
                    build_causes(contributed),
                    revision_decorations(source.as_ref(), &head).await,
                )
            }
            None => (build_causes(Vec::new()), Decorations::new()),
        };
        if let Some(request) = branch.queue_build(causes, head.revision.clone(), decorations) {
            requests.push(request);
        }
    }
    requests
}
