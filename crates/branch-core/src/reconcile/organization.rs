//! Indexing pass for organizations

use std::sync::Arc;

use super::plan::{Candidate, ExistingChild, Step, plan};
use super::report::{ReconcileReport, Rename, SkippedItem};
use super::{OrganizationPass, Reconciler};
use crate::branding::{Metadata, apply_decorations, merge_decorations, scope};
use crate::factory::recognize;
use crate::model::{ItemInfo, MultiBranchProject, Organization, OrganizationState};
use crate::provider::{DiscoveredRepository, OrganizationContext, ProviderError, Source};
use crate::store::{ItemKind, ItemRecord, forget, persist};
use crate::{Error, Result};

/// A discovered repository a factory accepted, with the sources its project
/// reads from.
struct Recognized {
    repository: DiscoveredRepository,
    sources: Vec<Arc<dyn Source>>,
}

impl Reconciler {
    /// Index one organization against its navigators.
    ///
    /// Only repositories one of the organization's factories recognises
    /// become projects; projects whose repository is no longer recognised
    /// are retired like vanished ones. New, renamed and revived projects
    /// (and projects whose last pass failed) are returned for the caller to
    /// index next.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`] if any navigator fails to list
    /// repositories or a factory fails to recognise one. Nothing is mutated
    /// in that case and the organization is marked for retry.
    pub async fn index_organization(
        &self,
        organization: &Arc<Organization>,
    ) -> Result<OrganizationPass> {
        if organization.is_deleted() {
            return Ok(aborted(organization));
        }
        organization.lock().status.started();

        let navigators = organization.navigators();
        tracing::debug!(
            organization = %organization.path(),
            navigators = navigators.len(),
            factories = organization.factories().len(),
            "Indexing organization"
        );

        let mut recognized: Vec<Recognized> = Vec::new();
        let mut declined: Vec<String> = Vec::new();
        let mut metadata = Metadata::new();
        for navigator in navigators {
            let context = OrganizationContext {
                organization: navigator.organization().to_string(),
                path: organization.path().clone(),
            };
            let unavailable = |e: &ProviderError| {
                let error = Error::ProviderUnavailable {
                    item: organization.path().to_string(),
                    reason: format!("{}: {}", navigator.id(), e),
                };
                tracing::warn!(organization = %organization.path(), error = %error, "Repository discovery failed, will retry");
                organization.lock().status.failed(&error);
                error
            };
            let repositories = match navigator.list_repositories(&context).await {
                Ok(repositories) => repositories,
                Err(e) => return Err(unavailable(&e)),
            };
            for repository in repositories {
                match recognize(organization.factories(), &**navigator, &repository).await {
                    Ok(Some(sources)) => recognized.push(Recognized { repository, sources }),
                    Ok(None) => {
                        tracing::debug!(organization = %organization.path(), repository = %repository.name, "No factory recognises repository");
                        declined.push(repository.name);
                    }
                    Err(e) => return Err(unavailable(&e)),
                }
            }
            match navigator.organization_metadata(&context).await {
                Ok(found) => metadata.extend(found),
                Err(e) => {
                    tracing::warn!(navigator = navigator.id(), error = %e, "Organization metadata unavailable");
                    metadata.extend(Metadata::failed(scope::ORGANIZATION, &e.to_string()));
                }
            }
        }

        let mut state = organization.lock();
        if organization.is_deleted() {
            return Ok(aborted(organization));
        }
        let (mut report, child_passes) =
            match self.apply_projects(organization, &mut state, &recognized) {
                Ok(applied) => applied,
                Err(e) => {
                    state.status.failed(&e);
                    return Err(e);
                }
            };
        report.skipped.extend(
            declined
                .into_iter()
                .map(|name| SkippedItem::new(name, "not recognised by any project factory")),
        );

        let decorated = apply_decorations(&mut state.info.decorations, scope::ORGANIZATION, &metadata);
        if decorated.changed() {
            report.decorated.push(organization.path().clone());
            persist(
                self.store(),
                &ItemRecord::from_info(ItemKind::Organization, organization.path().clone(), &state.info),
            );
        }
        state.status.succeeded();
        drop(state);

        report.log();
        Ok(OrganizationPass {
            report,
            child_passes,
        })
    }

    fn apply_projects(
        &self,
        organization: &Organization,
        state: &mut OrganizationState,
        discovered: &[Recognized],
    ) -> Result<(ReconcileReport, Vec<Arc<MultiBranchProject>>)> {
        let mut report = ReconcileReport::new(organization.path().clone());
        let mut child_passes = Vec::new();

        let existing: Vec<ExistingChild> = state
            .projects
            .iter()
            .map(|project| {
                let project_state = project.lock();
                ExistingChild {
                    encoded: project.name().to_string(),
                    original: project_state.info.original_name.clone(),
                    identity: project_state.info.identity.clone(),
                    obsolete: project_state.info.obsolete,
                }
            })
            .collect();
        let candidates: Vec<Candidate<'_>> = discovered
            .iter()
            .map(|found| Candidate {
                name: &found.repository.name,
                identity: found.repository.identity.as_deref(),
            })
            .collect();
        let plan = plan(
            &existing,
            &candidates,
            state.projects.encoder(),
            self.config().indexing.orphaned_items,
        );
        report.skipped = plan.skipped;

        for retirement in &plan.retire {
            if retirement.purge {
                if let Some(project) = state.projects.remove(&retirement.encoded) {
                    project.mark_deleted();
                    forget(self.store(), project.path());
                    tracing::debug!(project = %project.path(), "Deleted project");
                    report.retired.push(project.path().clone());
                }
            } else if let Some(project) = state.projects.get(&retirement.encoded).cloned() {
                let mut project_state = project.lock();
                project_state.info.obsolete = true;
                persist(
                    self.store(),
                    &ItemRecord::from_info(ItemKind::Project, project.path().clone(), &project_state.info),
                );
                drop(project_state);
                tracing::debug!(project = %project.path(), "Marked project obsolete");
                report.obsoleted.push(project.path().clone());
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
                } => Some((encoded.clone(), discovered[*index].repository.name.clone())),
                _ => None,
            })
            .collect();
        state.projects.rename_all(&renames)?;

        for step in &plan.steps {
            let Recognized {
                repository: repo,
                sources,
            } = &discovered[step.index()];
            let (project, created) = match step {
                Step::Create { .. } => {
                    let encoded = state.projects.register(&repo.name)?;
                    let info = ItemInfo::new(encoded.clone(), repo.name.clone())
                        .with_identity(repo.identity.clone());
                    let project = Arc::new(MultiBranchProject::new(
                        organization.path().child(&encoded),
                        Some(organization.path().clone()),
                        info,
                        sources.clone(),
                        self.config().encoder(),
                    ));
                    state.projects.insert(encoded, Arc::clone(&project));
                    tracing::debug!(project = %project.path(), name = %repo.name, "Created project");
                    report.created.push(project.path().clone());
                    (project, true)
                }
                Step::Retain {
                    encoded,
                    rename_from,
                    revive,
                    ..
                } => {
                    let Some(project) = state.projects.get(encoded).cloned() else {
                        continue;
                    };
                    if let Some(from) = rename_from {
                        tracing::debug!(project = %project.path(), from = %from, to = %repo.name, "Repository renamed");
                        report.renamed.push(Rename {
                            path: project.path().clone(),
                            from: from.clone(),
                            to: repo.name.clone(),
                        });
                    }
                    if *revive {
                        report.revived.push(project.path().clone());
                    }
                    (project, false)
                }
            };

            let index_next = {
                let mut project_state = project.lock();
                let renamed = project_state.info.original_name != repo.name;
                let revived = std::mem::replace(&mut project_state.info.obsolete, false);
                project_state.info.original_name = repo.name.clone();
                if repo.identity.is_some() {
                    project_state.info.identity = repo.identity.clone();
                }
                // Restored projects have no sources until their factory
                // supplies them; renamed repositories need fresh ones.
                if !created && (renamed || project_state.sources.is_empty()) {
                    project_state.sources = sources.clone();
                }

                // The project's own pass marks it indexed
                let decorated = merge_decorations(
                    &mut project_state.info.decorations,
                    scope::NAVIGATED_PROJECT,
                    &repo.metadata(),
                );
                if decorated.changed() {
                    report.decorated.push(project.path().clone());
                }

                if created || renamed || revived || decorated.changed() {
                    persist(
                        self.store(),
                        &ItemRecord::from_info(ItemKind::Project, project.path().clone(), &project_state.info),
                    );
                }
                created || renamed || revived || project_state.status.needs_retry
            };
            if index_next {
                child_passes.push(project);
            }
        }

        Ok((report, child_passes))
    }
}

fn aborted(organization: &Organization) -> OrganizationPass {
    let report = ReconcileReport::aborted(organization.path().clone());
    report.log();
    OrganizationPass {
        report,
        child_passes: Vec::new(),
    }
}
