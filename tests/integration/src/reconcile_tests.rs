//! Creating, updating, renaming and retiring children across passes

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use branch_core::branding::DecorationKind;
use branch_core::{BasicProjectFactory, IndexerConfig, OrphanedItemStrategy, ReconcileReport};
use branch_test_utils::TestIndexer;
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

fn obsolete_config() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.indexing.orphaned_items = OrphanedItemStrategy::MarkObsolete;
    config
}

/// Reports received so far, oldest first.
fn drain(reports: &mut broadcast::Receiver<ReconcileReport>) -> Vec<ReconcileReport> {
    let mut received = Vec::new();
    while let Ok(report) = reports.try_recv() {
        received.push(report);
    }
    received
}

mod project_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "feature");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        assert_eq!(indexer.engine.count(), 2);

        let mut reports = indexer.coordinator.subscribe_reports();
        indexer.index_project(&project).await;

        let received = drain(&mut reports);
        assert_eq!(received.len(), 1);
        assert!(received[0].is_noop());
        assert_eq!(indexer.engine.count(), 2);
        assert_eq!(indexer.branch_names(&project), vec!["feature", "master"]);
    }

    #[tokio::test]
    async fn test_new_revision_triggers_build() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;

        let revision = indexer.scm.add_revision("foo", "master");
        let mut reports = indexer.coordinator.subscribe_reports();
        indexer.index_project(&project).await;

        let master = indexer.branch(&project, "master");
        assert_eq!(master.revision(), Some(revision.clone()));
        assert_eq!(master.builds().len(), 2);
        assert_eq!(master.last_build().unwrap().revision, revision);

        let report = drain(&mut reports).remove(0);
        assert_eq!(report.updated, vec![master.path().clone()]);
        assert_eq!(report.builds, vec![master.path().clone()]);
    }

    #[tokio::test]
    async fn test_build_on_create_disabled_records_baseline() {
        let mut config = IndexerConfig::default();
        config.builds.build_on_create = false;
        let indexer = TestIndexer::with_config(config);
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");

        indexer.index_project(&project).await;
        assert_eq!(indexer.engine.count(), 0);
        indexer.index_project(&project).await;
        assert_eq!(indexer.engine.count(), 0);

        indexer.scm.add_revision("foo", "master");
        indexer.index_project(&project).await;
        assert_eq!(indexer.engine.built_names(), vec!["master"]);
    }

    #[tokio::test]
    async fn test_deleted_branch_is_removed() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "feature");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        let feature = indexer.branch(&project, "feature");

        indexer.scm.delete_branch("foo", "feature");
        indexer.index_project(&project).await;

        assert!(project.branch("feature").is_none());
        assert!(feature.is_deleted());
        assert_eq!(indexer.branch_names(&project), vec!["master"]);
    }

    #[tokio::test]
    async fn test_deleted_branch_is_kept_obsolete_and_revived() {
        let indexer = TestIndexer::with_config(obsolete_config());
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "feature");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        let feature = indexer.branch(&project, "feature");

        indexer.scm.delete_branch("foo", "feature");
        indexer.index_project(&project).await;
        assert!(feature.is_obsolete());
        assert!(!feature.is_deleted());

        indexer.scm.restore_branch("foo", "feature");
        let mut reports = indexer.coordinator.subscribe_reports();
        indexer.index_project(&project).await;

        assert!(!feature.is_obsolete());
        assert!(Arc::ptr_eq(&feature, &indexer.branch(&project, "feature")));
        let report = drain(&mut reports).remove(0);
        assert_eq!(report.revived, vec![feature.path().clone()]);
        // Same revision as before it disappeared
        assert_eq!(feature.builds().len(), 1);
    }

    #[tokio::test]
    async fn test_recreated_branch_replaces_obsolete_one() {
        let indexer = TestIndexer::with_config(obsolete_config());
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "feature");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        let old = indexer.branch(&project, "feature");

        indexer.scm.delete_branch("foo", "feature");
        indexer.index_project(&project).await;
        indexer.scm.create_branch("foo", "feature");
        indexer.index_project(&project).await;

        let new = indexer.branch(&project, "feature");
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(old.is_deleted());
        assert_ne!(old.identity(), new.identity());
        assert_eq!(new.builds().len(), 1);
    }

    #[tokio::test]
    async fn test_renamed_branch_keeps_its_project() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "feature");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        let feature = indexer.branch(&project, "feature");
        let path = feature.path().clone();

        indexer.scm.rename_branch("foo", "feature", "feature-renamed");
        let mut reports = indexer.coordinator.subscribe_reports();
        indexer.index_project(&project).await;

        assert!(project.branch("feature").is_none());
        let renamed = indexer.branch(&project, "feature-renamed");
        assert!(Arc::ptr_eq(&feature, &renamed));
        assert_eq!(renamed.path(), &path);
        assert_eq!(renamed.display_name(), "feature-renamed");
        // Revision unchanged, so nothing to build
        assert_eq!(renamed.builds().len(), 1);

        let report = drain(&mut reports).remove(0);
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(report.renamed[0].from, "feature");
        assert_eq!(report.renamed[0].to, "feature-renamed");
    }

    #[tokio::test]
    async fn test_branches_swapping_names() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "left");
        indexer.scm.create_branch("foo", "right");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        let left = indexer.branch(&project, "left");
        let right = indexer.branch(&project, "right");

        indexer.scm.rename_branch("foo", "left", "tmp");
        indexer.scm.rename_branch("foo", "right", "left");
        indexer.scm.rename_branch("foo", "tmp", "right");
        indexer.index_project(&project).await;

        assert!(Arc::ptr_eq(&left, &indexer.branch(&project, "right")));
        assert!(Arc::ptr_eq(&right, &indexer.branch(&project, "left")));
    }

    #[tokio::test]
    async fn test_invalid_and_duplicate_names_are_skipped() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "bad\0name");
        indexer.scm.create_branch("foo", "master");
        let project = indexer.project("foo");
        let mut reports = indexer.coordinator.subscribe_reports();

        indexer.index_project(&project).await;

        assert_eq!(indexer.branch_names(&project), vec!["master"]);
        let report = drain(&mut reports).remove(0);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["bad\0name", "master"]);
        assert_eq!(indexer.engine.count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider_leaves_tree_untouched() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;

        indexer.scm.delete_branch("foo", "master");
        indexer.scm.set_unavailable(true);
        indexer.index_project(&project).await;

        assert_eq!(indexer.branch_names(&project), vec!["master"]);
        let status = project.status();
        assert!(status.needs_retry);
        assert!(status.last_error.unwrap().contains("offline"));

        indexer.scm.set_unavailable(false);
        indexer.index_project(&project).await;
        assert!(project.branches().is_empty());
        assert!(!project.status().needs_retry);
    }
}

mod organization_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_organization_pass_cascades_into_new_projects() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_repository("bar");
        indexer.scm.create_empty_repository("empty");
        let organization = indexer.organization("CloudBeers");

        indexer.index_organization(&organization).await;

        let names: Vec<String> = organization
            .projects_sorted()
            .iter()
            .map(|p| p.original_name())
            .collect();
        assert_eq!(names, vec!["bar", "empty", "foo"]);
        for project in organization.projects() {
            assert!(project.is_indexed());
        }
        let mut built = indexer.engine.requests();
        built.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(built.len(), 2);
        assert_eq!(
            organization.project("foo").unwrap().branch("master").unwrap().path(),
            &organization.path().child("foo").child("master")
        );
    }

    #[tokio::test]
    async fn test_unchanged_projects_are_not_reindexed() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        assert_eq!(indexer.scm.list_calls("foo"), 1);

        indexer.index_organization(&organization).await;

        assert_eq!(indexer.scm.list_calls("foo"), 1);
        assert_eq!(indexer.scm.list_calls("CloudBeers"), 2);
    }

    #[tokio::test]
    async fn test_renamed_repository_keeps_project_and_gets_new_source() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        let project = organization.project("foo").unwrap();

        indexer.scm.rename_repository("foo", "foo-renamed");
        indexer.index_organization(&organization).await;

        let renamed = organization.project("foo-renamed").unwrap();
        assert!(Arc::ptr_eq(&project, &renamed));
        assert_eq!(renamed.display_name(), "foo-renamed");
        assert!(renamed.has_source_for("foo-renamed"));
        assert!(!renamed.has_source_for("foo"));
        // The rename cascaded into a project pass against the new source
        assert_eq!(indexer.scm.list_calls("foo-renamed"), 1);
        assert_eq!(indexer.branch_names(&renamed), vec!["master"]);
    }

    #[tokio::test]
    async fn test_removed_repository_deletes_project_and_branches() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        let project = organization.project("foo").unwrap();
        let master = indexer.branch(&project, "master");

        indexer.scm.delete_repository("foo");
        indexer.index_organization(&organization).await;

        assert!(organization.projects().is_empty());
        assert!(project.is_deleted());
        assert!(master.is_deleted());
    }

    #[tokio::test]
    async fn test_failed_project_is_retried_by_organization_pass() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        let project = organization.project("foo").unwrap();

        indexer.scm.set_unavailable(true);
        indexer.index_project(&project).await;
        assert!(project.status().needs_retry);

        indexer.scm.set_unavailable(false);
        indexer.index_organization(&organization).await;

        assert!(!project.status().needs_retry);
        assert_eq!(indexer.scm.list_calls("foo"), 3);
    }

    #[tokio::test]
    async fn test_navigated_project_is_unindexed_until_its_own_pass_succeeds() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.set_description("foo", "The Foo Project");
        indexer.scm.set_unavailable_for("foo", true);
        let organization = indexer.organization("CloudBeers");

        indexer.index_organization(&organization).await;

        let project = organization.project("foo").unwrap();
        assert!(organization.is_indexed());
        assert!(project.status().needs_retry);
        assert!(!project.is_indexed());
        assert_eq!(project.description().as_deref(), Some("The Foo Project"));
        assert!(project.decorations().get(DecorationKind::SourceLink).is_none());

        indexer.scm.set_unavailable_for("foo", false);
        indexer.index_project(&project).await;

        assert!(project.is_indexed());
        assert!(project.decorations().get(DecorationKind::SourceLink).is_some());
    }

    #[tokio::test]
    async fn test_unrecognised_repositories_do_not_become_projects() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("service-a");
        indexer.scm.create_repository("docs");
        let factory =
            BasicProjectFactory::with_criteria(|repo| repo.name.starts_with("service-")).into_arc();
        let organization = indexer.organization_with_factories("CloudBeers", vec![factory]);
        let mut reports = indexer.coordinator.subscribe_reports();

        indexer.index_organization(&organization).await;

        let names: Vec<String> = organization
            .projects()
            .iter()
            .map(|p| p.original_name())
            .collect();
        assert_eq!(names, vec!["service-a"]);
        assert_eq!(indexer.scm.list_calls("docs"), 0);
        let report = drain(&mut reports)
            .into_iter()
            .find(|report| &report.item == organization.path())
            .unwrap();
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["docs"]);
    }

    #[tokio::test]
    async fn test_project_is_retired_when_no_longer_recognised() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let recognised = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&recognised);
        let factory =
            BasicProjectFactory::with_criteria(move |_| flag.load(Ordering::SeqCst)).into_arc();
        let organization = indexer.organization_with_factories("CloudBeers", vec![factory]);
        indexer.index_organization(&organization).await;
        let project = organization.project("foo").unwrap();
        let master = indexer.branch(&project, "master");

        recognised.store(false, Ordering::SeqCst);
        indexer.index_organization(&organization).await;

        assert!(organization.projects().is_empty());
        assert!(project.is_deleted());
        assert!(master.is_deleted());
    }
}
