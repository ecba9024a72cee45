//! Triggers, pass coalescing, watermarks and event routing

use std::sync::Arc;
use std::time::Duration;

use branch_core::{
    BuildResult, BuildStatus, Error, EventKind, IndexTarget, IndexerConfig, ItemPath, ScmEvent,
};
use branch_test_utils::{RecordingBuildEngine, TestIndexer, wait_until};
use pretty_assertions::assert_eq;

mod coalescing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_triggers_during_a_pass_collapse_into_one_follow_up() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");
        let target = IndexTarget::Project(Arc::clone(&project));

        indexer.scm.pause();
        let first = indexer.coordinator.index(target.clone());
        wait_until(|| indexer.scm.list_calls("foo") == 1).await;

        let second = indexer.coordinator.index(target.clone());
        let third = indexer.coordinator.index(target.clone());
        assert!(first < second && second < third);
        indexer.scm.resume();

        indexer.coordinator.await_watermark(third).await;
        assert_eq!(indexer.scm.list_calls("foo"), 2);
        assert_eq!(project.status().passes, 2);
    }

    #[tokio::test]
    async fn test_unrelated_items_index_concurrently() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_repository("bar");
        let foo = indexer.project("foo");
        let bar = indexer.project("bar");

        indexer.scm.pause();
        indexer.coordinator.index(IndexTarget::Project(Arc::clone(&foo)));
        indexer.coordinator.index(IndexTarget::Project(Arc::clone(&bar)));
        // Both passes reach the provider while neither has finished
        wait_until(|| indexer.scm.list_calls("foo") == 1 && indexer.scm.list_calls("bar") == 1).await;
        indexer.scm.resume();

        indexer.coordinator.await_quiescence().await;
        assert!(foo.is_indexed());
        assert!(bar.is_indexed());
    }
}

mod watermark_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_watermark_covers_builds() {
        let indexer = TestIndexer::new()
            .with_engine(RecordingBuildEngine::new().with_delay(Duration::from_millis(50)));
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");

        let mark = indexer.coordinator.index(IndexTarget::Project(Arc::clone(&project)));
        indexer.coordinator.await_watermark(mark).await;

        let build = indexer.branch(&project, "master").last_build().unwrap();
        assert_eq!(build.status, BuildStatus::Completed(BuildResult::Success));
        assert_eq!(indexer.engine.count(), 1);
    }

    #[tokio::test]
    async fn test_watermark_covers_cascaded_project_passes() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");

        let mark = indexer
            .coordinator
            .index(IndexTarget::Organization(Arc::clone(&organization)));
        indexer.coordinator.await_watermark(mark).await;

        let project = organization.project("foo").unwrap();
        assert!(project.is_indexed());
        let build = indexer.branch(&project, "master").last_build().unwrap();
        assert!(build.status.is_terminal());
    }

    #[tokio::test]
    async fn test_watermarks_increase_and_idle_marks_settle() {
        let indexer = TestIndexer::new();
        let before = indexer.coordinator.watermark();

        let mark = indexer.coordinator.tick();

        assert!(mark > before);
        assert_eq!(indexer.coordinator.watermark(), mark);
        indexer.coordinator.await_watermark(mark).await;
        indexer.coordinator.await_quiescence().await;
    }

    #[tokio::test]
    async fn test_failed_build_is_recorded() {
        let indexer = TestIndexer::new();
        indexer.engine.fail_branch("feature");
        indexer.engine.error_branch("broken");
        indexer.scm.create_repository("foo");
        indexer.scm.create_branch("foo", "feature");
        indexer.scm.create_branch("foo", "broken");
        let project = indexer.project("foo");

        indexer.index_project(&project).await;

        let result = |name: &str| indexer.branch(&project, name).last_build().unwrap().status;
        assert_eq!(result("master"), BuildStatus::Completed(BuildResult::Success));
        assert_eq!(result("feature"), BuildStatus::Completed(BuildResult::Failure));
        assert_eq!(result("broken"), BuildStatus::Completed(BuildResult::Failure));
    }
}

mod event_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_repository_update_reaches_matching_project() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.create_repository("bar");
        let foo = indexer.project("foo");
        let bar = indexer.project("bar");
        indexer.index_project(&foo).await;
        indexer.index_project(&bar).await;

        let revision = indexer.scm.add_revision("foo", "master");
        let mark = indexer
            .coordinator
            .fire(ScmEvent::repository(EventKind::Updated, None, "foo").with_origin("hook"));
        indexer.coordinator.await_watermark(mark).await;

        assert_eq!(indexer.branch(&foo, "master").revision(), Some(revision));
        assert_eq!(indexer.scm.list_calls("foo"), 2);
        assert_eq!(indexer.scm.list_calls("bar"), 1);
    }

    #[tokio::test]
    async fn test_repository_creation_reaches_organization() {
        let indexer = TestIndexer::new();
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        assert!(organization.projects().is_empty());

        indexer.scm.create_repository("foo");
        let event = ScmEvent::from_json(
            r#"{
                "kind": "created",
                "scope": { "type": "repository", "organization": "CloudBeers", "repository": "foo" }
            }"#,
        )
        .unwrap();
        let mark = indexer.coordinator.fire(event);
        indexer.coordinator.await_watermark(mark).await;

        let project = organization.project("foo").unwrap();
        assert_eq!(indexer.branch_names(&project), vec!["master"]);
    }

    #[tokio::test]
    async fn test_events_for_other_organizations_are_ignored() {
        let indexer = TestIndexer::new();
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;

        let mark = indexer
            .coordinator
            .fire(ScmEvent::organization(EventKind::Updated, "Elsewhere"));
        indexer.coordinator.await_watermark(mark).await;

        assert_eq!(indexer.scm.list_calls("CloudBeers"), 1);
    }

    #[tokio::test]
    async fn test_global_event_reaches_top_level_items() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");
        let project = indexer.project("foo");

        let mark = indexer.coordinator.fire(ScmEvent::global(EventKind::Updated));
        indexer.coordinator.await_watermark(mark).await;

        assert!(organization.is_indexed());
        assert!(project.is_indexed());
    }
}

mod tick_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_tick_indexes_nested_projects() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        assert_eq!(indexer.scm.list_calls("foo"), 1);

        let mark = indexer.coordinator.tick();
        indexer.coordinator.await_watermark(mark).await;

        assert_eq!(indexer.scm.list_calls("CloudBeers"), 2);
        assert_eq!(indexer.scm.list_calls("foo"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");

        let task = indexer.coordinator.spawn_periodic_every(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(150)).await;
        indexer.coordinator.await_quiescence().await;

        assert_eq!(indexer.scm.list_calls("foo"), 2);
        assert!(project.is_indexed());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_follow_configured_interval() {
        let config = IndexerConfig::parse("[indexing]\ntick_interval_secs = 30\n").unwrap();
        let indexer = TestIndexer::with_config(config);
        indexer.scm.create_repository("foo");
        indexer.project("foo");

        let task = indexer.coordinator.spawn_periodic();
        tokio::time::sleep(Duration::from_secs(100)).await;
        indexer.coordinator.await_quiescence().await;

        assert_eq!(indexer.scm.list_calls("foo"), 3);
        task.abort();
    }
}

mod deletion_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_deleted_project_cannot_be_scheduled() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;

        indexer.tree.delete(project.path()).unwrap();

        assert!(project.is_deleted());
        assert!(matches!(
            indexer.coordinator.schedule(project.path()),
            Err(Error::NotFound(_))
        ));
        assert!(indexer.tree.project("foo").is_none());
    }

    #[tokio::test]
    async fn test_deletion_during_pass_aborts_it() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");
        let mut reports = indexer.coordinator.subscribe_reports();

        indexer.scm.pause();
        let mark = indexer.coordinator.index(IndexTarget::Project(Arc::clone(&project)));
        wait_until(|| indexer.scm.list_calls("foo") == 1).await;
        indexer.tree.delete(project.path()).unwrap();
        indexer.scm.resume();
        indexer.coordinator.await_watermark(mark).await;

        assert!(project.branches().is_empty());
        assert_eq!(indexer.engine.count(), 0);
        assert!(reports.try_recv().unwrap().aborted);
    }

    #[tokio::test]
    async fn test_build_for_deleted_branch_is_rejected() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        let path = ItemPath::from_segments(["foo", "master"]);

        indexer.tree.delete(&path).unwrap();

        let result = indexer.coordinator.request_build(&path, Vec::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
