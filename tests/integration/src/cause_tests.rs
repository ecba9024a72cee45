//! Causes recorded on builds requested by indexing and by hand

use branch_core::cause::CauseKind;
use branch_core::{BuildResult, Cause, Error};
use branch_test_utils::TestIndexer;
use pretty_assertions::assert_eq;

fn provider_causes() -> Vec<Cause> {
    vec![Cause::anonymous_user(), Cause::remote("test", "data")]
}

#[tokio::test]
async fn test_indexing_build_without_provider_causes() {
    let indexer = TestIndexer::new();
    indexer.scm.create_repository("foo");
    let project = indexer.project("foo");

    indexer.index_project(&project).await;

    let build = indexer.branch(&project, "master").last_build().unwrap();
    assert_eq!(build.causes.as_slice(), &[Cause::BranchIndexing]);
}

#[tokio::test]
async fn test_provider_causes_are_merged_after_indexing_cause() {
    let indexer = TestIndexer::new();
    indexer.scm.create_repository("foo");
    let project = indexer.project_with_causes("foo", provider_causes());

    indexer.index_project(&project).await;

    let build = indexer.branch(&project, "master").last_build().unwrap();
    assert_eq!(
        build.causes.as_slice(),
        &[
            Cause::BranchIndexing,
            Cause::anonymous_user(),
            Cause::remote("test", "data"),
        ]
    );
    let requests = indexer.engine.requests_for("master");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].causes, build.causes);
}

#[tokio::test]
async fn test_duplicate_provider_causes_are_dropped() {
    let indexer = TestIndexer::new();
    indexer.scm.create_repository("foo");
    let mut causes = provider_causes();
    causes.extend(provider_causes());
    causes.push(Cause::BranchIndexing);
    let project = indexer.project_with_causes("foo", causes);

    indexer.index_project(&project).await;

    let build = indexer.branch(&project, "master").last_build().unwrap();
    assert_eq!(build.causes.len(), 3);
    assert_eq!(build.causes.count_of(CauseKind::BranchIndexing), 1);
    assert_eq!(build.causes.count_of(CauseKind::Remote), 1);
}

#[tokio::test]
async fn test_navigated_sources_contribute_causes() {
    let indexer = TestIndexer::new();
    indexer.scm.create_repository("foo");
    let navigator = indexer
        .scm
        .navigator("CloudBeers")
        .with_causes(provider_causes())
        .into_arc();
    let organization = indexer
        .tree
        .create_organization("CloudBeers", vec![navigator])
        .unwrap();

    indexer.index_organization(&organization).await;

    let project = organization.project("foo").unwrap();
    let build = indexer.branch(&project, "master").last_build().unwrap();
    assert_eq!(build.causes.len(), 3);
    assert!(build.causes.contains(&Cause::remote("test", "data")));
}

#[tokio::test]
async fn test_manual_build_uses_given_causes_only() {
    let indexer = TestIndexer::new();
    let revision = indexer.scm.create_repository("foo");
    let project = indexer.project_with_causes("foo", provider_causes());
    indexer.index_project(&project).await;
    let master = indexer.branch(&project, "master");

    let handle = indexer
        .coordinator
        .request_build(master.path(), vec![Cause::user("alice")])
        .await
        .unwrap();
    assert_eq!(handle.number(), 2);
    assert_eq!(handle.wait().await, BuildResult::Success);

    let build = master.build(2).unwrap();
    assert_eq!(build.causes.as_slice(), &[Cause::user("alice")]);
    assert_eq!(build.revision, revision);
    assert!(build.finished_at.is_some());
}

#[tokio::test]
async fn test_manual_build_of_unknown_branch_fails() {
    let indexer = TestIndexer::new();
    indexer.scm.create_repository("foo");
    let project = indexer.project("foo");
    indexer.index_project(&project).await;

    let result = indexer
        .coordinator
        .request_build(&project.path().child("nope"), vec![Cause::anonymous_user()])
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}
