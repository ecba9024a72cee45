//! Decoration lifecycle across organization, project, branch and build
//!
//! Each pass replaces the decorations it owns with what the provider reports
//! now: nothing before the first pass, nothing after an empty answer, exactly
//! the provider's values otherwise.

use branch_core::branding::DecorationKind;
use branch_core::{BuildStatus, BuildResult, ObjectMetadata};
use branch_test_utils::TestIndexer;
use branch_test_utils::scm::{branch_url, revision_url, source_url};
use pretty_assertions::assert_eq;

mod standalone_project_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_project_is_undecorated_before_indexing() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.set_description("foo", "The Foo Project");

        let project = indexer.project("foo");

        assert!(!project.is_indexed());
        assert!(project.decorations().is_empty());
        assert_eq!(project.display_name(), "foo");
        assert_eq!(project.description(), None);
    }

    #[tokio::test]
    async fn test_repository_without_branches_has_no_source_link() {
        let indexer = TestIndexer::new();
        indexer.scm.create_empty_repository("foo");
        let project = indexer.project("foo");

        indexer.index_project(&project).await;

        assert!(project.is_indexed());
        assert!(project.decorations().is_empty());
        assert!(project.branches().is_empty());
        assert_eq!(indexer.engine.count(), 0);
    }

    #[tokio::test]
    async fn test_first_branch_brings_source_branch_and_revision_links() {
        let indexer = TestIndexer::new();
        indexer.scm.create_empty_repository("foo");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;

        let revision = indexer.scm.create_branch("foo", "master");
        indexer.index_project(&project).await;

        let decorations = project.decorations();
        let source = decorations.link(DecorationKind::SourceLink).unwrap();
        assert_eq!(source.url, source_url("foo"));
        assert_eq!(source.title.as_deref(), Some("source"));

        let master = indexer.branch(&project, "master");
        assert_eq!(master.display_name(), "master");
        assert_eq!(
            master.decorations().link(DecorationKind::BranchLink).unwrap().url,
            branch_url("foo", "master")
        );

        let build = master.last_build().unwrap();
        assert_eq!(build.number, 1);
        assert_eq!(build.revision, revision);
        assert_eq!(build.status, BuildStatus::Completed(BuildResult::Success));
        let revision_link = build.decorations.link(DecorationKind::RevisionLink).unwrap();
        assert_eq!(revision_link.url, revision_url("foo", &revision));
        assert_eq!(revision_link.title.as_deref(), Some("revision"));
    }

    #[tokio::test]
    async fn test_repository_fields_become_object_metadata() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.set_description("foo", "The Foo Project");
        indexer.scm.set_url("foo", "http://foo.example.com/");
        indexer.scm.set_display_name("foo", "Foo");
        indexer.scm.set_icon("foo", "icon-repo");
        let project = indexer.project("foo");

        indexer.index_project(&project).await;

        assert_eq!(project.display_name(), "Foo");
        assert_eq!(project.original_name(), "foo");
        assert_eq!(project.description().as_deref(), Some("The Foo Project"));
        assert_eq!(
            project.decorations().icon().unwrap().class_name,
            "icon-repo"
        );
    }

    #[tokio::test]
    async fn test_failed_kind_is_removed_others_kept() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.set_description("foo", "The Foo Project");
        indexer.scm.set_icon("foo", "icon-repo");
        let project = indexer.project("foo");
        indexer.index_project(&project).await;
        assert!(project.decorations().icon().is_some());

        indexer.scm.fail_decoration(DecorationKind::Icon);
        indexer.index_project(&project).await;

        let decorations = project.decorations();
        assert!(decorations.icon().is_none());
        assert!(decorations.object_metadata().is_some());
        assert!(decorations.link(DecorationKind::SourceLink).is_some());
    }

    #[tokio::test]
    async fn test_failed_revision_link_leaves_build_undecorated() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.fail_decoration(DecorationKind::RevisionLink);
        let project = indexer.project("foo");

        indexer.index_project(&project).await;

        let build = indexer.branch(&project, "master").last_build().unwrap();
        assert!(build.decorations.is_empty());
        assert_eq!(build.status, BuildStatus::Completed(BuildResult::Success));
    }
}

mod organization_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_organization_description_and_url_only() {
        let indexer = TestIndexer::new();
        indexer.scm.set_organization_description("The Foo of Manchu");
        indexer.scm.set_organization_url("http://foomanchu.example.com/");
        let organization = indexer.organization("CloudBeers");
        assert!(organization.decorations().is_empty());
        assert!(!organization.is_indexed());

        indexer.index_organization(&organization).await;

        let decorations = organization.decorations();
        assert_eq!(
            decorations.object_metadata(),
            Some(&ObjectMetadata {
                description: Some("The Foo of Manchu".to_string()),
                url: Some("http://foomanchu.example.com/".to_string()),
                display_name: None,
            })
        );
        assert_eq!(organization.display_name(), "CloudBeers");
        assert_eq!(
            decorations
                .link(DecorationKind::OrganizationLink)
                .unwrap()
                .title
                .as_deref(),
            Some("organization")
        );
        assert!(decorations.icon().is_none());
    }

    #[tokio::test]
    async fn test_organization_display_name_override() {
        let indexer = TestIndexer::new();
        indexer.scm.set_organization_display_name("Cloud Beers, Inc.");
        indexer.scm.set_organization_icon("icon-org");
        let organization = indexer.organization("CloudBeers");

        indexer.index_organization(&organization).await;

        assert_eq!(organization.display_name(), "Cloud Beers, Inc.");
        assert_eq!(organization.original_name(), "CloudBeers");
        assert_eq!(organization.decorations().icon().unwrap().class_name, "icon-org");
    }

    #[tokio::test]
    async fn test_navigated_project_keeps_both_decoration_owners() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.set_description("foo", "The Foo Project");
        let organization = indexer.organization("CloudBeers");

        indexer.index_organization(&organization).await;

        let project = organization.project("foo").unwrap();
        assert!(!project.is_standalone());
        // Description comes from the organization pass, the source link
        // from the project's own pass.
        assert_eq!(project.description().as_deref(), Some("The Foo Project"));
        assert_eq!(
            project.decorations().link(DecorationKind::SourceLink).unwrap().url,
            source_url("foo")
        );

        indexer.index_project(&project).await;
        assert_eq!(project.description().as_deref(), Some("The Foo Project"));
    }

    #[tokio::test]
    async fn test_reindexing_with_same_metadata_changes_nothing() {
        let indexer = TestIndexer::new();
        indexer.scm.create_repository("foo");
        indexer.scm.set_organization_description("The Foo of Manchu");
        let organization = indexer.organization("CloudBeers");
        indexer.index_organization(&organization).await;
        let before = organization.decorations();

        let mut reports = indexer.coordinator.subscribe_reports();
        indexer.index_organization(&organization).await;

        assert_eq!(organization.decorations(), before);
        let report = reports.try_recv().unwrap();
        assert_eq!(&report.item, organization.path());
        assert!(report.decorated.is_empty());
    }
}
