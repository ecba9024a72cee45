//! Remote names that are unsafe as storage names
//!
//! Children keep their remote name verbatim for display while their storage
//! names stay distinct and filesystem-safe.

use std::collections::HashSet;

use branch_test_utils::TestIndexer;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn assert_safe(encoded: &str) {
    assert_ne!(encoded, ".");
    assert_ne!(encoded, "..");
    assert!(!encoded.is_empty());
    for forbidden in ['/', '\\', '?', '*', ':', '<', '>', '|', '"'] {
        assert!(
            !encoded.contains(forbidden),
            "{:?} contains {:?}",
            encoded,
            forbidden
        );
    }
}

#[tokio::test]
async fn test_wildcard_and_separator_repositories() {
    let indexer = TestIndexer::new();
    for name in ["a?", "a*", "a/b"] {
        indexer.scm.create_repository(name);
    }
    let organization = indexer.organization("CloudBeers");

    indexer.index_organization(&organization).await;

    let projects = organization.projects();
    assert_eq!(projects.len(), 3);

    let mut encoded = HashSet::new();
    for name in ["a?", "a*", "a/b"] {
        let project = organization.project(name).unwrap();
        assert_eq!(project.display_name(), name);
        assert_safe(project.name());
        assert!(encoded.insert(project.name().to_string()));
        assert_eq!(
            organization.project_by_name(project.name()).unwrap().original_name(),
            name
        );
        assert_eq!(indexer.branch_names(&project), vec!["master"]);
    }
    assert_eq!(indexer.engine.count(), 3);
}

#[rstest]
#[case(&[".", "..", "../.."])]
#[case(&["feature/login", "feature-login", "feature_login"])]
#[case(&["特征", "ünïcödé", "ветка/тест"])]
#[case(&["CON", "con", "nul.txt"])]
#[tokio::test]
async fn test_branch_names_round_trip(#[case] names: &[&str]) {
    let indexer = TestIndexer::new();
    indexer.scm.create_empty_repository("foo");
    for name in names {
        indexer.scm.create_branch("foo", name);
    }
    let project = indexer.project("foo");

    indexer.index_project(&project).await;

    let mut encoded = HashSet::new();
    for name in names {
        let branch = indexer.branch(&project, name);
        assert_eq!(branch.display_name(), *name);
        assert_safe(branch.name());
        assert!(encoded.insert(branch.name().to_string()));
        assert_eq!(
            project.branch_by_name(branch.name()).unwrap().original_name(),
            *name
        );
    }

    let mut built = indexer.engine.built_names();
    built.sort();
    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(built, expected);
}

#[tokio::test]
async fn test_dot_named_project_is_stored_safely() {
    let indexer = TestIndexer::persistent();
    indexer.scm.create_repository("..");
    let project = indexer.project("..");

    indexer.index_project(&project).await;

    let root = indexer.store_root().unwrap();
    let project_dir = root.join(project.name());
    assert!(project_dir.join("item.toml").exists());
    assert!(project_dir.starts_with(root));
    assert_eq!(project.display_name(), "..");
}

#[tokio::test]
async fn test_long_names_are_shortened() {
    let indexer = TestIndexer::new();
    let long = "release/".to_string() + &"x".repeat(200);
    indexer.scm.create_empty_repository("foo");
    indexer.scm.create_branch("foo", &long);
    let project = indexer.project("foo");

    indexer.index_project(&project).await;

    let branch = indexer.branch(&project, &long);
    assert!(branch.name().len() < 64);
    assert_eq!(branch.display_name(), long);
}
