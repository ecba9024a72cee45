//! Item tree persistence across restarts

use branch_core::store::{ItemKind, ItemRecord};
use branch_core::{FsItemStore, ItemPath, ItemStore};
use branch_test_utils::TestIndexer;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_restart_restores_names_and_revisions() {
    let indexer = TestIndexer::persistent();
    let revision = indexer.scm.create_repository("foo");
    indexer.scm.create_branch("foo", "feature/login");
    indexer.scm.set_description("foo", "The Foo Project");
    let project = indexer.project("foo");
    indexer.index_project(&project).await;
    let encoded = indexer.branch(&project, "feature/login").name().to_string();

    let indexer = indexer.restart();

    let project = indexer.tree.project("foo").unwrap();
    assert!(project.is_indexed());
    assert_eq!(project.description().as_deref(), Some("The Foo Project"));
    assert_eq!(indexer.branch_names(&project), vec!["feature/login", "master"]);
    assert_eq!(indexer.branch(&project, "feature/login").name(), encoded);
    assert_eq!(indexer.branch(&project, "master").revision(), Some(revision));
}

#[tokio::test]
async fn test_restart_does_not_rebuild_unchanged_branches() {
    let indexer = TestIndexer::persistent();
    indexer.scm.create_repository("foo");
    let project = indexer.project("foo");
    indexer.index_project(&project).await;
    assert_eq!(indexer.engine.count(), 1);

    let indexer = indexer.restart();
    let project = indexer.tree.project("foo").unwrap();
    indexer.index_project(&project).await;
    assert_eq!(indexer.engine.count(), 1);

    indexer.scm.add_revision("foo", "master");
    indexer.index_project(&project).await;
    assert_eq!(indexer.engine.count(), 2);
}

#[tokio::test]
async fn test_restart_restores_organization_tree() {
    let indexer = TestIndexer::persistent();
    indexer.scm.create_repository("a/b");
    indexer.scm.set_organization_description("The Foo of Manchu");
    let organization = indexer.organization("CloudBeers");
    indexer.index_organization(&organization).await;
    let encoded = organization.project("a/b").unwrap().name().to_string();

    let indexer = indexer.restart();

    let organization = indexer.tree.organization("CloudBeers").unwrap();
    assert_eq!(organization.navigators().len(), 1);
    assert_eq!(organization.description().as_deref(), Some("The Foo of Manchu"));
    let project = organization.project("a/b").unwrap();
    assert_eq!(project.name(), encoded);
    assert!(project.has_source_for("a/b"));
    assert_eq!(indexer.branch_names(&project), vec!["master"]);

    // The restored source still works
    indexer.scm.create_branch("a/b", "develop");
    indexer.index_project(&project).await;
    assert_eq!(indexer.branch_names(&project), vec!["develop", "master"]);
}

#[tokio::test]
async fn test_retired_items_leave_the_store() {
    let indexer = TestIndexer::persistent();
    indexer.scm.create_repository("foo");
    indexer.scm.create_branch("foo", "feature");
    let project = indexer.project("foo");
    indexer.index_project(&project).await;
    let root = indexer.store_root().unwrap().to_path_buf();
    assert!(root.join("foo/items/feature/item.toml").exists());

    indexer.scm.delete_branch("foo", "feature");
    indexer.index_project(&project).await;

    assert!(!root.join("foo/items/feature").exists());
    let store = FsItemStore::new(&root);
    let names: Vec<String> = store
        .load_children(Some(&ItemPath::root("foo")))
        .unwrap()
        .iter()
        .map(|r| r.original_name.clone())
        .collect();
    assert_eq!(names, vec!["master"]);
}

#[tokio::test]
async fn test_deleted_project_leaves_the_store() {
    let indexer = TestIndexer::persistent();
    indexer.scm.create_repository("foo");
    let project = indexer.project("foo");
    indexer.index_project(&project).await;

    indexer.tree.delete(project.path()).unwrap();

    let root = indexer.store_root().unwrap();
    assert!(!root.join("foo").exists());
    let indexer = indexer.restart();
    assert!(indexer.tree.items().is_empty());
}

#[tokio::test]
async fn test_top_level_branch_records_are_ignored() {
    let indexer = TestIndexer::persistent();
    let store = FsItemStore::new(indexer.store_root().unwrap());
    store
        .save(&ItemRecord::new(ItemKind::Branch, ItemPath::root("stray"), "stray"))
        .unwrap();
    indexer.project("foo");

    let indexer = indexer.restart();

    let items = indexer.tree.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), &ItemPath::root("foo"));
}
