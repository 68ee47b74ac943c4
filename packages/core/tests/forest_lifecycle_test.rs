//! Integration tests for the public crate surface
//!
//! Tests cover:
//! - Building a forest through the engine from the outside
//! - Moving whole subtrees between trees
//! - Envelope views staying consistent with storage
//! - Custom column configuration end to end

use nestedset_core::{
    DatabaseService, Envelope, HierarchyEngine, NodeRecord, NodeStore, ScopeFilter, TreeSchema,
    TursoStore,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn engine_with(schema: TreeSchema) -> (HierarchyEngine, Arc<dyn NodeStore>, TempDir) {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(
        DatabaseService::new(temp.path().join("forest.db"), schema.clone())
            .await
            .unwrap(),
    );
    let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db).await.unwrap());
    (HierarchyEngine::new(store.clone(), schema), store, temp)
}

#[tokio::test]
async fn test_grow_move_and_shrink_a_forest() {
    let (engine, store, _temp) = engine_with(TreeSchema::default()).await;

    // Grow: a root with two branches, one of them two levels deep.
    let root = engine.create_node(None, None).await.unwrap();
    let left = engine.create_node(Some(&root), None).await.unwrap();
    let right = engine.create_node(Some(&root), None).await.unwrap();
    let deep = engine.create_node(Some(&left), None).await.unwrap();

    let subtree = engine.subtree_of(&root).await.unwrap();
    assert_eq!(subtree.len(), 4);
    let sizes: Vec<i64> = subtree.iter().map(|r| r.size()).collect();
    assert_eq!(sizes, vec![4, 2, 1, 1]);

    // Move: detach the left branch and hang it under the right one.
    let moved = engine.detach(&left).await.unwrap();
    assert_eq!(moved.size(), 2);
    let right_now = store.get(right.id.unwrap()).await.unwrap().unwrap();
    let moved = engine.attach(&right_now, &moved).await.unwrap();
    assert_eq!(moved.depth, 2);

    // The deep node followed its branch.
    let deep_now = store.get(deep.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(deep_now.depth, 3);
    assert_eq!(deep_now.root_id, root.id.unwrap());

    let envelope = engine.envelope_of(&root).await.unwrap();
    envelope.check_marks().unwrap();
    assert_eq!(envelope.node_count(), 4);

    // Shrink: prune the relocated branch.
    let removed = engine.prune(&moved).await.unwrap();
    assert_eq!(removed, 2);
    let envelope = engine.envelope_of(&root).await.unwrap();
    envelope.check_marks().unwrap();
    assert_eq!(envelope.node_count(), 2);
}

#[tokio::test]
async fn test_custom_column_names() {
    let schema = TreeSchema {
        table: "categories".to_string(),
        id_col: "category_id".to_string(),
        root_col: "tree_id".to_string(),
        parent_col: "parent".to_string(),
        left_col: "lo".to_string(),
        right_col: "hi".to_string(),
        depth_col: "level".to_string(),
        scope: ScopeFilter::All,
    };
    let (engine, _store, _temp) = engine_with(schema).await;

    let root = engine.create_node(None, None).await.unwrap();
    let child = engine.create_node(Some(&root), None).await.unwrap();

    assert_eq!((child.lft, child.rgt), (2, 3));
    let children = engine.children_of(&root).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, child.id);
}

#[tokio::test]
async fn test_envelope_rearrangement_is_a_view() {
    let (engine, store, _temp) = engine_with(TreeSchema::default()).await;

    let root = engine.create_node(None, None).await.unwrap();
    let a = engine.create_node(Some(&root), None).await.unwrap();
    let b = engine.create_node(Some(&root), None).await.unwrap();

    let mut envelope = engine.envelope_of(&root).await.unwrap();
    envelope.reverse();
    let flat: Vec<Option<i64>> = envelope.to_flat_list().iter().map(|r| r.id).collect();
    assert_eq!(flat, vec![root.id, b.id, a.id]);

    // Rearranging the view never touches storage.
    let a_now = store.get(a.id.unwrap()).await.unwrap().unwrap();
    assert_eq!((a_now.lft, a_now.rgt), (a.lft, a.rgt));

    // Reload refreshes field values but keeps the rearranged shape.
    envelope.reload(store.as_ref()).await.unwrap();
    let flat: Vec<Option<i64>> = envelope.to_flat_list().iter().map(|r| r.id).collect();
    assert_eq!(flat, vec![root.id, b.id, a.id]);
}

#[tokio::test]
async fn test_envelope_rejects_rows_from_two_trees() {
    let (engine, _store, _temp) = engine_with(TreeSchema::default()).await;

    let one = engine.create_node(None, None).await.unwrap();
    let two = engine.create_node(None, None).await.unwrap();

    let mut rows: Vec<NodeRecord> = Vec::new();
    rows.extend(engine.subtree_of(&one).await.unwrap());
    rows.extend(engine.subtree_of(&two).await.unwrap());

    assert!(Envelope::build(rows).is_err());
}
