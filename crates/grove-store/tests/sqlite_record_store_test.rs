// Integration tests for the SQLite record store, driven through the
// node store and content binder

use grove_core::errors::{ExErrorKind, GroveError};
use grove_core::{
    ContentBinder, ContentDescriptor, ContentItem, Filter, NewNode, NodeStore,
    NodeStoreDescriptor, Record, RecordId, RecordStore, TreeCache,
};
use grove_store::SqliteRecordStore;
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

fn content_descriptor() -> ContentDescriptor {
    ContentDescriptor {
        content_collection: "contents".into(),
        content_id_field: "id".into(),
        content_relations_field: "content_relations".into(),
        relation_collection: "content_relations".into(),
        relation_to_content_link_field: "content".into(),
        relation_to_content_id_field: "content_id".into(),
        relation_to_node_link_field: "node".into(),
        relation_to_node_id_field: "node_id".into(),
    }
}

/// Nodes 1 <- 2 <- 4 and 1 <- 3, inserted through the node store
fn seeded() -> (SqliteRecordStore, NodeStore) {
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let nodes =
        NodeStore::configure(&store, NodeStoreDescriptor::new("nodes", "id", "parent_id")).unwrap();
    let root = nodes
        .insert_node(&mut store, None, NewNode::root().with_attribute("name", json!("hq")))
        .unwrap();
    let sales = nodes
        .insert_node(&mut store, None, NewNode::child_of(root.id.clone()))
        .unwrap();
    nodes
        .insert_node(&mut store, None, NewNode::child_of(root.id.clone()))
        .unwrap();
    nodes
        .insert_node(&mut store, None, NewNode::child_of(sales.id))
        .unwrap();
    (store, nodes)
}

#[test]
fn test_create_assigns_ids_and_defaults() {
    let mut store = SqliteRecordStore::open_in_memory().unwrap();

    let created = store
        .create("contents", record(json!({"id": null, "title": "doc"})))
        .unwrap();

    assert_eq!(created["id"], json!(1));
    assert_eq!(created["deleted"], json!(false));
    assert_eq!(created["body"], Value::Null);
}

#[test]
fn test_unknown_collection_and_field_are_store_errors() {
    let mut store = SqliteRecordStore::open_in_memory().unwrap();

    let err = store.find_many("missing", &Filter::active()).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Internal);

    let err = store
        .create("contents", record(json!({"colour": "red"})))
        .unwrap_err();
    assert!(matches!(err, GroveError::Store { .. }));
}

#[test]
fn test_filters_translate_to_sql() {
    let (mut store, _) = seeded();
    store
        .update_many(
            "nodes",
            &Filter::new().eq("id", 3),
            &record(json!({"deleted": true})),
        )
        .unwrap();

    let roots = store
        .find_many("nodes", &Filter::active().eq("parent_id", Value::Null))
        .unwrap();
    assert_eq!(roots.len(), 1);

    let some = store
        .find_many("nodes", &Filter::active().is_in("id", [2, 3, 4]))
        .unwrap();
    let found: Vec<Value> = some.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(found, vec![json!(2), json!(4)]);

    // Text ids compare numerically against integer columns
    let by_text = store
        .find_one("nodes", &Filter::new().eq("id", "4"))
        .unwrap()
        .unwrap();
    assert_eq!(by_text["parent_id"], json!(2));
}

#[test]
fn test_delete_many_counts_rows() {
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    for title in ["a", "b", "c"] {
        store
            .create("contents", record(json!({"title": title})))
            .unwrap();
    }

    let removed = store
        .delete_many("contents", &Filter::new().is_in("title", ["a", "b"]))
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(store.find_many("contents", &Filter::new()).unwrap().len(), 1);
}

#[test]
fn test_node_store_over_sqlite() {
    // GIVEN nodes persisted in SQLite
    let (mut store, nodes) = seeded();

    // WHEN walking and reparenting
    let path = nodes.get_path_to_node(&store, &RecordId::Int(4)).unwrap();
    let moved = nodes
        .update_node_parent(&mut store, None, &RecordId::Int(4), Some(&RecordId::Int(3)))
        .unwrap();

    // THEN paths run root first and the move is persisted
    assert_eq!(path, vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(4)]);
    assert_eq!(moved.parent_id, Some(RecordId::Int(3)));
    let stored = nodes.get_node(&store, &RecordId::Int(4)).unwrap();
    assert_eq!(stored.parent_id, Some(RecordId::Int(3)));
    assert_eq!(stored.created_by, Some(RecordId::Int(1)));
}

#[test]
fn test_cycle_rejected_over_sqlite() {
    let (mut store, nodes) = seeded();

    let err = nodes
        .update_node_parent(&mut store, None, &RecordId::Int(2), Some(&RecordId::Int(4)))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Conflict);
    let unchanged = nodes.get_node(&store, &RecordId::Int(2)).unwrap();
    assert_eq!(unchanged.parent_id, Some(RecordId::Int(1)));
}

#[test]
fn test_content_binding_over_sqlite() {
    // GIVEN a loaded tree
    let (mut store, nodes) = seeded();
    let binder = ContentBinder::configure(&store, &nodes, content_descriptor()).unwrap();
    let mut cache = TreeCache::load(&nodes, &store).unwrap();

    // WHEN content is attached to two nodes
    let outcome = binder
        .add_content(
            &mut store,
            &nodes,
            Some(&mut cache),
            vec![ContentItem::new(record(json!({"title": "handbook"}))).with_nodes([2, 3])],
        )
        .unwrap()
        .remove(0);

    // THEN the relations are persisted and the cache shows the content
    assert!(outcome.created);
    let mut related = binder
        .related_node_ids(&store, &[outcome.content_id.clone()])
        .unwrap();
    related.sort();
    assert_eq!(related, vec![RecordId::Int(2), RecordId::Int(3)]);
    let placed = cache
        .node(&RecordId::Int(2))
        .and_then(|n| n.content.as_ref())
        .map(|c| c.len())
        .unwrap_or_default();
    assert_eq!(placed, 1);

    // AND removing every relation orphans the content
    binder
        .delete_content_relations(
            &mut store,
            &nodes,
            Some(&mut cache),
            Some(&outcome.content_id),
            None,
        )
        .unwrap();
    let (orphans, all) = binder.get_content_with_no_relations(&store).unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(all.len(), 1);
}

#[test]
fn test_text_keyed_nodes_keep_leading_zeros() {
    // GIVEN a collection keyed by text codes that look numeric
    let store = SqliteRecordStore::open_in_memory().unwrap();
    store
        .connection()
        .execute_batch(
            "CREATE TABLE groups (
                code TEXT PRIMARY KEY,
                parent TEXT REFERENCES groups(code),
                deleted BOOLEAN NOT NULL DEFAULT 0
            );
            INSERT INTO groups (code, parent) VALUES ('007', NULL);
            INSERT INTO groups (code, parent) VALUES ('008', '007');",
        )
        .unwrap();
    let nodes =
        NodeStore::configure(&store, NodeStoreDescriptor::new("groups", "code", "parent")).unwrap();

    // WHEN the listed ids are used for further lookups
    let listed: Vec<RecordId> = nodes
        .get_list_copy(&store)
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();

    // THEN the ids round-trip as text and address the stored rows
    let root = RecordId::Text("007".to_string());
    let child = RecordId::Text("008".to_string());
    assert_eq!(listed, vec![root.clone(), child.clone()]);
    assert_eq!(nodes.get_node(&store, &listed[0]).unwrap().id, root);
    assert_eq!(
        nodes.get_path_to_node(&store, &listed[1]).unwrap(),
        vec![root, child]
    );
}
