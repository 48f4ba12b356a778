mod common;

use common::{id, ids, new_store, node_store, record, sample_store};
use grove_core::errors::{ExErrorKind, GroveError};
use grove_core::{
    Filter, Include, NewNode, NodeStore, NodeStoreDescriptor, RecordId, RecordStore,
};
use serde_json::{json, Value};

#[test]
fn test_get_node_returns_attributes() {
    // GIVEN the sample forest
    let store = sample_store();
    let nodes = node_store(&store);

    // WHEN fetching a node
    let node = nodes.get_node(&store, &id(4)).expect("node 4 exists");

    // THEN structural fields and attributes are split
    assert_eq!(node.parent_id, Some(id(2)));
    assert_eq!(node.attributes.get("name"), Some(&json!("node-4")));
}

#[test]
fn test_get_node_skips_soft_deleted() {
    let mut store = sample_store();
    let nodes = node_store(&store);
    store
        .update_many(
            "nodes",
            &Filter::new().eq("id", 3),
            &record(json!({"deleted": true})),
        )
        .unwrap();

    let err = nodes.get_node(&store, &id(3)).unwrap_err();

    assert_eq!(
        err,
        GroveError::NodeNotFound {
            node_id: "3".to_string()
        }
    );
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_get_node_embeds_parent_and_includes() {
    // GIVEN a node store with a parent link and a members include
    let mut store = sample_store().with_collection("members", "id", &["node_id", "user"]);
    store
        .create("members", record(json!({"node_id": 4, "user": "ada"})))
        .unwrap();
    store
        .create("members", record(json!({"node_id": 4, "user": "bob", "deleted": true})))
        .unwrap();
    let descriptor = NodeStoreDescriptor::new("nodes", "id", "parent_id")
        .with_parent_link("parent")
        .with_include(Include {
            field: "members".into(),
            collection: "members".into(),
            local_field: "id".into(),
            foreign_field: "node_id".into(),
            many: true,
            active_only: true,
        });
    let nodes = NodeStore::configure(&store, descriptor).unwrap();

    // WHEN fetching the node
    let node = nodes.get_node(&store, &id(4)).unwrap();

    // THEN the parent record and active members are embedded
    assert_eq!(node.attributes["parent"]["id"], json!(2));
    let members = node.attributes["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user"], json!("ada"));
}

#[test]
fn test_root_parent_link_is_null() {
    let store = sample_store();
    let nodes = NodeStore::configure(
        &store,
        NodeStoreDescriptor::new("nodes", "id", "parent_id").with_parent_link("parent"),
    )
    .unwrap();

    let node = nodes.get_node(&store, &id(1)).unwrap();

    assert_eq!(node.attributes["parent"], Value::Null);
}

#[test]
fn test_configure_rejects_empty_names() {
    let store = sample_store();
    let err = NodeStore::configure(&store, NodeStoreDescriptor::new("nodes", "", "parent_id"))
        .unwrap_err();
    assert!(matches!(err, GroveError::InvalidDescriptor { .. }));
    assert_eq!(err.kind(), ExErrorKind::InvalidArgument);
}

#[test]
fn test_configure_rejects_unknown_include_collection() {
    let store = sample_store();
    let descriptor = NodeStoreDescriptor::new("nodes", "id", "parent_id").with_include(Include {
        field: "members".into(),
        collection: "members".into(),
        local_field: "id".into(),
        foreign_field: "node_id".into(),
        many: true,
        active_only: true,
    });
    let err = NodeStore::configure(&store, descriptor).unwrap_err();
    assert!(matches!(
        err,
        GroveError::CollectionNotFound { ref collection } if collection == "members"
    ));
}

#[test]
fn test_path_to_node_ends_in_node() {
    let store = sample_store();
    let nodes = node_store(&store);

    assert_eq!(nodes.get_path_to_node(&store, &id(4)).unwrap(), ids(&[1, 2, 4]));
    assert_eq!(nodes.get_path_to_node(&store, &id(1)).unwrap(), ids(&[1]));
}

#[test]
fn test_path_to_missing_node_is_not_found() {
    let store = sample_store();
    let nodes = node_store(&store);

    let err = nodes.get_path_to_node(&store, &id(99)).unwrap_err();

    assert!(matches!(err, GroveError::NodeNotFound { .. }));
}

#[test]
fn test_list_copy_excludes_deleted() {
    let mut store = sample_store();
    let nodes = node_store(&store);
    store
        .update_many(
            "nodes",
            &Filter::new().eq("id", 4),
            &record(json!({"deleted": true})),
        )
        .unwrap();

    let list = nodes.get_list_copy(&store).unwrap();

    let listed: Vec<_> = list.into_iter().map(|n| n.id).collect();
    assert_eq!(listed, ids(&[1, 2, 3]));
}

#[test]
fn test_insert_requires_existing_parent() {
    let mut store = sample_store();
    let nodes = node_store(&store);

    let err = nodes
        .insert_node(&mut store, None, NewNode::child_of(42))
        .unwrap_err();

    assert_eq!(
        err,
        GroveError::ParentNotFound {
            parent_id: "42".to_string()
        }
    );
    assert_eq!(store.rows("nodes").len(), 4);
}

#[test]
fn test_insert_with_explicit_id_and_attributes() {
    let mut store = sample_store();
    let nodes = node_store(&store);

    let node = nodes
        .insert_node(
            &mut store,
            None,
            NewNode::child_of(3)
                .with_id(10)
                .with_attribute("name", json!("ops")),
        )
        .unwrap();

    assert_eq!(node.id, id(10));
    assert_eq!(
        nodes.get_path_to_node(&store, &id(10)).unwrap(),
        ids(&[1, 3, 10])
    );
    assert_eq!(node.attributes["name"], json!("ops"));
}

#[test]
fn test_reparent_moves_node() {
    // GIVEN the sample forest
    let mut store = sample_store();
    let nodes = node_store(&store);

    // WHEN moving 4 under 3
    let moved = nodes
        .update_node_parent(&mut store, None, &id(4), Some(&id(3)))
        .unwrap();

    // THEN the new parent is the immediate predecessor
    assert_eq!(moved.parent_id, Some(id(3)));
    assert_eq!(nodes.get_path_to_node(&store, &id(4)).unwrap(), ids(&[1, 3, 4]));
}

#[test]
fn test_reparent_to_root() {
    let mut store = sample_store();
    let nodes = node_store(&store);

    nodes
        .update_node_parent(&mut store, None, &id(2), None)
        .unwrap();

    assert_eq!(nodes.get_root(&store, &id(4)).unwrap(), id(2));
}

#[test]
fn test_reparent_under_descendant_is_conflict() {
    // GIVEN the sample forest
    let mut store = sample_store();
    let nodes = node_store(&store);
    let before = store.rows("nodes").to_vec();

    // WHEN moving 1 under its grandchild 4
    let err = nodes
        .update_node_parent(&mut store, None, &id(1), Some(&id(4)))
        .unwrap_err();

    // THEN it fails as a conflict and nothing changes
    assert!(matches!(err, GroveError::CycleDetected { ref path, .. } if path == &["1", "2", "4"]));
    assert_eq!(err.kind(), ExErrorKind::Conflict);
    assert_eq!(store.rows("nodes"), before.as_slice());
}

#[test]
fn test_reparent_under_self_is_conflict() {
    let mut store = sample_store();
    let nodes = node_store(&store);

    let err = nodes
        .update_node_parent(&mut store, None, &id(3), Some(&id(3)))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Conflict);
}

#[test]
fn test_reparent_missing_nodes() {
    let mut store = sample_store();
    let nodes = node_store(&store);

    let err = nodes
        .update_node_parent(&mut store, None, &id(77), Some(&id(1)))
        .unwrap_err();
    assert!(matches!(err, GroveError::NodeNotFound { .. }));

    let err = nodes
        .update_node_parent(&mut store, None, &id(4), Some(&id(77)))
        .unwrap_err();
    assert!(matches!(err, GroveError::ParentNotFound { .. }));
}

#[test]
fn test_direct_children_only() {
    let store = sample_store();
    let nodes = node_store(&store);

    let children: Vec<_> = nodes
        .get_children_list(&store, &id(1), true)
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();

    assert_eq!(children, ids(&[2, 3]));
}

#[test]
fn test_descendants_of_leaf_are_empty() {
    let store = sample_store();
    let nodes = node_store(&store);

    assert!(nodes
        .get_children_list(&store, &id(4), false)
        .unwrap()
        .is_empty());
}

#[test]
fn test_text_ids_are_supported() {
    let mut store = new_store();
    store
        .create("nodes", record(json!({"id": "hq", "parent_id": null})))
        .unwrap();
    store
        .create("nodes", record(json!({"id": "ops", "parent_id": "hq"})))
        .unwrap();
    let nodes = node_store(&store);

    let path = nodes
        .get_path_to_node(&store, &RecordId::from("ops"))
        .unwrap();

    assert_eq!(path, vec![RecordId::from("hq"), RecordId::from("ops")]);
}
