mod common;

use common::{id, ids, node_store, sample_store, seed_nodes};
use grove_core::errors::GroveError;
use grove_core::{NewNode, ParentRef, TreeCache};
use serde_json::json;

/// Strip a nested rendering down to ids and children
fn shape(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(shape).collect())
        }
        serde_json::Value::Object(map) => json!({
            "id": map["id"],
            "children": shape(&map["children"]),
        }),
        other => other.clone(),
    }
}

#[test]
fn test_load_tree_nests_sample_forest() {
    // GIVEN nodes {1:null, 2:1, 3:1, 4:2}
    let store = sample_store();
    let nodes = node_store(&store);

    // WHEN loading the tree
    let cache = TreeCache::load(&nodes, &store).unwrap();

    // THEN the nested forest matches
    let rendered = serde_json::to_value(cache.nested()).unwrap();
    assert_eq!(
        shape(&rendered),
        json!([{"id": 1, "children": [
            {"id": 2, "children": [{"id": 4, "children": []}]},
            {"id": 3, "children": []}
        ]}])
    );
}

#[test]
fn test_nested_rendering_flattens_attributes() {
    let store = sample_store();
    let nodes = node_store(&store);
    let cache = TreeCache::load(&nodes, &store).unwrap();

    let rendered = serde_json::to_value(cache.nested()).unwrap();

    assert_eq!(rendered[0]["name"], json!("node-1"));
    assert_eq!(rendered[0]["parent_id"], json!(null));
    assert!(rendered[0].get("content").is_none());
}

#[test]
fn test_load_tree_is_idempotent() {
    let store = sample_store();
    let nodes = node_store(&store);

    let first = TreeCache::load(&nodes, &store).unwrap();
    let second = TreeCache::load(&nodes, &store).unwrap();

    assert_eq!(first.nested(), second.nested());
}

#[test]
fn test_multiple_roots_keep_store_order() {
    let mut store = sample_store();
    seed_nodes(&mut store, &[(5, None), (6, Some(5))]);
    let nodes = node_store(&store);

    let cache = TreeCache::load(&nodes, &store).unwrap();

    assert_eq!(cache.roots(), ids(&[1, 5]).as_slice());
    assert_eq!(cache.children_of(&id(5)), Some(ids(&[6]).as_slice()));
}

#[test]
fn test_insert_mirrors_into_cache() {
    let mut store = sample_store();
    let nodes = node_store(&store);
    let mut cache = TreeCache::load(&nodes, &store).unwrap();

    let child = nodes
        .insert_node(&mut store, Some(&mut cache), NewNode::child_of(3))
        .unwrap();
    let root = nodes
        .insert_node(&mut store, Some(&mut cache), NewNode::root())
        .unwrap();

    assert_eq!(cache.children_of(&id(3)), Some(vec![child.id.clone()].as_slice()));
    assert_eq!(cache.roots(), vec![id(1), root.id.clone()].as_slice());
}

#[test]
fn test_reparent_mirrors_into_cache() {
    // GIVEN a loaded sample forest
    let mut store = sample_store();
    let nodes = node_store(&store);
    let mut cache = TreeCache::load(&nodes, &store).unwrap();

    // WHEN moving 4 under 3
    nodes
        .update_node_parent(&mut store, Some(&mut cache), &id(4), Some(&id(3)))
        .unwrap();

    // THEN 2 has no children and 3 holds 4
    assert_eq!(cache.children_of(&id(2)), Some(&[][..]));
    assert_eq!(cache.children_of(&id(3)), Some(ids(&[4]).as_slice()));
    assert_eq!(cache.node(&id(4)).unwrap().node.parent_id, Some(id(3)));

    // AND the cache matches a fresh load
    let fresh = TreeCache::load(&nodes, &store).unwrap();
    assert_eq!(cache.nested(), fresh.nested());
}

#[test]
fn test_failed_reparent_leaves_cache_untouched() {
    let mut store = sample_store();
    let nodes = node_store(&store);
    let mut cache = TreeCache::load(&nodes, &store).unwrap();
    let before = cache.clone();

    let err = nodes
        .update_node_parent(&mut store, Some(&mut cache), &id(2), Some(&id(4)))
        .unwrap_err();

    assert!(matches!(err, GroveError::CycleDetected { .. }));
    assert_eq!(cache, before);
}

#[test]
fn test_load_tree_to_root_is_minimal() {
    // GIVEN a wider forest
    let mut store = sample_store();
    seed_nodes(&mut store, &[(5, Some(3)), (6, Some(4)), (7, None), (8, Some(7))]);
    let nodes = node_store(&store);

    // WHEN loading the partial tree for node 2
    let cache = TreeCache::load_tree_to_root(&nodes, &store, &ids(&[2])).unwrap();

    // THEN it holds the path 1 -> 2 and the subtree of 2 only
    let mut held: Vec<_> = cache.subtree_ids(cache.roots());
    held.sort();
    assert_eq!(held, ids(&[1, 2, 4, 6]));
    assert_eq!(cache.children_of(&id(1)), Some(ids(&[2]).as_slice()));
}

#[test]
fn test_load_tree_to_root_merges_overlaps() {
    let mut store = sample_store();
    seed_nodes(&mut store, &[(5, Some(3)), (7, None)]);
    let nodes = node_store(&store);

    let cache = TreeCache::load_tree_to_root(&nodes, &store, &ids(&[2, 4, 5])).unwrap();

    assert_eq!(cache.roots(), ids(&[1]).as_slice());
    assert_eq!(cache.len(), 5);
    assert!(!cache.contains(&id(7)));
}

#[test]
fn test_load_tree_to_root_missing_node() {
    let store = sample_store();
    let nodes = node_store(&store);

    let err = TreeCache::load_tree_to_root(&nodes, &store, &ids(&[40])).unwrap_err();

    assert!(matches!(err, GroveError::NodeNotFound { .. }));
}

#[test]
fn test_get_node_by_id_and_parent() {
    let store = sample_store();
    let nodes = node_store(&store);
    let cache = TreeCache::load(&nodes, &store).unwrap();

    let node = cache.get_node_by_id(&nodes, &store, &id(4)).unwrap();
    assert_eq!(node.id(), &id(4));

    match cache.get_parent_node(&nodes, &store, &id(4)).unwrap() {
        ParentRef::Node(parent) => assert_eq!(parent.id(), &id(2)),
        ParentRef::Roots(_) => panic!("node 4 is not a root"),
    }
    match cache.get_parent_node(&nodes, &store, &id(1)).unwrap() {
        ParentRef::Roots(roots) => assert_eq!(roots, ids(&[1]).as_slice()),
        ParentRef::Node(_) => panic!("node 1 is a root"),
    }
}

#[test]
fn test_unmaterialised_node_is_path_not_found() {
    let mut store = sample_store();
    let nodes = node_store(&store);
    let cache = TreeCache::load_tree_to_root(&nodes, &store, &ids(&[3])).unwrap();
    seed_nodes(&mut store, &[(9, Some(4))]);

    let err = cache.get_node_by_id(&nodes, &store, &id(9)).unwrap_err();

    assert_eq!(
        err,
        GroveError::PathNotFound {
            segment: "2".to_string(),
            remaining: vec!["4".to_string(), "9".to_string()],
        }
    );
}

#[test]
fn test_load_node_tree_from_store() {
    let store = sample_store();
    let nodes = node_store(&store);

    let cache = TreeCache::load_node_tree(&nodes, &store, &id(2), None).unwrap();

    assert_eq!(cache.roots(), ids(&[2]).as_slice());
    assert_eq!(cache.children_of(&id(2)), Some(ids(&[4]).as_slice()));
    assert!(!cache.contains(&id(1)));
}
