use grove_core::{
    ContentBinder, ContentDescriptor, MemoryStore, NodeStore, NodeStoreDescriptor, Record,
    RecordId, RecordStore,
};
use serde_json::{json, Value};

/// Create a store holding the nodes, contents and content_relations collections
#[allow(dead_code)]
pub fn new_store() -> MemoryStore {
    MemoryStore::new()
        .with_collection(
            "nodes",
            "id",
            &["parent_id", "name", "created_by", "updated_by"],
        )
        .with_collection("contents", "id", &["title", "body"])
        .with_collection("content_relations", "id", &["content_id", "node_id"])
}

/// Seed nodes directly into the store, bypassing validation
#[allow(dead_code)]
pub fn seed_nodes(store: &mut MemoryStore, nodes: &[(i64, Option<i64>)]) {
    for (id, parent) in nodes {
        let mut record = Record::new();
        record.insert("id".into(), json!(id));
        record.insert(
            "parent_id".into(),
            parent.map(Value::from).unwrap_or(Value::Null),
        );
        record.insert("name".into(), json!(format!("node-{}", id)));
        store.create("nodes", record).expect("seed node");
    }
}

/// Nodes {1:null, 2:1, 3:1, 4:2}
#[allow(dead_code)]
pub fn sample_store() -> MemoryStore {
    let mut store = new_store();
    seed_nodes(&mut store, &[(1, None), (2, Some(1)), (3, Some(1)), (4, Some(2))]);
    store
}

#[allow(dead_code)]
pub fn node_descriptor() -> NodeStoreDescriptor {
    NodeStoreDescriptor::new("nodes", "id", "parent_id")
}

#[allow(dead_code)]
pub fn content_descriptor() -> ContentDescriptor {
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

#[allow(dead_code)]
pub fn node_store(store: &MemoryStore) -> NodeStore {
    NodeStore::configure(store, node_descriptor()).expect("configure node store")
}

#[allow(dead_code)]
pub fn binder(store: &MemoryStore, nodes: &NodeStore) -> ContentBinder {
    ContentBinder::configure(store, nodes, content_descriptor()).expect("configure binder")
}

/// Record from a JSON object literal
#[allow(dead_code)]
pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

#[allow(dead_code)]
pub fn ids(values: &[i64]) -> Vec<RecordId> {
    values.iter().copied().map(RecordId::Int).collect()
}

#[allow(dead_code)]
pub fn id(value: i64) -> RecordId {
    RecordId::Int(value)
}
