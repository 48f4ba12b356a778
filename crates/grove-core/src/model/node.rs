use serde::Serialize;
use serde_json::Value;

use super::{
    flag_is_set, Placement, Record, RecordId, CREATED_BY_FIELD, DELETED_FIELD, UPDATED_BY_FIELD,
};
use crate::errors::{GroveError, Result};

/// Typed view of a node record
///
/// The id and parent id live under caller-configured field names in the
/// store; everything that is not structural or audit data is kept verbatim
/// in `attributes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique identifier
    pub id: RecordId,

    /// Parent node id (None for roots)
    pub parent_id: Option<RecordId>,

    /// Soft-delete flag
    pub deleted: bool,

    /// Identity that created the node, when the collection records it
    pub created_by: Option<RecordId>,

    /// Identity that last updated the node, when the collection records it
    pub updated_by: Option<RecordId>,

    /// Remaining fields, including eagerly included relations
    pub attributes: Record,
}

impl Node {
    /// Create a live node with no audit data and no attributes
    pub fn new(id: RecordId, parent_id: Option<RecordId>) -> Self {
        Self {
            id,
            parent_id,
            deleted: false,
            created_by: None,
            updated_by: None,
            attributes: Record::new(),
        }
    }

    /// Check if this node is a root (has no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Map a stored record onto a node
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the id is missing or not an id, or the
    /// parent field holds something other than null or an id.
    pub fn from_record(
        mut record: Record,
        collection: &str,
        id_field: &str,
        parent_field: &str,
    ) -> Result<Self> {
        let malformed = |reason: String| GroveError::MalformedRecord {
            collection: collection.to_string(),
            reason,
        };

        let id = record
            .remove(id_field)
            .ok_or_else(|| malformed(format!("missing id field {}", id_field)))
            .and_then(|v| RecordId::from_value(&v).map_err(|e| malformed(e.to_string())))?;

        let parent_id = match record.remove(parent_field) {
            None | Some(Value::Null) => None,
            Some(v) => Some(RecordId::from_value(&v).map_err(|e| {
                malformed(format!("node {} has bad parent: {}", id, e))
            })?),
        };

        let deleted = flag_is_set(record.remove(DELETED_FIELD).as_ref());
        let created_by = optional_id(record.remove(CREATED_BY_FIELD));
        let updated_by = optional_id(record.remove(UPDATED_BY_FIELD));

        Ok(Self {
            id,
            parent_id,
            deleted,
            created_by,
            updated_by,
            attributes: record,
        })
    }
}

fn optional_id(value: Option<Value>) -> Option<RecordId> {
    value.and_then(|v| RecordId::from_value(&v).ok())
}

/// Payload for inserting a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNode {
    /// Explicit id; the store assigns one when absent
    pub id: Option<RecordId>,
    pub parent_id: Option<RecordId>,
    pub created_by: Option<RecordId>,
    pub updated_by: Option<RecordId>,
    pub attributes: Record,
}

impl NewNode {
    /// Payload for a new root node
    pub fn root() -> Self {
        Self::default()
    }

    /// Payload for a new node under `parent_id`
    pub fn child_of(parent_id: impl Into<RecordId>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, field: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(field.into(), value);
        self
    }

    pub fn created_by(mut self, identity: impl Into<RecordId>) -> Self {
        self.created_by = Some(identity.into());
        self
    }

    pub fn updated_by(mut self, identity: impl Into<RecordId>) -> Self {
        self.updated_by = Some(identity.into());
        self
    }
}

/// Nested, serialisable rendering of a cached node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedNode {
    pub id: RecordId,
    pub parent_id: Option<RecordId>,
    #[serde(flatten)]
    pub attributes: Record,
    pub children: Vec<NestedNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Placement>>,
}

impl NestedNode {
    /// Ids of this node's direct children, in order
    pub fn child_ids(&self) -> Vec<RecordId> {
        self.children.iter().map(|c| c.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_record_splits_structural_fields() {
        let node = Node::from_record(
            record(json!({
                "group_id": 4,
                "parent_group_id": "2",
                "deleted": 0,
                "created_by": 1,
                "name": "ops"
            })),
            "groups",
            "group_id",
            "parent_group_id",
        )
        .unwrap();

        assert_eq!(node.id, RecordId::Int(4));
        assert_eq!(node.parent_id, Some(RecordId::Int(2)));
        assert!(!node.deleted);
        assert_eq!(node.created_by, Some(RecordId::Int(1)));
        assert_eq!(node.attributes.get("name"), Some(&json!("ops")));
        assert!(!node.attributes.contains_key("group_id"));
    }

    #[test]
    fn test_from_record_requires_id() {
        let err = Node::from_record(record(json!({"name": "x"})), "groups", "id", "parent_id")
            .unwrap_err();
        assert!(matches!(err, GroveError::MalformedRecord { .. }));
    }
}
