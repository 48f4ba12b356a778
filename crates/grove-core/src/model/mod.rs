pub mod content;
pub mod node;
pub mod record_id;

pub use content::{ContentItem, ContentOutcome, Placement, RelationFlag};
pub use node::{NestedNode, NewNode, Node};
pub use record_id::RecordId;

/// A stored record: a JSON object keyed by field name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Soft-delete flag carried by every managed collection
pub const DELETED_FIELD: &str = "deleted";

/// Audit field holding the creating identity
pub const CREATED_BY_FIELD: &str = "created_by";

/// Audit field holding the last updating identity
pub const UPDATED_BY_FIELD: &str = "updated_by";

/// Identity recorded when a caller supplies none
pub const SYSTEM_IDENTITY: i64 = 1;

/// Read a soft-delete flag, accepting booleans and integer encodings
pub(crate) fn flag_is_set(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}
