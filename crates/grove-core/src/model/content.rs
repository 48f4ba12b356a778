use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::{Record, RecordId};
use crate::errors::{GroveError, Result};

/// Reconciliation policy applied to an item's relation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationFlag {
    /// Active relations become exactly the requested node set
    #[default]
    Override,
    /// Requested nodes are added; existing relations are kept
    Append,
    /// Every active relation of the item is removed
    Remove,
}

impl RelationFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationFlag::Override => "override",
            RelationFlag::Append => "append",
            RelationFlag::Remove => "remove",
        }
    }
}

impl fmt::Display for RelationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationFlag {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "override" => Ok(RelationFlag::Override),
            "append" => Ok(RelationFlag::Append),
            "remove" => Ok(RelationFlag::Remove),
            other => Err(GroveError::UnknownRelationFlag {
                flag: other.to_string(),
            }),
        }
    }
}

/// One entry of an `add_content` request
///
/// `data` holds the content record's fields. When it carries the content id
/// field and the record exists, the record is reused (or updated when
/// `update` is set); otherwise a new record is created from `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default)]
    pub update: bool,

    #[serde(default)]
    pub data: Record,

    #[serde(default)]
    pub relation_flag: RelationFlag,

    /// Target node ids; `None` leaves override/append relations untouched
    #[serde(default)]
    pub nodes: Option<Vec<RecordId>>,
}

impl ContentItem {
    pub fn new(data: Record) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Decode an item from caller JSON
    ///
    /// # Errors
    ///
    /// Returns `UnknownRelationFlag` for a flag outside override, append and
    /// remove, and `InvalidInput` for any other shape problem (including
    /// node ids that are neither numbers nor strings).
    pub fn from_value(value: Value) -> Result<Self> {
        if let Some(Value::String(flag)) = value.get("relation_flag") {
            flag.parse::<RelationFlag>()?;
        }
        serde_json::from_value(value).map_err(|e| GroveError::InvalidInput {
            reason: e.to_string(),
        })
    }

    pub fn with_flag(mut self, flag: RelationFlag) -> Self {
        self.relation_flag = flag;
        self
    }

    pub fn with_nodes<I, T>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RecordId>,
    {
        self.nodes = Some(nodes.into_iter().map(Into::into).collect());
        self
    }

    pub fn updating(mut self) -> Self {
        self.update = true;
        self
    }
}

/// A content item placed on a node: the active relation row plus the content
/// record it points at
///
/// Serialises as the relation record with the content embedded under
/// `link_field`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "Record")]
pub struct Placement {
    pub content_id: RecordId,
    pub relation: Record,
    pub content: Record,
    pub link_field: String,
}

impl Placement {
    pub fn to_record(&self) -> Record {
        let mut record = self.relation.clone();
        record.insert(self.link_field.clone(), Value::Object(self.content.clone()));
        record
    }
}

impl From<Placement> for Record {
    fn from(placement: Placement) -> Self {
        placement.to_record()
    }
}

/// Result of reconciling one `add_content` item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentOutcome {
    pub content_id: RecordId,
    pub content: Record,
    pub created: bool,
    pub updated: bool,
    /// Node ids that gained an active relation
    pub attached: Vec<RecordId>,
    /// Node ids whose active relation was soft-deleted
    pub detached: Vec<RecordId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_defaults_to_override() {
        let item = ContentItem::from_value(json!({"data": {"title": "a"}})).unwrap();
        assert_eq!(item.relation_flag, RelationFlag::Override);
        assert!(item.nodes.is_none());
        assert!(!item.update);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = ContentItem::from_value(json!({"data": {}, "relation_flag": "merge"}))
            .unwrap_err();
        assert_eq!(
            err,
            GroveError::UnknownRelationFlag {
                flag: "merge".to_string()
            }
        );
    }

    #[test]
    fn test_bad_node_ids_rejected() {
        let err = ContentItem::from_value(json!({"data": {}, "nodes": [1, true]})).unwrap_err();
        assert!(matches!(err, GroveError::InvalidInput { .. }));
    }

    #[test]
    fn test_node_ids_normalise() {
        let item = ContentItem::from_value(json!({
            "data": {"id": 3},
            "relation_flag": "append",
            "nodes": ["1", 2]
        }))
        .unwrap();
        assert_eq!(item.relation_flag, RelationFlag::Append);
        assert_eq!(
            item.nodes,
            Some(vec![RecordId::Int(1), RecordId::Int(2)])
        );
    }

    #[test]
    fn test_placement_embeds_content() {
        let placement = Placement {
            content_id: RecordId::Int(9),
            relation: json!({"id": 1, "content_id": 9, "node_id": 2})
                .as_object()
                .cloned()
                .unwrap(),
            content: json!({"id": 9, "title": "doc"}).as_object().cloned().unwrap(),
            link_field: "authority".to_string(),
        };
        let value = serde_json::to_value(&placement).unwrap();
        assert_eq!(value["authority"]["title"], json!("doc"));
        assert_eq!(value["node_id"], json!(2));
        assert!(value.get("relation").is_none());
    }
}
