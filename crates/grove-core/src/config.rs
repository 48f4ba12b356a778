//! Descriptors for the Node Store and Content Binder, and their TOML loader

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{GroveError, Result};

/// Where the node collection lives and how its records link to each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStoreDescriptor {
    pub collection: String,
    pub node_id_field: String,
    pub parent_id_field: String,

    /// Key under which `get_node` embeds the active parent record
    #[serde(default)]
    pub parent_link_field: Option<String>,

    /// Related records resolved eagerly by `get_node` and `get_list_copy`
    #[serde(default)]
    pub include: Vec<Include>,
}

impl NodeStoreDescriptor {
    pub fn new(
        collection: impl Into<String>,
        node_id_field: impl Into<String>,
        parent_id_field: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            node_id_field: node_id_field.into(),
            parent_id_field: parent_id_field.into(),
            parent_link_field: None,
            include: Vec::new(),
        }
    }

    pub fn with_parent_link(mut self, field: impl Into<String>) -> Self {
        self.parent_link_field = Some(field.into());
        self
    }

    pub fn with_include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }
}

/// Eager-include of related records
///
/// Records of `collection` whose `foreign_field` equals the node's
/// `local_field` are attached to the node under `field`, either as a list
/// (`many`) or as a single record (or null).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    pub field: String,
    pub collection: String,
    pub local_field: String,
    pub foreign_field: String,
    #[serde(default)]
    pub many: bool,
    #[serde(default = "default_true")]
    pub active_only: bool,
}

fn default_true() -> bool {
    true
}

/// Content collection, relation collection and the fields joining them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub content_collection: String,
    pub content_id_field: String,

    /// Key under which relations are embedded into content records
    pub content_relations_field: String,

    pub relation_collection: String,

    /// Key under which the content record is embedded into a relation
    pub relation_to_content_link_field: String,
    pub relation_to_content_id_field: String,

    /// Key under which the node record is embedded into a relation
    pub relation_to_node_link_field: String,
    pub relation_to_node_id_field: String,
}

/// Complete setup for one hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroveConfig {
    pub nodes: NodeStoreDescriptor,

    #[serde(default)]
    pub content: Option<ContentDescriptor>,

    /// Place content right after configuring it, when a tree is loaded
    #[serde(default)]
    pub load_content: bool,
}

impl GroveConfig {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the text is not valid TOML or does not
    /// match the expected shape.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GroveError::InvalidDescriptor {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Read and parse a TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GroveError::InvalidDescriptor {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
load_content = true

[nodes]
collection = "groups"
node_id_field = "group_id"
parent_id_field = "parent_group_id"
parent_link_field = "parent_group"

[[nodes.include]]
field = "members"
collection = "memberships"
local_field = "group_id"
foreign_field = "group_id"
many = true

[content]
content_collection = "authorities"
content_id_field = "authority_id"
content_relations_field = "groups_authorities"
relation_collection = "groups_authorities"
relation_to_content_link_field = "authority"
relation_to_content_id_field = "authority_id"
relation_to_node_link_field = "group"
relation_to_node_id_field = "group_id"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = GroveConfig::from_toml_str(SAMPLE).unwrap();
        assert!(config.load_content);
        assert_eq!(config.nodes.collection, "groups");
        assert_eq!(config.nodes.parent_link_field.as_deref(), Some("parent_group"));
        assert_eq!(config.nodes.include.len(), 1);
        assert!(config.nodes.include[0].active_only);
        assert_eq!(
            config.content.unwrap().relation_to_node_id_field,
            "group_id"
        );
    }

    #[test]
    fn test_missing_required_field_is_invalid_descriptor() {
        let err = GroveConfig::from_toml_str("[nodes]\ncollection = \"groups\"\n").unwrap_err();
        assert!(matches!(err, GroveError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grove.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = GroveConfig::from_path(&path).unwrap();
        assert_eq!(config.nodes.node_id_field, "group_id");
    }
}
