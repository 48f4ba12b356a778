use serde_json::Value;
use std::collections::HashSet;

use super::record_store::{CollectionSchema, Filter, RecordStore};
use super::tree_cache::TreeCache;
use crate::config::{Include, NodeStoreDescriptor};
use crate::errors::{GroveError, Result};
use crate::model::record_id::id_strings;
use crate::model::{
    NewNode, Node, Record, RecordId, CREATED_BY_FIELD, DELETED_FIELD, SYSTEM_IDENTITY,
    UPDATED_BY_FIELD,
};

/// Typed access to the flat node collection
///
/// A `NodeStore` only exists once its descriptor has been validated against
/// the record store schema. It holds no records itself: every operation
/// takes the record store (and, for structural edits, the tree cache to
/// mirror into) explicitly.
#[derive(Debug, Clone)]
pub struct NodeStore {
    descriptor: NodeStoreDescriptor,
    schema: CollectionSchema,
}

impl NodeStore {
    /// Validate a descriptor against the store and build a node store
    ///
    /// # Errors
    /// * `InvalidDescriptor` - If a collection or field name is empty
    /// * `CollectionNotFound` - If the node collection or an include collection does not exist
    /// * `FieldNotFound` - If a configured field is missing from its collection
    pub fn configure<S: RecordStore + ?Sized>(
        store: &S,
        descriptor: NodeStoreDescriptor,
    ) -> Result<Self> {
        for (name, value) in [
            ("collection", &descriptor.collection),
            ("node_id_field", &descriptor.node_id_field),
            ("parent_id_field", &descriptor.parent_id_field),
        ] {
            if value.trim().is_empty() {
                return Err(GroveError::InvalidDescriptor {
                    reason: format!("{} must be a non-empty string", name),
                });
            }
        }
        if descriptor
            .parent_link_field
            .as_deref()
            .is_some_and(|f| f.trim().is_empty())
        {
            return Err(GroveError::InvalidDescriptor {
                reason: "parent_link_field must be a non-empty string when set".to_string(),
            });
        }

        let schema = require_schema(store, &descriptor.collection)?;
        for field in [
            descriptor.node_id_field.as_str(),
            descriptor.parent_id_field.as_str(),
            DELETED_FIELD,
        ] {
            require_field(&schema, field)?;
        }

        for include in &descriptor.include {
            validate_include(store, &schema, include)?;
        }

        tracing::debug!(
            collection = %descriptor.collection,
            includes = descriptor.include.len(),
            "node store configured"
        );

        Ok(Self { descriptor, schema })
    }

    pub fn descriptor(&self) -> &NodeStoreDescriptor {
        &self.descriptor
    }

    pub fn collection(&self) -> &str {
        &self.descriptor.collection
    }

    pub fn id_field(&self) -> &str {
        &self.descriptor.node_id_field
    }

    pub fn parent_field(&self) -> &str {
        &self.descriptor.parent_id_field
    }

    /// Filter selecting the active node with this id
    pub(crate) fn id_filter(&self, id: &RecordId) -> Filter {
        Filter::active().eq(self.id_field(), id.to_value())
    }

    pub(crate) fn to_node(&self, record: Record) -> Result<Node> {
        Node::from_record(
            record,
            self.collection(),
            self.id_field(),
            self.parent_field(),
        )
    }

    /// Fetch an active node without resolving includes
    pub(crate) fn find<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        id: &RecordId,
    ) -> Result<Option<Node>> {
        store
            .find_one(self.collection(), &self.id_filter(id))?
            .map(|r| self.to_node(r))
            .transpose()
    }

    fn require<S: RecordStore + ?Sized>(&self, store: &S, id: &RecordId) -> Result<Node> {
        self.find(store, id)?
            .ok_or_else(|| GroveError::NodeNotFound {
                node_id: id.to_string(),
            })
    }

    /// Get an active node by id, with parent link and includes resolved
    ///
    /// # Errors
    /// * `NodeNotFound` - If no active node has this id
    pub fn get_node<S: RecordStore + ?Sized>(&self, store: &S, id: &RecordId) -> Result<Node> {
        let mut node = self.require(store, id)?;
        self.resolve_links(store, &mut node)?;
        Ok(node)
    }

    fn resolve_links<S: RecordStore + ?Sized>(&self, store: &S, node: &mut Node) -> Result<()> {
        if let Some(link) = &self.descriptor.parent_link_field {
            let parent = match &node.parent_id {
                Some(pid) => store
                    .find_one(self.collection(), &self.id_filter(pid))?
                    .map(Value::Object)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            };
            node.attributes.insert(link.clone(), parent);
        }

        for include in &self.descriptor.include {
            let local = if include.local_field == self.id_field() {
                node.id.to_value()
            } else if include.local_field == self.parent_field() {
                node.parent_id
                    .as_ref()
                    .map(RecordId::to_value)
                    .unwrap_or(Value::Null)
            } else {
                node.attributes
                    .get(&include.local_field)
                    .cloned()
                    .unwrap_or(Value::Null)
            };

            let mut filter = if include.active_only {
                Filter::active()
            } else {
                Filter::new()
            };
            filter = filter.eq(include.foreign_field.as_str(), local);

            let resolved = if include.many {
                Value::Array(
                    store
                        .find_many(&include.collection, &filter)?
                        .into_iter()
                        .map(Value::Object)
                        .collect(),
                )
            } else {
                store
                    .find_one(&include.collection, &filter)?
                    .map(Value::Object)
                    .unwrap_or(Value::Null)
            };
            node.attributes.insert(include.field.clone(), resolved);
        }
        Ok(())
    }

    /// Follow parent pointers from `id` up to its root
    ///
    /// Returns the ids in root-to-node order, so the last element is `id`
    /// and every element's parent is its predecessor. Costs one lookup per
    /// level.
    ///
    /// # Errors
    /// * `NodeNotFound` - If `id` or an ancestor is missing or deleted
    /// * `ParentChainCycle` - If the stored chain revisits a node
    pub fn get_path_to_node<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        id: &RecordId,
    ) -> Result<Vec<RecordId>> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id.clone());

        while let Some(cid) = current {
            if !visited.insert(cid.clone()) {
                return Err(GroveError::ParentChainCycle {
                    node_id: id.to_string(),
                    revisited: cid.to_string(),
                });
            }
            let node = self.require(store, &cid)?;
            path.push(cid);
            current = node.parent_id;
        }

        path.reverse();
        Ok(path)
    }

    /// Root of the tree containing `id`; a root node is its own root
    ///
    /// # Errors
    /// Same as [`NodeStore::get_path_to_node`].
    pub fn get_root<S: RecordStore + ?Sized>(&self, store: &S, id: &RecordId) -> Result<RecordId> {
        self.get_path_to_node(store, id)?
            .into_iter()
            .next()
            .ok_or_else(|| GroveError::Internal {
                message: format!("empty path to node {}", id),
            })
    }

    /// Snapshot of every active node, in store order
    ///
    /// # Errors
    /// Returns `Store` or `MalformedRecord` on backend failures.
    pub fn get_list_copy<S: RecordStore + ?Sized>(&self, store: &S) -> Result<Vec<Node>> {
        let records = store.find_many(self.collection(), &Filter::active())?;
        let mut nodes = Vec::with_capacity(records.len());
        for record in records {
            let mut node = self.to_node(record)?;
            if !self.descriptor.include.is_empty() {
                self.resolve_links(store, &mut node)?;
            }
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Persist a new node and mirror it into the cache
    ///
    /// # Arguments
    /// * `store` - Record store to write to
    /// * `cache` - Loaded tree cache, if any
    /// * `new_node` - Insert payload
    ///
    /// # Errors
    /// * `ParentNotFound` - If the parent id does not reference an active node
    /// * `Store` - If the record store rejects the write
    pub fn insert_node<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        cache: Option<&mut TreeCache>,
        new_node: NewNode,
    ) -> Result<Node> {
        if let Some(pid) = &new_node.parent_id {
            if self.find(&*store, pid)?.is_none() {
                return Err(GroveError::ParentNotFound {
                    parent_id: pid.to_string(),
                });
            }
        }

        let mut record = new_node.attributes;
        if let Some(id) = &new_node.id {
            record.insert(self.id_field().to_string(), id.to_value());
        } else {
            record.remove(self.id_field());
        }
        record.insert(
            self.parent_field().to_string(),
            new_node
                .parent_id
                .as_ref()
                .map(RecordId::to_value)
                .unwrap_or(Value::Null),
        );
        record.insert(DELETED_FIELD.to_string(), Value::Bool(false));

        let created_by = new_node
            .created_by
            .unwrap_or(RecordId::Int(SYSTEM_IDENTITY));
        let updated_by = new_node.updated_by.unwrap_or_else(|| created_by.clone());
        if self.schema.has_field(CREATED_BY_FIELD) {
            record.insert(CREATED_BY_FIELD.to_string(), created_by.to_value());
        }
        if self.schema.has_field(UPDATED_BY_FIELD) {
            record.insert(UPDATED_BY_FIELD.to_string(), updated_by.to_value());
        }

        let node = self.to_node(store.create(self.collection(), record)?)?;

        if let Some(cache) = cache {
            if !cache.insert(node.clone()) {
                tracing::debug!(
                    node_id = %node.id,
                    "parent not materialised in tree cache, insert not mirrored"
                );
            }
        }

        Ok(node)
    }

    /// Move a node under a new parent (or make it a root)
    ///
    /// # Arguments
    /// * `store` - Record store to write to
    /// * `cache` - Loaded tree cache, if any
    /// * `node_id` - Node to move
    /// * `new_parent_id` - New parent, `None` to make the node a root
    ///
    /// # Errors
    /// * `NodeNotFound` - If the node does not exist
    /// * `ParentNotFound` - If the new parent does not exist
    /// * `CycleDetected` - If the new parent is the node or one of its descendants
    /// * `SameParent` - If the new parent is already the node's parent
    pub fn update_node_parent<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        cache: Option<&mut TreeCache>,
        node_id: &RecordId,
        new_parent_id: Option<&RecordId>,
    ) -> Result<Node> {
        let mut node = self.require(&*store, node_id)?;

        if let Some(pid) = new_parent_id {
            if self.find(&*store, pid)?.is_none() {
                return Err(GroveError::ParentNotFound {
                    parent_id: pid.to_string(),
                });
            }
            let path = self.get_path_to_node(&*store, pid)?;
            if path.contains(node_id) {
                return Err(GroveError::CycleDetected {
                    node_id: node_id.to_string(),
                    parent_id: pid.to_string(),
                    path: id_strings(&path),
                });
            }
        }

        if node.parent_id.as_ref() == new_parent_id {
            return Err(GroveError::SameParent {
                node_id: node_id.to_string(),
                parent_id: new_parent_id
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "null".to_string()),
            });
        }

        let mut patch = Record::new();
        patch.insert(
            self.parent_field().to_string(),
            new_parent_id
                .map(RecordId::to_value)
                .unwrap_or(Value::Null),
        );
        store.update_many(self.collection(), &self.id_filter(node_id), &patch)?;
        node.parent_id = new_parent_id.cloned();

        if let Some(cache) = cache {
            if !cache.reparent(node_id, new_parent_id) {
                tracing::debug!(
                    node_id = %node_id,
                    "node or new parent not materialised in tree cache, subtree dropped"
                );
            }
        }

        Ok(node)
    }

    /// Children of a node
    ///
    /// With `direct` only the immediate children are returned (one query).
    /// Otherwise all descendants are returned in breadth order, expanding
    /// one level at a time with one query per node.
    ///
    /// # Errors
    /// * `NodeNotFound` - If the node does not exist
    pub fn get_children_list<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        id: &RecordId,
        direct: bool,
    ) -> Result<Vec<Node>> {
        self.require(store, id)?;

        if direct {
            return self.direct_children(store, id);
        }

        let mut descendants = Vec::new();
        let mut visited = HashSet::from([id.clone()]);
        let mut level = vec![id.clone()];

        while !level.is_empty() {
            let mut next = Vec::new();
            for parent in &level {
                for child in self.direct_children(store, parent)? {
                    if visited.insert(child.id.clone()) {
                        next.push(child.id.clone());
                        descendants.push(child);
                    }
                }
            }
            level = next;
        }

        Ok(descendants)
    }

    fn direct_children<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        id: &RecordId,
    ) -> Result<Vec<Node>> {
        let filter = Filter::active().eq(self.parent_field(), id.to_value());
        store
            .find_many(self.collection(), &filter)?
            .into_iter()
            .map(|r| self.to_node(r))
            .collect()
    }

    /// Active nodes for a batch of ids, in store order
    ///
    /// Duplicate ids are collapsed before the lookup.
    ///
    /// # Errors
    /// * `NodesNotFound` - Listing every id with no active node
    pub fn require_all<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        ids: &[RecordId],
    ) -> Result<Vec<Node>> {
        let wanted = dedup_ids(ids);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::active().is_in(self.id_field(), wanted.iter().map(RecordId::to_value));
        let nodes = store
            .find_many(self.collection(), &filter)?
            .into_iter()
            .map(|r| self.to_node(r))
            .collect::<Result<Vec<_>>>()?;

        let found: HashSet<&RecordId> = nodes.iter().map(|n| &n.id).collect();
        let missing: Vec<RecordId> = wanted
            .iter()
            .filter(|id| !found.contains(id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(GroveError::NodesNotFound {
                missing: id_strings(&missing),
            });
        }
        Ok(nodes)
    }
}

/// Remove repeated ids, keeping first occurrences in order
pub(crate) fn dedup_ids(ids: &[RecordId]) -> Vec<RecordId> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

pub(crate) fn require_schema<S: RecordStore + ?Sized>(
    store: &S,
    collection: &str,
) -> Result<CollectionSchema> {
    store
        .describe(collection)?
        .ok_or_else(|| GroveError::CollectionNotFound {
            collection: collection.to_string(),
        })
}

pub(crate) fn require_field(schema: &CollectionSchema, field: &str) -> Result<()> {
    if schema.has_field(field) {
        Ok(())
    } else {
        Err(GroveError::FieldNotFound {
            collection: schema.name.clone(),
            field: field.to_string(),
        })
    }
}

fn validate_include<S: RecordStore + ?Sized>(
    store: &S,
    schema: &CollectionSchema,
    include: &Include,
) -> Result<()> {
    if include.field.trim().is_empty() {
        return Err(GroveError::InvalidDescriptor {
            reason: "include field must be a non-empty string".to_string(),
        });
    }
    require_field(schema, &include.local_field)?;
    let target = require_schema(store, &include.collection)?;
    require_field(&target, &include.foreign_field)?;
    if include.active_only {
        require_field(&target, DELETED_FIELD)?;
    }
    Ok(())
}
