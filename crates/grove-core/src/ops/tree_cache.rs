//! Nested projection of the node forest
//!
//! The cache is an arena: every materialised node lives in one id-indexed
//! map and refers to its children by id. Parents are only known through the
//! node's `parent_id`, so there are no back-pointers to keep consistent.

use std::collections::{HashMap, HashSet};

use super::node_store::NodeStore;
use super::record_store::{Filter, RecordStore};
use crate::errors::{GroveError, Result};
use crate::model::record_id::id_strings;
use crate::model::{NestedNode, Node, Placement, RecordId};

/// A materialised node with its ordered child ids and placed content
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub node: Node,
    pub children: Vec<RecordId>,
    pub content: Option<Vec<Placement>>,
}

impl TreeNode {
    fn new(node: Node, children: Vec<RecordId>) -> Self {
        Self {
            node,
            children,
            content: None,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.node.id
    }
}

/// Parent of a cached node: another node, or the root list for roots
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParentRef<'a> {
    Roots(&'a [RecordId]),
    Node(&'a TreeNode),
}

/// In-memory forest built from the flat node list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeCache {
    roots: Vec<RecordId>,
    nodes: HashMap<RecordId, TreeNode>,
}

impl TreeCache {
    /// Create an empty forest
    pub fn new() -> Self {
        Self::default()
    }

    /// Nest a flat node list into a forest
    ///
    /// Nodes without a parent become roots, in list order. Every other node
    /// is attached under its parent, children keeping list order. Nodes whose
    /// ancestor chain does not reach a root in the list are left out, and
    /// repeated ids keep their first occurrence.
    pub fn from_treelist(treelist: Vec<Node>) -> Self {
        let (roots, rest): (Vec<Node>, Vec<Node>) =
            treelist.into_iter().partition(Node::is_root);
        Self::assemble(roots, rest)
    }

    /// Nest the descendants of `node` found in `treelist` under it
    ///
    /// The node becomes the single root of the returned forest whatever its
    /// stored parent is.
    pub fn load_node_tree_from_treelist(node: Node, treelist: Vec<Node>) -> Self {
        let rest = treelist.into_iter().filter(|n| n.id != node.id).collect();
        Self::assemble(vec![node], rest)
    }

    fn assemble(roots: Vec<Node>, rest: Vec<Node>) -> Self {
        let mut by_id: HashMap<RecordId, Node> = HashMap::new();
        let mut by_parent: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
        let mut root_ids = Vec::new();

        for node in roots {
            if !by_id.contains_key(&node.id) {
                root_ids.push(node.id.clone());
                by_id.insert(node.id.clone(), node);
            }
        }
        for node in rest {
            if by_id.contains_key(&node.id) {
                continue;
            }
            if let Some(pid) = &node.parent_id {
                by_parent.entry(pid.clone()).or_default().push(node.id.clone());
            }
            by_id.insert(node.id.clone(), node);
        }

        let mut nodes = HashMap::with_capacity(by_id.len());
        let mut stack: Vec<RecordId> = root_ids.clone();
        while let Some(id) = stack.pop() {
            let Some(node) = by_id.remove(&id) else {
                continue;
            };
            let children = by_parent.remove(&id).unwrap_or_default();
            stack.extend(children.iter().cloned());
            nodes.insert(id, TreeNode::new(node, children));
        }

        Self {
            roots: root_ids,
            nodes,
        }
    }

    /// Snapshot every active node and nest it
    ///
    /// # Errors
    /// Propagates record store failures.
    pub fn load<S: RecordStore + ?Sized>(node_store: &NodeStore, store: &S) -> Result<Self> {
        let treelist = node_store.get_list_copy(store)?;
        Ok(Self::from_treelist(treelist))
    }

    /// Build the smallest forest holding each requested node, its path to
    /// the root and its whole subtree
    ///
    /// # Errors
    /// * `NodeNotFound` - If a requested node or one of its ancestors is missing
    /// * `ParentChainCycle` - If a stored parent chain loops
    pub fn load_tree_to_root<S: RecordStore + ?Sized>(
        node_store: &NodeStore,
        store: &S,
        ids: &[RecordId],
    ) -> Result<Self> {
        let mut path_ids = Vec::new();
        let mut on_path = HashSet::new();
        let mut treelist = Vec::new();

        for id in ids {
            for step in node_store.get_path_to_node(store, id)? {
                if on_path.insert(step.clone()) {
                    path_ids.push(step);
                }
            }
            treelist.extend(node_store.get_children_list(store, id, false)?);
        }

        let listed: HashSet<&RecordId> = treelist.iter().map(|n| &n.id).collect();
        let missing: Vec<_> = path_ids
            .iter()
            .filter(|id| !listed.contains(id))
            .map(RecordId::to_value)
            .collect();

        if !missing.is_empty() {
            let filter = Filter::active().is_in(node_store.id_field(), missing);
            for record in store.find_many(node_store.collection(), &filter)? {
                treelist.push(node_store.to_node(record)?);
            }
        }

        Ok(Self::from_treelist(treelist))
    }

    /// Nested subtree of one node
    ///
    /// Uses `treelist` as the candidate descendants when given, otherwise
    /// fetches the node's descendants from the store.
    ///
    /// # Errors
    /// * `NodeNotFound` - If the node does not exist
    pub fn load_node_tree<S: RecordStore + ?Sized>(
        node_store: &NodeStore,
        store: &S,
        id: &RecordId,
        treelist: Option<Vec<Node>>,
    ) -> Result<Self> {
        let node = node_store.get_node(store, id)?;
        let treelist = match treelist {
            Some(list) => list,
            None => node_store.get_children_list(store, id, false)?,
        };
        Ok(Self::load_node_tree_from_treelist(node, treelist))
    }

    pub fn roots(&self) -> &[RecordId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Direct arena lookup
    pub fn node(&self, id: &RecordId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Child ids of a cached node
    pub fn children_of(&self, id: &RecordId) -> Option<&[RecordId]> {
        self.nodes.get(id).map(|n| n.children.as_slice())
    }

    /// Resolve a root-first id path through the forest
    ///
    /// # Errors
    /// * `PathNotFound` - Naming the first unmatched segment and what remained after it
    /// * `InvalidInput` - If the path is empty
    pub fn get_node_from_tree(&self, path: &[RecordId]) -> Result<&TreeNode> {
        self.get_node_from_tree_in(&self.roots, path)
    }

    /// Resolve a path starting from the given sibling list
    ///
    /// # Errors
    /// Same as [`TreeCache::get_node_from_tree`].
    pub fn get_node_from_tree_in<'a>(
        &'a self,
        subtree: &'a [RecordId],
        path: &[RecordId],
    ) -> Result<&'a TreeNode> {
        let mut level = subtree;
        let mut current = None;

        for (i, segment) in path.iter().enumerate() {
            let found = level
                .contains(segment)
                .then(|| self.nodes.get(segment))
                .flatten()
                .ok_or_else(|| GroveError::PathNotFound {
                    segment: segment.to_string(),
                    remaining: id_strings(&path[i + 1..]),
                })?;
            level = found.children.as_slice();
            current = Some(found);
        }

        current.ok_or_else(|| GroveError::InvalidInput {
            reason: "node path must not be empty".to_string(),
        })
    }

    /// Resolve a node by id, walking its stored root path
    ///
    /// # Errors
    /// * `NodeNotFound` - If the node is not in the store
    /// * `PathNotFound` - If the node is not materialised
    pub fn get_node_by_id<S: RecordStore + ?Sized>(
        &self,
        node_store: &NodeStore,
        store: &S,
        id: &RecordId,
    ) -> Result<&TreeNode> {
        let path = node_store.get_path_to_node(store, id)?;
        self.get_node_from_tree(&path)
    }

    /// Parent of a cached node, or the root list for a root
    ///
    /// # Errors
    /// Same as [`TreeCache::get_node_by_id`].
    pub fn get_parent_node<S: RecordStore + ?Sized>(
        &self,
        node_store: &NodeStore,
        store: &S,
        id: &RecordId,
    ) -> Result<ParentRef<'_>> {
        let path = node_store.get_path_to_node(store, id)?;
        self.get_node_from_tree(&path)?;
        match path.split_last() {
            Some((_, ancestors)) if !ancestors.is_empty() => {
                Ok(ParentRef::Node(self.get_node_from_tree(ancestors)?))
            }
            _ => Ok(ParentRef::Roots(&self.roots)),
        }
    }

    /// Ids of the given nodes and all their cached descendants, pre-order
    pub fn subtree_ids(&self, start: &[RecordId]) -> Vec<RecordId> {
        let mut out = Vec::new();
        let mut stack: Vec<&RecordId> = start.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(id.clone());
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Render the forest as nested serialisable nodes
    pub fn nested(&self) -> Vec<NestedNode> {
        self.roots.iter().filter_map(|id| self.nest(id)).collect()
    }

    fn nest(&self, id: &RecordId) -> Option<NestedNode> {
        let tree_node = self.nodes.get(id)?;
        Some(NestedNode {
            id: tree_node.node.id.clone(),
            parent_id: tree_node.node.parent_id.clone(),
            attributes: tree_node.node.attributes.clone(),
            children: tree_node
                .children
                .iter()
                .filter_map(|c| self.nest(c))
                .collect(),
            content: tree_node.content.clone(),
        })
    }

    /// Mirror a newly stored node
    ///
    /// Returns false when the node's parent is not materialised; the node
    /// is then left out.
    pub fn insert(&mut self, node: Node) -> bool {
        let id = node.id.clone();
        match &node.parent_id {
            None => {
                if !self.roots.contains(&id) {
                    self.roots.push(id.clone());
                }
            }
            Some(pid) => match self.nodes.get_mut(pid) {
                Some(parent) => {
                    if !parent.children.contains(&id) {
                        parent.children.push(id.clone());
                    }
                }
                None => return false,
            },
        }
        match self.nodes.get_mut(&id) {
            Some(existing) => existing.node = node,
            None => {
                self.nodes.insert(id, TreeNode::new(node, Vec::new()));
            }
        }
        true
    }

    /// Mirror a parent change
    ///
    /// Detaches the node from its old sibling list and appends it to the new
    /// parent's children (or the root list) unless already there. When the
    /// new parent is not materialised the node's subtree is dropped. Returns
    /// false if the node was not cached or its subtree was dropped.
    pub fn reparent(&mut self, id: &RecordId, new_parent_id: Option<&RecordId>) -> bool {
        let Some(old_parent) = self.nodes.get(id).map(|n| n.node.parent_id.clone()) else {
            return false;
        };

        self.roots.retain(|r| r != id);
        if let Some(pid) = old_parent {
            if let Some(parent) = self.nodes.get_mut(&pid) {
                parent.children.retain(|c| c != id);
            }
        }

        match new_parent_id {
            None => {
                self.roots.push(id.clone());
            }
            Some(pid) => match self.nodes.get_mut(pid) {
                Some(parent) => {
                    if !parent.children.contains(id) {
                        parent.children.push(id.clone());
                    }
                }
                None => {
                    self.remove_subtree(id);
                    return false;
                }
            },
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.node.parent_id = new_parent_id.cloned();
        }
        true
    }

    fn remove_subtree(&mut self, id: &RecordId) {
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }

    /// Replace a node's placed content; false if the node is not cached
    pub fn set_content(&mut self, id: &RecordId, content: Vec<Placement>) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.content = Some(content);
                true
            }
            None => false,
        }
    }

    /// Empty a node's placed content if it has any
    pub fn clear_content(&mut self, id: &RecordId) {
        if let Some(content) = self.nodes.get_mut(id).and_then(|n| n.content.as_mut()) {
            content.clear();
        }
    }

    /// Drop one content item from a node's placed content
    pub fn remove_content_from(&mut self, id: &RecordId, content_id: &RecordId) {
        if let Some(content) = self.nodes.get_mut(id).and_then(|n| n.content.as_mut()) {
            content.retain(|p| &p.content_id != content_id);
        }
    }

    /// Drop one content item from every cached node
    pub fn remove_content_everywhere(&mut self, content_id: &RecordId) {
        for node in self.nodes.values_mut() {
            if let Some(content) = node.content.as_mut() {
                content.retain(|p| &p.content_id != content_id);
            }
        }
    }
}
