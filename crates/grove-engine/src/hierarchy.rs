//! Hierarchy coordinator with boundary logging.
//!
//! `Hierarchy` owns one record store, the node store configured over it, an
//! optional installed tree cache and an optional content binder. Each public
//! operation hands the components to one another explicitly.
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging for every operation:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (store, core) use only `tracing::debug!()` for internal details.

#![allow(clippy::result_large_err)]

use std::time::Instant;

use grove_core::errors::{GroveError, Result};
use grove_core::{log_op_end, log_op_error, log_op_start};
use grove_core::{
    ContentBinder, ContentDescriptor, ContentItem, ContentOutcome, GroveConfig, NewNode, Node,
    NodeStore, NodeStoreDescriptor, ParentRef, Record, RecordId, RecordStore, TreeCache,
    TreeNode,
};

/// Content placement requested together with a partial tree load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlaceContent {
    /// Leave `content` unset
    #[default]
    Skip,
    /// Place every related content item
    All,
    /// Place only these content items; an empty list places every item
    Only(Vec<RecordId>),
}

/// A node addressed by id or by its explicit root-first path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    Id(RecordId),
    Path(Vec<RecordId>),
}

impl From<RecordId> for NodeRef {
    fn from(id: RecordId) -> Self {
        NodeRef::Id(id)
    }
}

impl From<Vec<RecordId>> for NodeRef {
    fn from(path: Vec<RecordId>) -> Self {
        NodeRef::Path(path)
    }
}

/// Run one operation between start and end/end_error events
fn boundary<T>(op: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    log_op_start!(op);
    let start = Instant::now();

    match f() {
        Ok(value) => {
            log_op_end!(op, duration_ms = start.elapsed().as_millis() as u64);
            Ok(value)
        }
        Err(e) => {
            log_op_error!(op, e.clone(), duration_ms = start.elapsed().as_millis() as u64);
            Err(e)
        }
    }
}

fn require_nodes(nodes: &Option<NodeStore>) -> Result<&NodeStore> {
    nodes
        .as_ref()
        .ok_or_else(|| GroveError::not_configured("Node store"))
}

fn require_content(content: &Option<ContentBinder>) -> Result<&ContentBinder> {
    content
        .as_ref()
        .ok_or_else(|| GroveError::not_configured("Content"))
}

/// One managed hierarchy over a record store
pub struct Hierarchy<S: RecordStore> {
    store: S,
    nodes: Option<NodeStore>,
    content: Option<ContentBinder>,
    cache: Option<TreeCache>,
}

impl<S: RecordStore> Hierarchy<S> {
    /// Wrap a store; nothing is configured yet
    pub fn new(store: S) -> Self {
        Self {
            store,
            nodes: None,
            content: None,
            cache: None,
        }
    }

    /// Wrap a store and configure the node store, then content when present
    ///
    /// # Errors
    ///
    /// Returns the first configuration failure.
    pub fn from_config(store: S, config: GroveConfig) -> Result<Self> {
        let mut hierarchy = Self::new(store);
        hierarchy.configure_nodes(config.nodes)?;
        if let Some(content) = config.content {
            hierarchy.configure_content(config.load_content, content)?;
        }
        Ok(hierarchy)
    }

    // ===== Setup =====

    /// Configure (or reconfigure) the node store
    ///
    /// Reconfiguring drops the installed tree cache and content binder. A
    /// failed configuration leaves the node store unset.
    ///
    /// # Errors
    /// * `InvalidDescriptor` - If a name is empty
    /// * `CollectionNotFound` / `FieldNotFound` - If the store lacks them
    pub fn configure_nodes(&mut self, descriptor: NodeStoreDescriptor) -> Result<()> {
        boundary("configure_nodes", || {
            self.cache = None;
            self.content = None;
            self.nodes = None;
            self.nodes = Some(NodeStore::configure(&self.store, descriptor)?);
            Ok(())
        })
    }

    /// Configure the content binder
    ///
    /// With `load_now` and a loaded tree, content is placed on the whole
    /// forest right away.
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `InvalidDescriptor` - If a name is empty
    /// * `CollectionNotFound` / `FieldNotFound` - If the store lacks them
    pub fn configure_content(
        &mut self,
        load_now: bool,
        descriptor: ContentDescriptor,
    ) -> Result<()> {
        boundary("configure_content", || {
            self.content = None;
            let nodes = require_nodes(&self.nodes)?;
            let binder = self.content.insert(ContentBinder::configure(
                &self.store,
                nodes,
                descriptor,
            )?);
            if load_now {
                if let Some(cache) = self.cache.as_mut() {
                    let placed = binder.place_content(&self.store, cache, None, None, false)?;
                    tracing::debug!(placed, "content placed on configure");
                }
            }
            Ok(())
        })
    }

    /// Configured node store, if any
    pub fn node_store(&self) -> Option<&NodeStore> {
        self.nodes.as_ref()
    }

    /// Configured content binder, if any
    pub fn content_binder(&self) -> Option<&ContentBinder> {
        self.content.as_ref()
    }

    // ===== Node Store =====

    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `NodeNotFound` - If no active node has this id
    pub fn get_node(&self, id: &RecordId) -> Result<Node> {
        boundary("get_node", || {
            require_nodes(&self.nodes)?.get_node(&self.store, id)
        })
    }

    /// Root-first path ending at `id`
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `NodeNotFound` - If the node or an ancestor is missing
    /// * `ParentChainCycle` - If the stored chain loops
    pub fn get_path_to_node(&self, id: &RecordId) -> Result<Vec<RecordId>> {
        boundary("get_path_to_node", || {
            require_nodes(&self.nodes)?.get_path_to_node(&self.store, id)
        })
    }

    /// Root of the tree holding `id`; a root returns itself
    ///
    /// # Errors
    /// Same as [`Hierarchy::get_path_to_node`].
    pub fn get_root(&self, id: &RecordId) -> Result<RecordId> {
        boundary("get_root", || {
            require_nodes(&self.nodes)?.get_root(&self.store, id)
        })
    }

    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    pub fn get_list_copy(&self) -> Result<Vec<Node>> {
        boundary("get_list_copy", || {
            require_nodes(&self.nodes)?.get_list_copy(&self.store)
        })
    }

    /// Persist a node and mirror it into the installed cache
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `ParentNotFound` - If the parent does not exist
    pub fn insert_node(&mut self, new_node: NewNode) -> Result<Node> {
        boundary("insert_node", || {
            require_nodes(&self.nodes)?.insert_node(&mut self.store, self.cache.as_mut(), new_node)
        })
    }

    /// Move a node under a new parent, or make it a root with `None`
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `NodeNotFound` / `ParentNotFound` - If either end is missing
    /// * `CycleDetected` - If the new parent is the node or a descendant
    /// * `SameParent` - If nothing would change
    pub fn update_node_parent(
        &mut self,
        node_id: &RecordId,
        new_parent_id: Option<&RecordId>,
    ) -> Result<Node> {
        boundary("update_node_parent", || {
            require_nodes(&self.nodes)?.update_node_parent(
                &mut self.store,
                self.cache.as_mut(),
                node_id,
                new_parent_id,
            )
        })
    }

    /// Direct children, or every descendant in breadth order
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `NodeNotFound` - If the node does not exist
    pub fn get_children_list(&self, id: &RecordId, direct: bool) -> Result<Vec<Node>> {
        boundary("get_children_list", || {
            require_nodes(&self.nodes)?.get_children_list(&self.store, id, direct)
        })
    }

    // ===== Tree Cache =====

    /// Load the whole forest and install it as the cache
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    pub fn load_tree(&mut self) -> Result<&TreeCache> {
        let loaded = boundary("load_tree", || {
            TreeCache::load(require_nodes(&self.nodes)?, &self.store)
        })?;
        Ok(&*self.cache.insert(loaded))
    }

    /// Minimal forest holding each node's root path and subtree
    ///
    /// The returned forest is independent of the installed cache. Content is
    /// placed on the requested nodes and their subtrees as asked.
    ///
    /// # Errors
    /// * `NotConfigured` - If content placement is asked without a binder
    /// * `NodeNotFound` - If a requested node or ancestor is missing
    pub fn load_tree_to_root(&self, ids: &[RecordId], place: PlaceContent) -> Result<TreeCache> {
        boundary("load_tree_to_root", || self.partial_tree(ids, place))
    }

    fn partial_tree(&self, ids: &[RecordId], place: PlaceContent) -> Result<TreeCache> {
        let nodes = require_nodes(&self.nodes)?;
        let only = match place {
            PlaceContent::Skip => return TreeCache::load_tree_to_root(nodes, &self.store, ids),
            PlaceContent::All => None,
            PlaceContent::Only(content_ids) => Some(content_ids),
        };
        let binder = require_content(&self.content)?;
        let mut tree = TreeCache::load_tree_to_root(nodes, &self.store, ids)?;
        binder.place_content(&self.store, &mut tree, Some(ids), only.as_deref(), false)?;
        Ok(tree)
    }

    /// Nested subtree of one node, from `treelist` when given
    ///
    /// # Errors
    /// * `NotConfigured` - If the node store is not configured
    /// * `NodeNotFound` - If the node does not exist
    pub fn load_node_tree(&self, id: &RecordId, treelist: Option<Vec<Node>>) -> Result<TreeCache> {
        boundary("load_node_tree", || {
            TreeCache::load_node_tree(require_nodes(&self.nodes)?, &self.store, id, treelist)
        })
    }

    /// Resolve a node in the installed cache
    ///
    /// Ids are expanded to their stored root path first.
    ///
    /// # Errors
    /// * `TreeNotLoaded` - If no cache is installed
    /// * `PathNotFound` - If a path segment is not materialised
    pub fn get_node_from_tree(&self, node: &NodeRef) -> Result<&TreeNode> {
        let nodes = &self.nodes;
        let store = &self.store;
        let cache = &self.cache;
        boundary("get_node_from_tree", move || {
            let cache = cache.as_ref().ok_or(GroveError::TreeNotLoaded)?;
            match node {
                NodeRef::Id(id) => cache.get_node_by_id(require_nodes(nodes)?, store, id),
                NodeRef::Path(path) => cache.get_node_from_tree(path),
            }
        })
    }

    /// Cached parent of a node, or the root list for a root
    ///
    /// # Errors
    /// * `TreeNotLoaded` - If no cache is installed
    /// * `PathNotFound` - If the node is not materialised
    pub fn get_parent_node(&self, id: &RecordId) -> Result<ParentRef<'_>> {
        let nodes = &self.nodes;
        let store = &self.store;
        let cache = &self.cache;
        boundary("get_parent_node", move || {
            let cache = cache.as_ref().ok_or(GroveError::TreeNotLoaded)?;
            cache.get_parent_node(require_nodes(nodes)?, store, id)
        })
    }

    /// Installed cache, if loaded
    pub fn cache(&self) -> Option<&TreeCache> {
        self.cache.as_ref()
    }

    /// Remove and return the installed cache
    pub fn take_cache(&mut self) -> Option<TreeCache> {
        self.cache.take()
    }

    /// Install a cache built elsewhere, returning the previous one
    pub fn install_cache(&mut self, cache: TreeCache) -> Option<TreeCache> {
        self.cache.replace(cache)
    }

    /// Drop the installed cache
    pub fn invalidate_cache(&mut self) {
        if self.cache.take().is_some() {
            tracing::debug!("tree cache invalidated");
        }
    }

    // ===== Content Binder =====

    /// Place content on the installed cache
    ///
    /// # Errors
    /// * `NotConfigured` - If content is not configured
    /// * `TreeNotLoaded` - If no cache is installed
    pub fn place_content(
        &mut self,
        targets: Option<&[RecordId]>,
        only: Option<&[RecordId]>,
        direct_only: bool,
    ) -> Result<usize> {
        boundary("place_content", || {
            let binder = require_content(&self.content)?;
            let cache = self.cache.as_mut().ok_or(GroveError::TreeNotLoaded)?;
            binder.place_content(&self.store, cache, targets, only, direct_only)
        })
    }

    /// Create or reuse content items and reconcile their relations
    ///
    /// # Errors
    /// * `NotConfigured` - If content is not configured
    /// * `NodesNotFound` - If an item targets missing nodes
    pub fn add_content(&mut self, items: Vec<ContentItem>) -> Result<Vec<ContentOutcome>> {
        boundary("add_content", || {
            let nodes = require_nodes(&self.nodes)?;
            require_content(&self.content)?.add_content(
                &mut self.store,
                nodes,
                self.cache.as_mut(),
                items,
            )
        })
    }

    /// Soft-delete relations by content item, by nodes, or both
    ///
    /// # Errors
    /// * `NotConfigured` - If content is not configured
    /// * `InvalidInput` - If neither a content id nor nodes are given
    /// * `NodesNotFound` - If listed nodes are missing
    pub fn delete_content_relations(
        &mut self,
        content_id: Option<&RecordId>,
        node_ids: Option<&[RecordId]>,
    ) -> Result<usize> {
        boundary("delete_content_relations", || {
            let nodes = require_nodes(&self.nodes)?;
            require_content(&self.content)?.delete_content_relations(
                &mut self.store,
                nodes,
                self.cache.as_mut(),
                content_id,
                node_ids,
            )
        })
    }

    /// Content items with no active relations, and all content items
    ///
    /// # Errors
    /// * `NotConfigured` - If content is not configured
    pub fn get_content_with_no_relations(&self) -> Result<(Vec<Record>, Vec<Record>)> {
        boundary("get_content_with_no_relations", || {
            require_content(&self.content)?.get_content_with_no_relations(&self.store)
        })
    }

    /// Partial forest around every node the given content items relate to,
    /// with only those items placed
    ///
    /// # Errors
    /// * `NotConfigured` - If content is not configured
    pub fn fetch_tree_to_root_by_relations(&self, content_ids: &[RecordId]) -> Result<TreeCache> {
        boundary("fetch_tree_to_root_by_relations", || {
            let node_ids =
                require_content(&self.content)?.related_node_ids(&self.store, content_ids)?;
            self.partial_tree(&node_ids, PlaceContent::Only(content_ids.to_vec()))
        })
    }

    /// Active relations of one content item with their nodes embedded
    ///
    /// # Errors
    /// * `NotConfigured` - If content is not configured
    pub fn relations_of(&self, content_id: &RecordId) -> Result<Vec<Record>> {
        boundary("relations_of", || {
            let nodes = require_nodes(&self.nodes)?;
            require_content(&self.content)?.relations_of(&self.store, nodes, content_id)
        })
    }

    // ===== Store access =====

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable store access; writes made here bypass cache mirroring
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
