//! Grove Core - hierarchical record forest kernel
//!
//! This crate provides the data structures and operations for managing a
//! forest of parent-linked records kept in a persistent record store,
//! including:
//! - A `RecordStore` collaborator trait with an in-memory implementation
//! - The Node Store: validated structural edits over the flat node collection
//! - The Tree Cache: a nested, id-indexed projection of the forest
//! - The Content Binder: many-to-many content attachment with reconciliation
//! - Error and logging facilities shared with the store and engine crates

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod ops;

#[doc(hidden)]
pub use grove_core_types as types;

// Re-export commonly used types
pub use config::{ContentDescriptor, GroveConfig, Include, NodeStoreDescriptor};
pub use errors::{ExError, ExErrorKind, GroveError, Result};
pub use model::{
    ContentItem, ContentOutcome, NestedNode, NewNode, Node, Placement, Record, RecordId,
    RelationFlag,
};
pub use ops::{
    CollectionSchema, Condition, ContentBinder, Filter, MemoryStore, NodeStore, ParentRef,
    RecordStore, TreeCache, TreeNode,
};
