pub mod content_binder;
pub mod memory_store;
pub mod node_store;
pub mod record_store;
pub mod tree_cache;

pub use content_binder::ContentBinder;
pub use memory_store::MemoryStore;
pub use node_store::NodeStore;
pub use record_store::{CollectionSchema, Condition, Filter, RecordStore};
pub use tree_cache::{ParentRef, TreeCache, TreeNode};
