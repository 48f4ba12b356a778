use thiserror::Error;

/// Result type alias using GroveError
pub type Result<T> = std::result::Result<T, GroveError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the node store, tree cache, content binder or a
/// record store backend is classified into exactly one of these kinds. Each
/// kind maps to a stable error code and a status classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    /// Bad id type or shape, unknown relation flag, missing required field
    InvalidArgument,
    /// Referenced node, content, collection or field is absent
    NotFound,
    /// Reparent would create a cycle, or the stored chain is already cyclic
    Conflict,
    /// Operation attempted before the required setup
    NotConfigured,
    /// Unexpected store failure
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidArgument => "ERR_INVALID_ARGUMENT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::NotConfigured => "ERR_NOT_CONFIGURED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Get the status classification for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            ExErrorKind::InvalidArgument => 422,
            ExErrorKind::NotFound => 404,
            ExErrorKind::Conflict => 409,
            ExErrorKind::NotConfigured => 500,
            ExErrorKind::Internal => 500,
        }
    }
}

/// Canonical structured error type
///
/// Provides classification fields for programmatic handling and rich context
/// for debugging. Produced from a [`GroveError`] at logging boundaries.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the status classification
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for Grove operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroveError {
    // ===== Argument Errors =====
    /// Identifier is missing or is neither a number nor a string
    #[error("Invalid id: {reason}")]
    InvalidId { reason: String },

    /// Descriptor or configuration value is malformed
    #[error("Invalid descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    /// Relation flag is not one of override, append, remove
    #[error("Invalid relation flag: {flag}")]
    UnknownRelationFlag { flag: String },

    /// Caller input could not be decoded
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// New parent equals the node's current parent
    #[error("Old parent id is matching the new parent id [{parent_id}] for node {node_id}")]
    SameParent { node_id: String, parent_id: String },

    // ===== Lookup Errors =====
    /// Collection does not exist in the record store
    #[error("Collection does not exist: {collection}")]
    CollectionNotFound { collection: String },

    /// Field is not part of the collection schema
    #[error("Field {field} is not in the columns of {collection}")]
    FieldNotFound { collection: String, field: String },

    /// Node was not found (or is soft-deleted)
    #[error("Node with id {node_id} was not found")]
    NodeNotFound { node_id: String },

    /// Parent node referenced by an insert or reparent does not exist
    #[error("Parent node {parent_id} does not exist")]
    ParentNotFound { parent_id: String },

    /// Some node ids in a batch do not exist
    #[error("Invalid node ids (not found): {missing:?}")]
    NodesNotFound { missing: Vec<String> },

    /// A path segment could not be matched in the cached forest
    #[error("Node of path not found {segment}, remaining path: {remaining:?}")]
    PathNotFound {
        segment: String,
        remaining: Vec<String>,
    },

    // ===== Structural Errors =====
    /// Reparenting would create a cycle
    #[error("Moving node {node_id} under {parent_id} would cause a loop, path to parent: {path:?}")]
    CycleDetected {
        node_id: String,
        parent_id: String,
        path: Vec<String>,
    },

    /// The stored parent chain already loops back on itself
    #[error("Parent chain of node {node_id} revisits node {revisited}")]
    ParentChainCycle { node_id: String, revisited: String },

    // ===== Setup Errors =====
    /// A component was used before being configured
    #[error("{component} is not set")]
    NotConfigured { component: String },

    /// The tree cache has not been loaded
    #[error("Tree is not loaded")]
    TreeNotLoaded,

    // ===== Store Errors =====
    /// Record store failure
    #[error("Store error in {op}: {message}")]
    Store { op: String, message: String },

    /// A stored record could not be mapped to the domain shape
    #[error("Malformed record in {collection}: {reason}")]
    MalformedRecord { collection: String, reason: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GroveError {
    /// Classify this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            GroveError::InvalidId { .. }
            | GroveError::InvalidDescriptor { .. }
            | GroveError::UnknownRelationFlag { .. }
            | GroveError::InvalidInput { .. }
            | GroveError::SameParent { .. } => ExErrorKind::InvalidArgument,

            GroveError::CollectionNotFound { .. }
            | GroveError::FieldNotFound { .. }
            | GroveError::NodeNotFound { .. }
            | GroveError::ParentNotFound { .. }
            | GroveError::NodesNotFound { .. }
            | GroveError::PathNotFound { .. } => ExErrorKind::NotFound,

            GroveError::CycleDetected { .. } | GroveError::ParentChainCycle { .. } => {
                ExErrorKind::Conflict
            }

            GroveError::NotConfigured { .. } | GroveError::TreeNotLoaded => {
                ExErrorKind::NotConfigured
            }

            GroveError::Store { .. }
            | GroveError::MalformedRecord { .. }
            | GroveError::Serialization { .. }
            | GroveError::Internal { .. } => ExErrorKind::Internal,
        }
    }

    /// Status classification of this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Create a store error for the given store operation
    pub fn store(op: impl Into<String>, message: impl Into<String>) -> Self {
        GroveError::Store {
            op: op.into(),
            message: message.into(),
        }
    }

    /// Create a not-configured error for the named component
    pub fn not_configured(component: impl Into<String>) -> Self {
        GroveError::NotConfigured {
            component: component.into(),
        }
    }

    fn entity_id(&self) -> Option<String> {
        match self {
            GroveError::NodeNotFound { node_id }
            | GroveError::SameParent { node_id, .. }
            | GroveError::CycleDetected { node_id, .. }
            | GroveError::ParentChainCycle { node_id, .. } => Some(node_id.clone()),
            GroveError::ParentNotFound { parent_id } => Some(parent_id.clone()),
            GroveError::PathNotFound { segment, .. } => Some(segment.clone()),
            GroveError::CollectionNotFound { collection }
            | GroveError::FieldNotFound { collection, .. }
            | GroveError::MalformedRecord { collection, .. } => Some(collection.clone()),
            _ => None,
        }
    }
}

/// Conversion from GroveError to ExError
impl From<GroveError> for ExError {
    fn from(err: GroveError) -> Self {
        let mut ex = ExError::new(err.kind()).with_message(err.to_string());
        if let Some(id) = err.entity_id() {
            ex = ex.with_entity_id(id);
        }
        if let GroveError::Store { op, .. } = &err {
            ex = ex.with_op(op.clone());
        }
        ex
    }
}

/// Conversion from serde_json::Error to GroveError
impl From<serde_json::Error> for GroveError {
    fn from(err: serde_json::Error) -> Self {
        GroveError::Serialization {
            message: err.to_string(),
        }
    }
}
