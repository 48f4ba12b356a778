//! Grove Engine - Orchestration layer
//!
//! Provides the `Hierarchy` coordinator that owns a record store together
//! with its node store, tree cache and content binder, and wraps every
//! public operation in boundary logging.

pub mod hierarchy;

pub use hierarchy::{Hierarchy, NodeRef, PlaceContent};
