//! Logging vocabulary shared by the grove crates
//!
//! Kept dependency-free so any crate can name boundary events without
//! pulling in the domain kernel.

pub mod schema;
