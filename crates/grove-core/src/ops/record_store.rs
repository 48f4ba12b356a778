//! Record store collaborator contract
//!
//! The node store, tree cache and content binder never talk to a database
//! directly. They go through [`RecordStore`], which offers filtered reads,
//! creates, bulk updates and deletes, and schema introspection.

use serde_json::Value;

use crate::errors::Result;
use crate::model::{Record, DELETED_FIELD};

/// Field layout of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub primary_key: String,
    pub fields: Vec<String>,
}

impl CollectionSchema {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// One predicate of a [`Filter`]
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value; a null value matches null or missing fields
    Eq(String, Value),
    /// Field equals one of the values; an empty list matches nothing
    In(String, Vec<Value>),
}

/// Conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching records that are not soft-deleted
    pub fn active() -> Self {
        Self::new().eq(DELETED_FIELD, false)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    pub fn is_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluate the filter against a record
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq(field, Value::Null) => {
                matches!(record.get(field), None | Some(Value::Null))
            }
            Condition::Eq(field, expected) => record
                .get(field)
                .is_some_and(|actual| values_match(actual, expected)),
            Condition::In(field, values) => record
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| values_match(actual, v))),
        })
    }
}

/// Compare stored and filter values, tolerating the encodings backends use
/// for ids (integer vs numeric text) and flags (bool vs 0/1)
pub(crate) fn values_match(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
            n.as_i64() == Some(i64::from(*b))
        }
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            n.as_i64().is_some_and(|n| n.to_string() == s.trim())
        }
        _ => false,
    }
}

/// Persistence collaborator used by every grove component
///
/// Reads return records in a stable insertion order. Writes return the
/// stored record or the number of affected records.
pub trait RecordStore {
    /// Describe a collection, or `None` if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `Store` if the backend cannot be queried.
    fn describe(&self, collection: &str) -> Result<Option<CollectionSchema>>;

    /// All records of a collection matching the filter
    ///
    /// # Errors
    ///
    /// Returns `Store` on backend failure or an unknown collection.
    fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>>;

    /// First record matching the filter
    ///
    /// # Errors
    ///
    /// Returns `Store` on backend failure or an unknown collection.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Record>> {
        Ok(self.find_many(collection, filter)?.into_iter().next())
    }

    /// Persist a new record and return it as stored
    ///
    /// The primary key is assigned when the record does not carry one.
    ///
    /// # Errors
    ///
    /// Returns `Store` for unknown fields, a duplicate primary key or a
    /// backend failure.
    fn create(&mut self, collection: &str, record: Record) -> Result<Record>;

    /// Apply `patch` to every matching record
    ///
    /// # Errors
    ///
    /// Returns `Store` for unknown fields or a backend failure.
    fn update_many(&mut self, collection: &str, filter: &Filter, patch: &Record) -> Result<usize>;

    /// Remove every matching record
    ///
    /// # Errors
    ///
    /// Returns `Store` on backend failure.
    fn delete_many(&mut self, collection: &str, filter: &Filter) -> Result<usize>;
}
