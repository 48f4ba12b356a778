use serde_json::Value;
use std::collections::HashMap;

use super::record_store::{values_match, CollectionSchema, Filter, RecordStore};
use crate::errors::{GroveError, Result};
use crate::model::{Record, DELETED_FIELD};

#[derive(Debug, Clone)]
struct Collection {
    schema: CollectionSchema,
    rows: Vec<Record>,
    next_id: i64,
}

/// In-memory record store
///
/// A HashMap of collections, each holding its rows in insertion order.
/// Not thread-safe; designed for single-threaded use and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Collection>,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Declare a collection with its primary key and fields
    ///
    /// The primary key and the soft-delete flag are always part of the
    /// field list. Redefining a collection discards its rows.
    pub fn define_collection(&mut self, name: &str, primary_key: &str, fields: &[&str]) {
        let mut all_fields = vec![primary_key.to_string()];
        for field in fields.iter().chain(std::iter::once(&DELETED_FIELD)) {
            if !all_fields.iter().any(|f| f == field) {
                all_fields.push(field.to_string());
            }
        }
        self.collections.insert(
            name.to_string(),
            Collection {
                schema: CollectionSchema {
                    name: name.to_string(),
                    primary_key: primary_key.to_string(),
                    fields: all_fields,
                },
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    /// Builder form of [`MemoryStore::define_collection`]
    pub fn with_collection(mut self, name: &str, primary_key: &str, fields: &[&str]) -> Self {
        self.define_collection(name, primary_key, fields);
        self
    }

    /// Every row of a collection, soft-deleted ones included
    pub fn rows(&self, collection: &str) -> &[Record] {
        self.collections
            .get(collection)
            .map(|c| c.rows.as_slice())
            .unwrap_or(&[])
    }

    fn collection(&self, op: &str, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| GroveError::store(op, format!("collection {} is not defined", name)))
    }

    fn collection_mut(&mut self, op: &str, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| GroveError::store(op, format!("collection {} is not defined", name)))
    }
}

impl Collection {
    fn check_fields<'a>(&self, op: &str, fields: impl Iterator<Item = &'a String>) -> Result<()> {
        for field in fields {
            if !self.schema.has_field(field) {
                return Err(GroveError::store(
                    op,
                    format!("unknown field {} in {}", field, self.schema.name),
                ));
            }
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn describe(&self, collection: &str) -> Result<Option<CollectionSchema>> {
        Ok(self.collections.get(collection).map(|c| c.schema.clone()))
    }

    fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>> {
        let coll = self.collection("find_many", collection)?;
        Ok(coll
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    fn create(&mut self, collection: &str, mut record: Record) -> Result<Record> {
        let coll = self.collection_mut("create", collection)?;
        coll.check_fields("create", record.keys())?;

        let pk = coll.schema.primary_key.clone();
        let id = match record.get(&pk) {
            None | Some(Value::Null) => {
                let id = coll.next_id;
                coll.next_id = id_after("create", collection, id)?;
                Value::from(id)
            }
            Some(id) => {
                if coll
                    .rows
                    .iter()
                    .any(|row| row.get(&pk).is_some_and(|v| values_match(v, id)))
                {
                    return Err(GroveError::store(
                        "create",
                        format!("duplicate {} {} in {}", pk, id, collection),
                    ));
                }
                if let Some(n) = id.as_i64() {
                    coll.next_id = coll.next_id.max(id_after("create", collection, n)?);
                }
                id.clone()
            }
        };
        record.insert(pk, id);

        for field in &coll.schema.fields {
            if !record.contains_key(field) {
                let default = if field == DELETED_FIELD {
                    Value::Bool(false)
                } else {
                    Value::Null
                };
                record.insert(field.clone(), default);
            }
        }

        coll.rows.push(record.clone());
        Ok(record)
    }

    fn update_many(&mut self, collection: &str, filter: &Filter, patch: &Record) -> Result<usize> {
        let coll = self.collection_mut("update_many", collection)?;
        coll.check_fields("update_many", patch.keys())?;

        let mut affected = 0;
        for row in coll.rows.iter_mut().filter(|row| filter.matches(row)) {
            for (field, value) in patch {
                row.insert(field.clone(), value.clone());
            }
            affected += 1;
        }
        Ok(affected)
    }

    fn delete_many(&mut self, collection: &str, filter: &Filter) -> Result<usize> {
        let coll = self.collection_mut("delete_many", collection)?;
        let before = coll.rows.len();
        coll.rows.retain(|row| !filter.matches(row));
        Ok(before - coll.rows.len())
    }
}

/// Next free integer id after `n`
fn id_after(op: &str, collection: &str, n: i64) -> Result<i64> {
    n.checked_add(1).ok_or_else(|| {
        GroveError::store(op, format!("integer ids exhausted in {} at {}", collection, n))
    })
}
