use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::node_store::{dedup_ids, require_field, require_schema, NodeStore};
use super::record_store::{Filter, RecordStore};
use super::tree_cache::TreeCache;
use crate::config::ContentDescriptor;
use crate::errors::{GroveError, Result};
use crate::model::record_id::id_strings;
use crate::model::{
    ContentItem, ContentOutcome, Placement, Record, RecordId, RelationFlag, DELETED_FIELD,
};

/// Many-to-many attachment of content records onto nodes
///
/// Relations are soft-deleted rows of the relation collection linking one
/// content id to one node id. The binder reconciles them and keeps the
/// `content` of cached nodes current.
#[derive(Debug, Clone)]
pub struct ContentBinder {
    descriptor: ContentDescriptor,
}

impl ContentBinder {
    /// Validate a content descriptor against the store
    ///
    /// Requires a configured node store, which the signature enforces.
    ///
    /// # Errors
    /// * `InvalidDescriptor` - If any name is empty
    /// * `CollectionNotFound` - If the content or relation collection does not exist
    /// * `FieldNotFound` - If an id field or the soft-delete flag is missing
    pub fn configure<S: RecordStore + ?Sized>(
        store: &S,
        node_store: &NodeStore,
        descriptor: ContentDescriptor,
    ) -> Result<Self> {
        for (name, value) in [
            ("content_collection", &descriptor.content_collection),
            ("content_id_field", &descriptor.content_id_field),
            ("content_relations_field", &descriptor.content_relations_field),
            ("relation_collection", &descriptor.relation_collection),
            (
                "relation_to_content_link_field",
                &descriptor.relation_to_content_link_field,
            ),
            (
                "relation_to_content_id_field",
                &descriptor.relation_to_content_id_field,
            ),
            (
                "relation_to_node_link_field",
                &descriptor.relation_to_node_link_field,
            ),
            ("relation_to_node_id_field", &descriptor.relation_to_node_id_field),
        ] {
            if value.trim().is_empty() {
                return Err(GroveError::InvalidDescriptor {
                    reason: format!("{} must be a non-empty string", name),
                });
            }
        }

        let content = require_schema(store, &descriptor.content_collection)?;
        require_field(&content, &descriptor.content_id_field)?;
        require_field(&content, DELETED_FIELD)?;

        let relations = require_schema(store, &descriptor.relation_collection)?;
        require_field(&relations, &descriptor.relation_to_content_id_field)?;
        require_field(&relations, &descriptor.relation_to_node_id_field)?;
        require_field(&relations, DELETED_FIELD)?;

        tracing::debug!(
            content = %descriptor.content_collection,
            relations = %descriptor.relation_collection,
            nodes = %node_store.collection(),
            "content binder configured"
        );

        Ok(Self { descriptor })
    }

    pub fn descriptor(&self) -> &ContentDescriptor {
        &self.descriptor
    }

    fn content_field(&self) -> &str {
        &self.descriptor.relation_to_content_id_field
    }

    fn node_field(&self) -> &str {
        &self.descriptor.relation_to_node_id_field
    }

    fn relation_filter(&self, content_id: &RecordId) -> Filter {
        Filter::active().eq(self.content_field(), content_id.to_value())
    }

    fn field_id(&self, record: &Record, field: &str, collection: &str) -> Result<RecordId> {
        record
            .get(field)
            .ok_or_else(|| GroveError::MalformedRecord {
                collection: collection.to_string(),
                reason: format!("missing {}", field),
            })
            .and_then(|v| {
                RecordId::from_value(v).map_err(|e| GroveError::MalformedRecord {
                    collection: collection.to_string(),
                    reason: format!("{}: {}", field, e),
                })
            })
    }

    fn content_id_of(&self, record: &Record) -> Result<RecordId> {
        self.field_id(
            record,
            &self.descriptor.content_id_field,
            &self.descriptor.content_collection,
        )
    }

    /// Node ids currently holding an active relation to the content item
    fn related_nodes<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        content_id: &RecordId,
    ) -> Result<Vec<RecordId>> {
        let relations = store.find_many(
            &self.descriptor.relation_collection,
            &self.relation_filter(content_id),
        )?;
        let mut ids = Vec::with_capacity(relations.len());
        for relation in &relations {
            ids.push(self.field_id(
                relation,
                self.node_field(),
                &self.descriptor.relation_collection,
            )?);
        }
        Ok(dedup_ids(&ids))
    }

    /// Node ids related to any of the given content items, first seen first
    ///
    /// # Errors
    /// Propagates record store failures.
    pub fn related_node_ids<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        content_ids: &[RecordId],
    ) -> Result<Vec<RecordId>> {
        let filter = Filter::active().is_in(
            self.content_field(),
            content_ids.iter().map(RecordId::to_value),
        );
        let mut ids = Vec::new();
        for relation in store.find_many(&self.descriptor.relation_collection, &filter)? {
            ids.push(self.field_id(
                &relation,
                self.node_field(),
                &self.descriptor.relation_collection,
            )?);
        }
        Ok(dedup_ids(&ids))
    }

    /// Active relations of one node joined to their active content records
    fn placements_for<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        node_id: &RecordId,
        only: Option<&HashSet<RecordId>>,
    ) -> Result<Vec<Placement>> {
        let relations = store.find_many(
            &self.descriptor.relation_collection,
            &Filter::active().eq(self.node_field(), node_id.to_value()),
        )?;

        let mut linked = Vec::with_capacity(relations.len());
        for relation in relations {
            let content_id = self.field_id(
                &relation,
                self.content_field(),
                &self.descriptor.relation_collection,
            )?;
            if only.map_or(true, |set| set.contains(&content_id)) {
                linked.push((content_id, relation));
            }
        }
        if linked.is_empty() {
            return Ok(Vec::new());
        }

        let wanted = dedup_ids(&linked.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>());
        let filter = Filter::active().is_in(
            self.descriptor.content_id_field.as_str(),
            wanted.iter().map(RecordId::to_value),
        );
        let mut contents = HashMap::new();
        for record in store.find_many(&self.descriptor.content_collection, &filter)? {
            contents.insert(self.content_id_of(&record)?, record);
        }

        Ok(linked
            .into_iter()
            .filter_map(|(content_id, relation)| {
                contents.get(&content_id).map(|content| Placement {
                    content_id,
                    relation,
                    content: content.clone(),
                    link_field: self.descriptor.relation_to_content_link_field.clone(),
                })
            })
            .collect())
    }

    /// Assign placed content to cached nodes
    ///
    /// # Arguments
    /// * `store` - Record store to read relations and content from
    /// * `cache` - Forest to write `content` into
    /// * `targets` - Nodes to start from, the whole forest when `None`
    /// * `only` - Restrict placement to these content ids; empty means no restriction
    /// * `direct_only` - Do not descend into the targets' children
    ///
    /// Returns the number of nodes whose content was assigned. Targets that
    /// are not materialised are skipped.
    ///
    /// # Errors
    /// Propagates record store failures.
    pub fn place_content<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        cache: &mut TreeCache,
        targets: Option<&[RecordId]>,
        only: Option<&[RecordId]>,
        direct_only: bool,
    ) -> Result<usize> {
        let start: Vec<RecordId> = match targets {
            Some(ids) => ids.to_vec(),
            None => cache.roots().to_vec(),
        };
        let ids = if direct_only {
            dedup_ids(&start)
                .into_iter()
                .filter(|id| cache.contains(id))
                .collect()
        } else {
            cache.subtree_ids(&dedup_ids(&start))
        };
        let only: Option<HashSet<RecordId>> = only
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().cloned().collect());

        let mut placed = 0;
        for id in &ids {
            let content = self.placements_for(store, id, only.as_ref())?;
            if cache.set_content(id, content) {
                placed += 1;
            }
        }
        Ok(placed)
    }

    /// Create or reuse content records and reconcile their relations
    ///
    /// Items are processed in order; a failure stops processing and leaves
    /// the writes of earlier items (and of the failing item so far) in place.
    ///
    /// # Errors
    /// * `NodesNotFound` - If an item targets nodes that do not exist
    /// * `InvalidId` - If a supplied content id is not an id
    /// * `Store` - If a write is rejected
    pub fn add_content<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        node_store: &NodeStore,
        mut cache: Option<&mut TreeCache>,
        items: Vec<ContentItem>,
    ) -> Result<Vec<ContentOutcome>> {
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            let targets = item.nodes.as_deref().map(dedup_ids);
            if let Some(targets) = &targets {
                node_store.require_all(&*store, targets)?;
            }

            let (content, created, updated) = self.find_or_create(store, &item)?;
            let content_id = self.content_id_of(&content)?;

            let current = self.related_nodes(&*store, &content_id)?;
            let (attach, detach) = match (item.relation_flag, &targets) {
                (RelationFlag::Override, Some(targets)) => (
                    missing_from(targets, &current),
                    missing_from(&current, targets),
                ),
                (RelationFlag::Append, Some(targets)) => {
                    (missing_from(targets, &current), Vec::new())
                }
                (RelationFlag::Remove, _) => (Vec::new(), current.clone()),
                _ => (Vec::new(), Vec::new()),
            };

            if !detach.is_empty() {
                let mut filter = self.relation_filter(&content_id);
                if item.relation_flag != RelationFlag::Remove {
                    filter = filter.is_in(self.node_field(), detach.iter().map(RecordId::to_value));
                }
                store.update_many(
                    &self.descriptor.relation_collection,
                    &filter,
                    &deleted_patch(),
                )?;
            }
            for node_id in &attach {
                let mut relation = Record::new();
                relation.insert(self.content_field().to_string(), content_id.to_value());
                relation.insert(self.node_field().to_string(), node_id.to_value());
                relation.insert(DELETED_FIELD.to_string(), Value::Bool(false));
                store.create(&self.descriptor.relation_collection, relation)?;
            }

            tracing::debug!(
                content_id = %content_id,
                flag = %item.relation_flag,
                attached = attach.len(),
                detached = detach.len(),
                "content relations reconciled"
            );

            if let Some(cache) = cache.as_deref_mut() {
                let mut touched = targets.unwrap_or_default();
                touched.extend(current);
                let touched = dedup_ids(&touched);
                self.place_content(&*store, cache, Some(touched.as_slice()), None, true)?;
            }

            outcomes.push(ContentOutcome {
                content_id,
                content,
                created,
                updated,
                attached: attach,
                detached: detach,
            });
        }

        Ok(outcomes)
    }

    fn find_or_create<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        item: &ContentItem,
    ) -> Result<(Record, bool, bool)> {
        let id_field = self.descriptor.content_id_field.as_str();
        let collection = self.descriptor.content_collection.as_str();

        let supplied = match item.data.get(id_field) {
            None | Some(Value::Null) => None,
            Some(v) => Some(RecordId::from_value(v)?),
        };

        if let Some(id) = &supplied {
            let by_id = Filter::active().eq(id_field, id.to_value());
            if let Some(existing) = store.find_one(collection, &by_id)? {
                if !item.update {
                    return Ok((existing, false, false));
                }
                let mut patch = item.data.clone();
                patch.remove(id_field);
                if !patch.is_empty() {
                    store.update_many(collection, &by_id, &patch)?;
                }
                let refreshed = store.find_one(collection, &by_id)?.unwrap_or(existing);
                return Ok((refreshed, false, true));
            }
        }

        let mut data = item.data.clone();
        if let Some(id) = &supplied {
            data.insert(id_field.to_string(), id.to_value());
        }
        data.insert(DELETED_FIELD.to_string(), Value::Bool(false));
        Ok((store.create(collection, data)?, true, false))
    }

    /// Soft-delete content relations and drop them from cached nodes
    ///
    /// * nodes only: every relation at those nodes; their cached content is emptied
    /// * content and nodes: that item's relations at exactly those nodes
    /// * content only: that item's relations everywhere
    ///
    /// Returns the number of relation records soft-deleted.
    ///
    /// # Errors
    /// * `InvalidInput` - If neither a content id nor node ids are given
    /// * `NodesNotFound` - If a listed node does not exist (content and nodes mode)
    pub fn delete_content_relations<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        node_store: &NodeStore,
        mut cache: Option<&mut TreeCache>,
        content_id: Option<&RecordId>,
        node_ids: Option<&[RecordId]>,
    ) -> Result<usize> {
        let relations = self.descriptor.relation_collection.as_str();

        match (content_id, node_ids) {
            (None, Some(node_ids)) => {
                let node_ids = dedup_ids(node_ids);
                let filter = Filter::active()
                    .is_in(self.node_field(), node_ids.iter().map(RecordId::to_value));
                let removed = store.update_many(relations, &filter, &deleted_patch())?;
                if let Some(cache) = cache.as_deref_mut() {
                    for id in &node_ids {
                        cache.clear_content(id);
                    }
                }
                Ok(removed)
            }
            (Some(content_id), Some(node_ids)) => {
                let nodes: Vec<RecordId> = node_store
                    .require_all(&*store, node_ids)?
                    .into_iter()
                    .map(|n| n.id)
                    .collect();
                let current = self.related_nodes(&*store, content_id)?;

                let unrelated = missing_from(&nodes, &current);
                if !unrelated.is_empty() {
                    tracing::warn!(
                        content_id = %content_id,
                        collection = relations,
                        unrelated = ?id_strings(&unrelated),
                        "some relations requested for deletion do not exist"
                    );
                }

                let existing: Vec<RecordId> = nodes
                    .into_iter()
                    .filter(|id| current.contains(id))
                    .collect();
                if existing.is_empty() {
                    return Ok(0);
                }

                let filter = self
                    .relation_filter(content_id)
                    .is_in(self.node_field(), existing.iter().map(RecordId::to_value));
                let removed = store.update_many(relations, &filter, &deleted_patch())?;
                if let Some(cache) = cache.as_deref_mut() {
                    for id in &existing {
                        cache.remove_content_from(id, content_id);
                    }
                }
                Ok(removed)
            }
            (Some(content_id), None) => {
                let removed = store.update_many(
                    relations,
                    &self.relation_filter(content_id),
                    &deleted_patch(),
                )?;
                if let Some(cache) = cache.as_deref_mut() {
                    cache.remove_content_everywhere(content_id);
                }
                Ok(removed)
            }
            (None, None) => Err(GroveError::InvalidInput {
                reason: "a content id, node ids or both must be provided".to_string(),
            }),
        }
    }

    /// Content items with no active relation, alongside all active items
    ///
    /// Every returned record carries its active relations under the
    /// configured relations field.
    ///
    /// # Errors
    /// Propagates record store failures.
    pub fn get_content_with_no_relations<S: RecordStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<(Vec<Record>, Vec<Record>)> {
        let mut by_content: HashMap<RecordId, Vec<Value>> = HashMap::new();
        for relation in store.find_many(&self.descriptor.relation_collection, &Filter::active())? {
            let content_id = self.field_id(
                &relation,
                self.content_field(),
                &self.descriptor.relation_collection,
            )?;
            by_content
                .entry(content_id)
                .or_default()
                .push(Value::Object(relation));
        }

        let mut all = Vec::new();
        let mut orphans = Vec::new();
        for mut record in store.find_many(&self.descriptor.content_collection, &Filter::active())? {
            let relations = by_content
                .remove(&self.content_id_of(&record)?)
                .unwrap_or_default();
            let orphan = relations.is_empty();
            record.insert(
                self.descriptor.content_relations_field.clone(),
                Value::Array(relations),
            );
            if orphan {
                orphans.push(record.clone());
            }
            all.push(record);
        }
        Ok((orphans, all))
    }

    /// Active relations of one content item, each with its node embedded
    ///
    /// # Errors
    /// Propagates record store failures.
    pub fn relations_of<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        node_store: &NodeStore,
        content_id: &RecordId,
    ) -> Result<Vec<Record>> {
        let relations = store.find_many(
            &self.descriptor.relation_collection,
            &self.relation_filter(content_id),
        )?;
        let mut out = Vec::with_capacity(relations.len());
        for mut relation in relations {
            let node_id = self.field_id(
                &relation,
                self.node_field(),
                &self.descriptor.relation_collection,
            )?;
            let node = store
                .find_one(node_store.collection(), &node_store.id_filter(&node_id))?
                .map(Value::Object)
                .unwrap_or(Value::Null);
            relation.insert(self.descriptor.relation_to_node_link_field.clone(), node);
            out.push(relation);
        }
        Ok(out)
    }
}

/// Ids of `from` absent in `other`, keeping `from` order
fn missing_from(from: &[RecordId], other: &[RecordId]) -> Vec<RecordId> {
    from.iter().filter(|id| !other.contains(id)).cloned().collect()
}

fn deleted_patch() -> Record {
    let mut patch = Record::new();
    patch.insert(DELETED_FIELD.to_string(), Value::Bool(true));
    patch
}
