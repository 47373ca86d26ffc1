//! In-process DocumentStore
//!
//! `MemoryStore` keeps every collection in memory behind one `RwLock`. Each
//! trait method completes under a single guard, which gives it the same
//! per-call atomicity the remote store provides server-side: concurrent
//! `atomic_increment` calls on one field never observe the same value.
//!
//! Besides tests and benches, embedders use it as a local cache-less store.

use super::document_store::{Collection, Document, DocumentStore, Filter, FindOptions};
use super::error::StoreError;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

/// Documents of one collection, kept in insertion order
#[derive(Debug, Default)]
struct CollectionData {
    next_seq: u64,
    by_seq: BTreeMap<u64, Document>,
    index: HashMap<String, u64>,
}

impl CollectionData {
    fn get(&self, id: &str) -> Option<&Document> {
        self.index.get(id).and_then(|seq| self.by_seq.get(seq))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        match self.index.get(id) {
            Some(seq) => self.by_seq.get_mut(seq),
            None => None,
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.index.remove(id) {
            Some(seq) => self.by_seq.remove(&seq).is_some(),
            None => false,
        }
    }
}

/// Order two JSON values for sorting: null < bool < number < string
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn document_id(collection: Collection, document: &Document) -> Result<String, StoreError> {
    document
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })
}

/// Integer value of a counter field; missing and `null` count as 0
fn counter_value(
    collection: Collection,
    id: &str,
    field: &str,
    document: &Document,
) -> Result<i64, StoreError> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| StoreError::not_numeric(collection.as_str(), id, field)),
    }
}

/// Thread-safe in-memory document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, CollectionData>>,
    mutations: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls that changed stored data
    ///
    /// Read-only operations never move this counter, which makes it a cheap
    /// way to assert that a code path performed no writes.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(AtomicOrdering::SeqCst)
    }

    /// All documents of a collection in insertion order
    pub async fn snapshot(&self, collection: Collection) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections
            .get(&collection)
            .map(|data| data.by_seq.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        let collections = self.collections.read().await;
        collections
            .get(&collection)
            .map(|data| data.index.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection).await == 0
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        let Some(data) = collections.get(&collection) else {
            return Ok(None);
        };

        // Point lookups by id skip the scan
        if let [(field, Value::String(id))] = filter.conditions() {
            if field == "id" {
                return Ok(data.get(id).cloned());
            }
        }

        Ok(data.by_seq.values().find(|doc| filter.matches(doc)).cloned())
    }

    async fn find_all(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(data) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<Document> = data
            .by_seq
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();

        if let Some(sort) = &options.sort {
            docs.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&sort.field).unwrap_or(&Value::Null),
                    b.get(&sort.field).unwrap_or(&Value::Null),
                );
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = options.limit {
            docs.truncate(limit);
        }

        Ok(docs)
    }

    async fn atomic_increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<Value>> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|data| data.get_mut(id))
        else {
            return Ok(None);
        };

        let current = counter_value(collection, id, field, doc)?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::overflow(collection.as_str(), id, field))?;
        doc.insert(field.to_string(), Value::from(next));
        self.record_mutation();

        Ok(Some(Value::from(next)))
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(&collection)
            .map(|data| data.remove(id))
            .unwrap_or(false);
        if removed {
            self.record_mutation();
        }
        Ok(removed)
    }

    async fn remove_child(
        &self,
        collection: Collection,
        parent_field: &str,
        parent_id: &str,
        child_id: &str,
    ) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(data) = collections.get_mut(&collection) else {
            return Ok(false);
        };

        let attached = data
            .get(child_id)
            .and_then(|doc| doc.get(parent_field))
            .and_then(Value::as_str)
            == Some(parent_id);
        if !attached {
            return Ok(false);
        }

        let removed = data.remove(child_id);
        if removed {
            self.record_mutation();
        }
        Ok(removed)
    }

    async fn insert(&self, collection: Collection, document: Document) -> Result<()> {
        let id = document_id(collection, &document)?;
        let mut collections = self.collections.write().await;
        let data = collections.entry(collection).or_default();

        if data.index.contains_key(&id) {
            return Err(StoreError::duplicate_id(collection.as_str(), id).into());
        }

        let seq = data.next_seq;
        data.next_seq += 1;
        data.index.insert(id, seq);
        data.by_seq.insert(seq, document);
        self.record_mutation();
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        patch: Document,
    ) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|data| data.get_mut(id))
        else {
            return Ok(false);
        };

        for (field, value) in patch {
            // The id is the lookup key and never changes
            if field == "id" {
                continue;
            }
            doc.insert(field, value);
        }
        self.record_mutation();
        Ok(true)
    }

    async fn set_if_greater(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: i64,
    ) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|data| data.get_mut(id))
        else {
            return Ok(false);
        };

        let should_write = match doc.get(field) {
            None | Some(Value::Null) => true,
            Some(current) => match current.as_i64() {
                Some(current) => current < value,
                None => return Err(StoreError::not_numeric(collection.as_str(), id, field).into()),
            },
        };

        if should_write {
            doc.insert(field.to_string(), Value::from(value));
            self.record_mutation();
        }
        Ok(should_write)
    }
}
