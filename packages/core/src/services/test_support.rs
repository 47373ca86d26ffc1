//! Shared fixtures for service tests

use crate::db::{Collection, Document, DocumentStore, Filter, FindOptions, MemoryStore};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// `MemoryStore` wrapper that fails selected operations on demand
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    failing_removals: Mutex<HashSet<String>>,
    increment_override: Mutex<Option<Value>>,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every removal of `id` fail with a store error
    pub fn fail_removal_of(&self, id: &str) {
        self.failing_removals.lock().unwrap().insert(id.to_string());
    }

    /// Make `atomic_increment` return `value` without touching the document
    pub fn override_increment(&self, value: Value) {
        *self.increment_override.lock().unwrap() = Some(value);
    }

    fn removal_fails(&self, id: &str) -> bool {
        self.failing_removals.lock().unwrap().contains(id)
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        self.inner.find_one(collection, filter).await
    }

    async fn find_all(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        self.inner.find_all(collection, filter, options).await
    }

    async fn atomic_increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<Value>> {
        let forced = self.increment_override.lock().unwrap().clone();
        match forced {
            Some(value) => Ok(Some(value)),
            None => self.inner.atomic_increment(collection, id, field, delta).await,
        }
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        if self.removal_fails(id) {
            anyhow::bail!("connection reset while removing {}", id);
        }
        self.inner.remove(collection, id).await
    }

    async fn remove_child(
        &self,
        collection: Collection,
        parent_field: &str,
        parent_id: &str,
        child_id: &str,
    ) -> Result<bool> {
        if self.removal_fails(child_id) {
            anyhow::bail!("connection reset while removing {}", child_id);
        }
        self.inner
            .remove_child(collection, parent_field, parent_id, child_id)
            .await
    }

    async fn insert(&self, collection: Collection, document: Document) -> Result<()> {
        self.inner.insert(collection, document).await
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        patch: Document,
    ) -> Result<bool> {
        self.inner.update_fields(collection, id, patch).await
    }

    async fn set_if_greater(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: i64,
    ) -> Result<bool> {
        self.inner.set_if_greater(collection, id, field, value).await
    }
}

/// Build a document from a `json!` object literal
pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}

/// Raw project document, bypassing `ProjectService` validation
pub fn project_doc(id: &str, prefix: &str, sequence: Option<i64>) -> Document {
    let mut project = doc(json!({
        "id": id,
        "name": format!("{} project", prefix),
        "prefix": prefix,
        "archived": false,
        "createdAt": "2024-01-01T00:00:00Z",
    }));
    if let Some(sequence) = sequence {
        project.insert("sequence".to_string(), json!(sequence));
    }
    project
}

/// Raw issue document, for seeding trees the services would refuse to build
pub fn issue_doc(
    id: &str,
    project_id: &str,
    identifier: &str,
    number: i64,
    parent_id: Option<&str>,
    child_count: i64,
) -> Document {
    doc(json!({
        "id": id,
        "projectId": project_id,
        "number": number,
        "identifier": identifier,
        "title": format!("Issue {}", identifier),
        "status": "todo",
        "priority": "none",
        "parentId": parent_id,
        "childCount": child_count,
        "componentId": null,
        "milestoneId": null,
        "labels": [],
        "createdAt": "2024-01-01T00:00:00Z",
        "modifiedAt": "2024-01-01T00:00:00Z",
    }))
}
