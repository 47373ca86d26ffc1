//! DocumentStore Trait - Store Abstraction Layer
//!
//! This module defines the `DocumentStore` trait through which every service
//! reaches the backing document store. The production store is remote and
//! reached over an authenticated, retrying connection; that wrapper lives
//! outside this crate and only has to implement this trait.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async; every call is one round trip
//! 2. **Generic Documents**: Records travel as JSON objects keyed by `"id"`,
//!    typed models convert with [`to_document`] / [`from_document`]
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context
//! 4. **No Transactions**: Multi-document atomicity is not assumed; the only
//!    atomic read-modify-write is [`DocumentStore::atomic_increment`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use tracker_core::db::{Collection, DocumentStore, Filter, MemoryStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
//!
//!     let doc = json!({ "id": "p1", "sequence": 0 });
//!     store.insert(Collection::Projects, doc.as_object().unwrap().clone()).await?;
//!
//!     let next = store.atomic_increment(Collection::Projects, "p1", "sequence", 1).await?;
//!     assert_eq!(next, Some(json!(1)));
//!
//!     let found = store.find_one(Collection::Projects, &Filter::by_id("p1")).await?;
//!     assert!(found.is_some());
//!     Ok(())
//! }
//! ```

use crate::models::CatalogKind;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// A stored record: a JSON object with a string `"id"` field
pub type Document = Map<String, Value>;

/// Serialize a typed record into a document
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {}", other),
    }
}

/// Deserialize a document into a typed record
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Document collections ("kinds") known to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Projects,
    Issues,
    Components,
    Milestones,
    Templates,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Issues => "issues",
            Self::Components => "components",
            Self::Milestones => "milestones",
            Self::Templates => "templates",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CatalogKind> for Collection {
    fn from(kind: CatalogKind) -> Self {
        match kind {
            CatalogKind::Component => Self::Components,
            CatalogKind::Milestone => Self::Milestones,
        }
    }
}

/// Conjunction of field equality predicates
///
/// A missing field compares equal to `null`, so `Filter::new().eq("parentId",
/// Value::Null)` matches root issues whether or not the field was written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Empty filter, matches every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a single document by id
    pub fn by_id(id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self::new().eq("id", id)
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| document.get(field).unwrap_or(&Value::Null) == expected)
    }
}

/// Sort key for `find_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub descending: bool,
}

/// Ordering and limit for `find_all`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(SortOrder {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(SortOrder {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Abstraction over the backing document store
///
/// The first five methods are the primitives the tracker was designed
/// around (point lookup, predicate scan, atomic counter mutation, removal);
/// `insert`, `update_fields` and `set_if_greater` cover record creation,
/// sparse updates and counter healing.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; many short-lived request handlers
/// share one store handle.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return the first document matching `filter`
    ///
    /// - `Ok(Some(doc))` if a document matches
    /// - `Ok(None)` if nothing matches (not an error)
    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>>;

    /// Return every document matching `filter`, ordered and limited per `options`
    ///
    /// Without a sort key documents come back in insertion order.
    async fn find_all(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>>;

    /// Atomically add `delta` to an integer field and return the new value
    ///
    /// The read-modify-write happens inside the store in a single round trip,
    /// so concurrent callers always observe distinct results. A missing or
    /// `null` field counts as 0.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` - the post-increment value as stored
    /// - `Ok(None)` - no document with this id exists
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use tracker_core::db::{Collection, DocumentStore};
    /// # async fn example(store: &dyn DocumentStore) -> anyhow::Result<()> {
    /// // Reserve ten numbers in one round trip
    /// let last = store.atomic_increment(Collection::Projects, "p1", "sequence", 10).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn atomic_increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<Value>>;

    /// Remove a document by id
    ///
    /// Returns `false` when the document was already absent; removal is
    /// idempotent and never fails on a missing document.
    async fn remove(&self, collection: Collection, id: &str) -> Result<bool>;

    /// Remove a child document only while it is still attached to `parent_id`
    ///
    /// Returns `false` when the child is absent or `parent_field` no longer
    /// points at `parent_id`.
    async fn remove_child(
        &self,
        collection: Collection,
        parent_field: &str,
        parent_id: &str,
        child_id: &str,
    ) -> Result<bool>;

    /// Insert a new document; fails if the id already exists
    async fn insert(&self, collection: Collection, document: Document) -> Result<()>;

    /// Shallow-merge `patch` into an existing document
    ///
    /// A `null` value clears the field. Returns `false` when no document with
    /// this id exists.
    async fn update_fields(&self, collection: Collection, id: &str, patch: Document)
        -> Result<bool>;

    /// Conditionally raise an integer field to `value`
    ///
    /// Writes only when the stored value is missing, `null` or smaller than
    /// `value`; never lowers it. Returns whether a write happened.
    async fn set_if_greater(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: i64,
    ) -> Result<bool>;
}
