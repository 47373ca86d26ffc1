//! Store Error Types
//!
//! Errors raised by store implementations. The `DocumentStore` trait itself
//! returns `anyhow::Result`, so these travel wrapped and callers can
//! `downcast_ref::<StoreError>()` when they need the specific case.

use thiserror::Error;

/// Document store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Insert with an id that already exists in the collection
    #[error("Duplicate document id '{id}' in {collection}")]
    DuplicateId { collection: String, id: String },

    /// Document without a string `id` field
    #[error("Document in {collection} has no string 'id' field")]
    MissingId { collection: String },

    /// Counter mutation on a field that does not hold an integer
    #[error("Field '{field}' of {collection}/{id} is not an integer")]
    NotNumeric {
        collection: String,
        id: String,
        field: String,
    },

    /// Counter mutation would overflow
    #[error("Counter overflow on field '{field}' of {collection}/{id}")]
    Overflow {
        collection: String,
        id: String,
        field: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a duplicate id error
    pub fn duplicate_id(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a not-numeric error
    pub fn not_numeric(
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::NotNumeric {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
        }
    }

    /// Create an overflow error
    pub fn overflow(
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::Overflow {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
        }
    }
}
