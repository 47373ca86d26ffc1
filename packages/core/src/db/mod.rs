//! Database Layer
//!
//! The tracker keeps its records in a remote document store. This module
//! defines the collaborator contract the services rely on and ships an
//! in-process implementation of it:
//!
//! - [`DocumentStore`] - async trait over point lookup, predicate scan,
//!   atomic counter mutation and document removal
//! - [`MemoryStore`] - lock-guarded in-process store honoring the same
//!   atomicity guarantees (tests, benches, embedded use)
//!
//! All uniqueness and ordering guarantees of the services are delegated to
//! `DocumentStore::atomic_increment`; the services hold no locks of their own.

mod document_store;
mod error;
mod memory_store;

pub use document_store::{
    from_document, to_document, Collection, Document, DocumentStore, Filter, FindOptions,
    SortOrder,
};
pub use error::StoreError;
pub use memory_store::MemoryStore;
