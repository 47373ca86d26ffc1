//! Tracker Core Business Logic Layer
//!
//! This crate provides the consistency-critical parts of an issue tracker that
//! keeps its records in a remote document store:
//!
//! - Collision-free, monotonically increasing issue numbers under concurrent writers
//! - Deletion impact analysis ("dry run") and cascading, bottom-up deletes
//! - Batch create/update/delete with per-item failure isolation
//!
//! # Modules
//!
//! - [`models`] - Data structures (Project, Issue, Component, impact reports)
//! - [`db`] - The `DocumentStore` abstraction and an in-process implementation
//! - [`services`] - Sequence counter, impact analyzer, cascade deleter, batch orchestrator
//! - [`config`] - Runtime configuration
//! - [`logging`] - Tracing subscriber bootstrap

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::CoreConfig;
pub use models::*;
pub use services::*;
