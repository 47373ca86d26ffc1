//! Data Models
//!
//! This module contains the core data structures used throughout the tracker:
//!
//! - `Project` - Owner of the issue number sequence and identifier prefix
//! - `Issue` - Hierarchical, identifier-bearing record
//! - `Component` / `Milestone` / `Template` - Project-scoped catalog entries
//! - Deletion impact reports and dry-run outcomes
//!
//! All records are persisted as camelCase JSON documents in the backing
//! document store.

mod catalog;
mod impact;
mod issue;
mod outcome;
mod project;
mod validation;

pub use catalog::{CatalogKind, Component, Milestone, Template};
pub use impact::{
    DeleteOptions, ImpactNode, IssueDeletionImpact, IssueDeletionReport, ProjectDeletionImpact,
    ProjectDeletionReport, ReferenceDeletionImpact, ReferenceDeletionReport,
};
pub use issue::{
    Issue, IssueField, IssueFieldUpdate, IssueRef, IssueStatus, NewIssue, Priority,
};
pub use outcome::Outcome;
pub use project::{format_identifier, validate_prefix, Project, ProjectRef};
pub use validation::ValidationError;
