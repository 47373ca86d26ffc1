//! Service Layer Error Types
//!
//! This module defines the error taxonomy surfaced by every tracker
//! operation. Deletion blockers are not errors: they travel inside impact
//! reports so a caller can show them before deciding to force.

use crate::models::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a `ServiceError`, used in batch summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Sequence,
    Validation,
    OperationFailed,
}

/// Service operation errors
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Target entity does not exist
    #[error("{entity} not found: {reference}")]
    NotFound { entity: String, reference: String },

    /// Blocking dependents present and neither cascade nor force requested,
    /// or the entity is already in the requested state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The atomic counter mutation did not return a usable value
    #[error("Sequence error for project {project_id}: {reason}")]
    Sequence { project_id: String, reason: String },

    /// Malformed input
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Store-level failure (connectivity, serialization, constraint)
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A cascading delete stopped partway; nothing is rolled back
    #[error(
        "Cascade delete of {target_id} incomplete: {} removed, {} failed, {} not attempted",
        .removed.len(),
        .failed.len(),
        .not_attempted.len()
    )]
    CascadeIncomplete {
        target_id: String,
        removed: Vec<String>,
        failed: Vec<(String, String)>,
        not_attempted: Vec<String>,
    },

    /// Caller-level batch precondition failed (empty input, bad batch size)
    #[error("Invalid batch request: {0}")]
    InvalidBatch(String),
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, reference: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            reference: reference.to_string(),
        }
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a sequence error
    pub fn sequence(project_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Sequence {
            project_id: project_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an operation failed error
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Create an invalid batch error
    pub fn invalid_batch(msg: impl Into<String>) -> Self {
        Self::InvalidBatch(msg.into())
    }

    /// Wrap a store error with the operation that failed
    pub fn store(context: &str, err: anyhow::Error) -> Self {
        Self::OperationFailed(format!("{}: {:#}", context, err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Sequence { .. } => ErrorKind::Sequence,
            Self::Validation(_) | Self::InvalidBatch(_) => ErrorKind::Validation,
            Self::OperationFailed(_) | Self::CascadeIncomplete { .. } => {
                ErrorKind::OperationFailed
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
