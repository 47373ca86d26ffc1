//! Business Services
//!
//! This module contains the tracker's business logic:
//!
//! - `SequenceCounter` - Per-project issue numbers backed by the store's atomic increment
//! - `ImpactAnalyzer` - Read-only deletion impact reports
//! - `CascadeDeleter` - Bottom-up deletes, project archiving
//! - `IssueService` - Issue creation and typed field updates
//! - `ProjectService` - Projects, components, milestones and templates
//! - `BatchOrchestrator` - Chunked bulk create/update/delete with per-item results
//!
//! `Tracker` wires all of them to one store.

pub mod batch;
pub mod cascade_deleter;
pub mod error;
pub mod impact_analyzer;
pub mod issue_service;
pub(crate) mod lookup;
pub mod project_service;
pub mod sequence_counter;

#[cfg(test)]
mod test_support;

pub use batch::{
    BatchAborted, BatchItem, BatchItemSummary, BatchOperation, BatchOptions, BatchOrchestrator,
    BatchReport, BatchSummary, IssueUpdateRequest,
};
pub use cascade_deleter::{CascadeDeleter, IssueDeletion, ProjectDeletion, ReferenceDeletion};
pub use error::{ErrorKind, ServiceError};
pub use impact_analyzer::ImpactAnalyzer;
pub use issue_service::{IssueCreation, IssueDraft, IssueService, IssueUpdate};
pub use project_service::ProjectService;
pub use sequence_counter::{SequenceCounter, SEQUENCE_FIELD};

use crate::config::CoreConfig;
use crate::db::DocumentStore;
use std::sync::Arc;

/// All services sharing one store and one sequence cache
#[derive(Clone)]
pub struct Tracker {
    pub projects: Arc<ProjectService>,
    pub issues: Arc<IssueService>,
    pub sequence: Arc<SequenceCounter>,
    pub analyzer: Arc<ImpactAnalyzer>,
    pub deleter: Arc<CascadeDeleter>,
    pub batch: Arc<BatchOrchestrator>,
}

impl Tracker {
    pub fn new(store: Arc<dyn DocumentStore>, config: CoreConfig) -> Self {
        let sequence = Arc::new(SequenceCounter::with_ttl(
            store.clone(),
            config.sequence_cache_ttl(),
        ));
        let analyzer = Arc::new(ImpactAnalyzer::new(store.clone()));
        let deleter = Arc::new(CascadeDeleter::new(
            store.clone(),
            analyzer.clone(),
            sequence.clone(),
        ));
        let issues = Arc::new(IssueService::new(
            store.clone(),
            sequence.clone(),
            analyzer.clone(),
        ));
        let batch = Arc::new(BatchOrchestrator::new(
            issues.clone(),
            deleter.clone(),
            sequence.clone(),
            config,
        ));

        Self {
            projects: Arc::new(ProjectService::new(store)),
            issues,
            sequence,
            analyzer,
            deleter,
            batch,
        }
    }

    /// Tracker with default configuration
    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self::new(store, CoreConfig::default())
    }
}
