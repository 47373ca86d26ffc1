//! Batch Orchestrator
//!
//! Applies a single-item operation across many inputs. Inputs are processed
//! in consecutive chunks of `batch_size`, one item at a time; chunking bounds
//! the load a batch puts on the store, it does not parallelise anything.
//!
//! Every item gets its own `Result`. Aggregates (`succeeded`, `failed`,
//! `success`) are always derived from that list and never tracked on the
//! side. Only caller-level preconditions (empty input, bad batch size) fail
//! the call as a whole.

use crate::config::CoreConfig;
use crate::models::{DeleteOptions, IssueFieldUpdate, IssueRef, NewIssue, Outcome};
use crate::services::cascade_deleter::{CascadeDeleter, IssueDeletion};
use crate::services::error::{ErrorKind, ServiceError};
use crate::services::issue_service::{IssueCreation, IssueDraft, IssueService, IssueUpdate};
use crate::services::sequence_counter::SequenceCounter;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Per-call batch options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub continue_on_error: bool,
    pub dry_run: bool,
}

impl BatchOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            continue_on_error: config.continue_on_error,
            dry_run: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn stop_on_error(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

/// A single-item operation the orchestrator can drive
///
/// `prepare_chunk` runs once per chunk before any item of it is applied and
/// may do shared work (such as reserving numbers); its state is then handed
/// to every `apply` call of that chunk, in input order.
#[async_trait]
pub trait BatchOperation: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;
    type ChunkState: Send;

    async fn prepare_chunk(&self, chunk: &[Self::Input], dry_run: bool) -> Self::ChunkState;

    async fn apply(
        &self,
        input: &Self::Input,
        state: &mut Self::ChunkState,
        dry_run: bool,
    ) -> Result<Self::Output, ServiceError>;
}

/// One processed input and what happened to it
#[derive(Debug)]
pub struct BatchItem<I, T> {
    pub index: usize,
    pub input: I,
    pub outcome: Result<T, ServiceError>,
}

impl<I, T> BatchItem<I, T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-item results of a batch call
#[derive(Debug)]
pub struct BatchReport<I, T> {
    pub results: Vec<BatchItem<I, T>>,
    pub total_requested: usize,
    pub batch_size: usize,
    pub continue_on_error: bool,
    pub dry_run: bool,

    /// Index of the failing item when processing stopped early
    pub aborted: Option<usize>,
}

/// Item-level view of a batch result, for the transport layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemSummary {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success: bool,
    pub total_requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
    pub dry_run: bool,
    pub items: Vec<BatchItemSummary>,
}

/// A stop-on-error batch that hit a failing item
#[derive(Debug)]
pub struct BatchAborted<I, T> {
    pub index: usize,
    pub input: I,
    pub error: ServiceError,

    /// Items processed before the failure; their effects stay in place
    pub completed: Vec<BatchItem<I, T>>,
}

impl<I, T> BatchReport<I, T> {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn batches(&self) -> usize {
        self.total_requested.div_ceil(self.batch_size.max(1))
    }

    /// True when nothing failed, or when every item was attempted under
    /// `continue_on_error`
    pub fn success(&self) -> bool {
        self.failed() == 0 || (self.continue_on_error && self.aborted.is_none())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = (usize, &ServiceError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.index, e)))
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            success: self.success(),
            total_requested: self.total_requested,
            succeeded: self.succeeded(),
            failed: self.failed(),
            batches: self.batches(),
            dry_run: self.dry_run,
            items: self
                .results
                .iter()
                .map(|r| BatchItemSummary {
                    index: r.index,
                    success: r.is_success(),
                    error: r.outcome.as_ref().err().map(|e| e.to_string()),
                    error_kind: r.outcome.as_ref().err().map(ServiceError::kind),
                })
                .collect(),
        }
    }

    /// Surface an early stop as an error carrying the failing item
    pub fn into_result(mut self) -> Result<Self, BatchAborted<I, T>> {
        if self.aborted.is_none() {
            return Ok(self);
        }

        // An aborted run always ends with the failing item
        match self.results.pop() {
            Some(BatchItem {
                index,
                input,
                outcome: Err(error),
            }) => Err(BatchAborted {
                index,
                input,
                error,
                completed: self.results,
            }),
            Some(item) => {
                self.results.push(item);
                Ok(self)
            }
            None => Ok(self),
        }
    }
}

/// Input of one bulk update item
#[derive(Debug, Clone, PartialEq)]
pub struct IssueUpdateRequest {
    pub issue: IssueRef,
    pub update: IssueFieldUpdate,
}

impl IssueUpdateRequest {
    pub fn new(issue: impl Into<IssueRef>, update: IssueFieldUpdate) -> Self {
        Self {
            issue: issue.into(),
            update,
        }
    }
}

/// Drafts of one chunk with their reserved numbers, in input order
type PreparedDrafts = VecDeque<Result<(IssueDraft, Option<i64>), ServiceError>>;

struct CreateIssues<'a> {
    issues: &'a IssueService,
    sequence: &'a SequenceCounter,
}

#[async_trait]
impl<'a> BatchOperation for CreateIssues<'a> {
    type Input = NewIssue;
    type Output = IssueCreation;
    type ChunkState = PreparedDrafts;

    /// Validates every item, then reserves numbers with one `reserve_batch`
    /// call per project present in the chunk
    async fn prepare_chunk(&self, chunk: &[NewIssue], dry_run: bool) -> PreparedDrafts {
        let mut drafts = Vec::with_capacity(chunk.len());
        for input in chunk {
            drafts.push(self.issues.prepare(input).await);
        }

        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (position, draft) in drafts.iter().enumerate() {
            if let Ok(draft) = draft {
                match groups.iter_mut().find(|(id, _)| *id == draft.project_id) {
                    Some((_, members)) => members.push(position),
                    None => groups.push((draft.project_id.clone(), vec![position])),
                }
            }
        }

        let mut numbers: Vec<Result<Option<i64>, ServiceError>> = vec![Ok(None); drafts.len()];
        if !dry_run {
            for (project_id, members) in &groups {
                match self.sequence.reserve_batch(project_id, members.len()).await {
                    Ok(reserved) => {
                        for (position, number) in members.iter().zip(reserved) {
                            numbers[*position] = Ok(Some(number));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(project_id = %project_id, "Number reservation failed: {}", e);
                        for position in members {
                            numbers[*position] = Err(e.clone());
                        }
                    }
                }
            }
        }

        drafts
            .into_iter()
            .zip(numbers)
            .map(
                |(draft, number)| -> Result<(IssueDraft, Option<i64>), ServiceError> {
                    Ok((draft?, number?))
                },
            )
            .collect()
    }

    async fn apply(
        &self,
        _input: &NewIssue,
        state: &mut PreparedDrafts,
        dry_run: bool,
    ) -> Result<IssueCreation, ServiceError> {
        match state.pop_front() {
            Some(Ok((draft, _))) if dry_run => Ok(Outcome::DryRun(draft)),
            Some(Ok((draft, Some(number)))) => {
                Ok(Outcome::Applied(self.issues.insert_draft(draft, number).await?))
            }
            Some(Ok((draft, None))) => Err(ServiceError::sequence(
                draft.project_id,
                "no number was reserved for this item",
            )),
            Some(Err(e)) => Err(e),
            None => Err(ServiceError::operation_failed(
                "chunk state exhausted before every item was applied",
            )),
        }
    }
}

struct UpdateIssues<'a> {
    issues: &'a IssueService,
}

#[async_trait]
impl<'a> BatchOperation for UpdateIssues<'a> {
    type Input = IssueUpdateRequest;
    type Output = IssueUpdate;
    type ChunkState = ();

    async fn prepare_chunk(&self, _chunk: &[IssueUpdateRequest], _dry_run: bool) {}

    async fn apply(
        &self,
        input: &IssueUpdateRequest,
        _state: &mut (),
        dry_run: bool,
    ) -> Result<IssueUpdate, ServiceError> {
        self.issues
            .update_issue(&input.issue, input.update.clone(), dry_run)
            .await
    }
}

struct DeleteIssues<'a> {
    deleter: &'a CascadeDeleter,
    options: DeleteOptions,
}

#[async_trait]
impl<'a> BatchOperation for DeleteIssues<'a> {
    type Input = IssueRef;
    type Output = IssueDeletion;
    type ChunkState = ();

    async fn prepare_chunk(&self, _chunk: &[IssueRef], _dry_run: bool) {}

    async fn apply(
        &self,
        input: &IssueRef,
        _state: &mut (),
        dry_run: bool,
    ) -> Result<IssueDeletion, ServiceError> {
        let mut options = self.options;
        options.dry_run |= dry_run;
        self.deleter.delete_issue(input, options).await
    }
}

/// Chunked, failure-isolating bulk operations
pub struct BatchOrchestrator {
    issues: Arc<IssueService>,
    deleter: Arc<CascadeDeleter>,
    sequence: Arc<SequenceCounter>,
    config: CoreConfig,
}

impl BatchOrchestrator {
    pub fn new(
        issues: Arc<IssueService>,
        deleter: Arc<CascadeDeleter>,
        sequence: Arc<SequenceCounter>,
        config: CoreConfig,
    ) -> Self {
        Self {
            issues,
            deleter,
            sequence,
            config,
        }
    }

    /// Options seeded from the configured defaults
    pub fn options(&self) -> BatchOptions {
        BatchOptions::from_config(&self.config)
    }

    /// Drive any [`BatchOperation`] over `inputs`
    ///
    /// # Errors
    ///
    /// `InvalidBatch` for an empty input list or a batch size outside
    /// `1..=max_batch_size`. Item failures never fail the call.
    pub async fn run<O: BatchOperation>(
        &self,
        operation: &O,
        inputs: Vec<O::Input>,
        options: BatchOptions,
    ) -> Result<BatchReport<O::Input, O::Output>, ServiceError> {
        if inputs.is_empty() {
            return Err(ServiceError::invalid_batch("no items given"));
        }
        if options.batch_size == 0 || options.batch_size > self.config.max_batch_size {
            return Err(ServiceError::invalid_batch(format!(
                "batch size must be between 1 and {}, got {}",
                self.config.max_batch_size, options.batch_size
            )));
        }

        let total_requested = inputs.len();
        let mut results = Vec::with_capacity(total_requested);
        let mut aborted = None;
        let mut pending = inputs.into_iter();
        let mut index = 0;

        'chunks: loop {
            let chunk: Vec<O::Input> = pending.by_ref().take(options.batch_size).collect();
            if chunk.is_empty() {
                break;
            }

            tracing::debug!(first = index, size = chunk.len(), "Processing batch chunk");
            let mut state = operation.prepare_chunk(&chunk, options.dry_run).await;

            for input in chunk {
                let outcome = operation.apply(&input, &mut state, options.dry_run).await;
                let failed = outcome.is_err();
                results.push(BatchItem {
                    index,
                    input,
                    outcome,
                });

                if failed && !options.continue_on_error {
                    aborted = Some(index);
                    break 'chunks;
                }
                index += 1;
            }
        }

        let report = BatchReport {
            results,
            total_requested,
            batch_size: options.batch_size,
            continue_on_error: options.continue_on_error,
            dry_run: options.dry_run,
            aborted,
        };

        tracing::info!(
            total = report.total_requested,
            succeeded = report.succeeded(),
            failed = report.failed(),
            batches = report.batches(),
            aborted = ?report.aborted,
            dry_run = options.dry_run,
            "Batch completed"
        );
        Ok(report)
    }

    /// Bulk issue creation; numbers are reserved once per project per chunk
    pub async fn create_issues(
        &self,
        inputs: Vec<NewIssue>,
        options: BatchOptions,
    ) -> Result<BatchReport<NewIssue, IssueCreation>, ServiceError> {
        let operation = CreateIssues {
            issues: &self.issues,
            sequence: &self.sequence,
        };
        self.run(&operation, inputs, options).await
    }

    pub async fn update_issues(
        &self,
        inputs: Vec<IssueUpdateRequest>,
        options: BatchOptions,
    ) -> Result<BatchReport<IssueUpdateRequest, IssueUpdate>, ServiceError> {
        let operation = UpdateIssues {
            issues: &self.issues,
        };
        self.run(&operation, inputs, options).await
    }

    /// Bulk delete; `delete` applies to every item and a dry run of either
    /// kind turns every item into an impact report
    pub async fn delete_issues(
        &self,
        inputs: Vec<IssueRef>,
        delete: DeleteOptions,
        options: BatchOptions,
    ) -> Result<BatchReport<IssueRef, IssueDeletion>, ServiceError> {
        let operation = DeleteIssues {
            deleter: &self.deleter,
            options: delete,
        };
        let options = BatchOptions {
            dry_run: options.dry_run || delete.dry_run,
            ..options
        };
        self.run(&operation, inputs, options).await
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
