//! Issue Service - create, read and single-field updates
//!
//! Creation draws the issue number from the [`SequenceCounter`] and keeps the
//! parent's `childCount` in step with atomic increments. Updates are typed:
//! each [`IssueFieldUpdate`] variant has its own validation and produces its
//! own document patch.

use crate::db::{to_document, Collection, Document, DocumentStore, Filter};
use crate::models::{
    format_identifier, CatalogKind, Issue, IssueFieldUpdate, IssueRef, IssueStatus, NewIssue, Outcome, Priority,
    ProjectRef, ValidationError,
};
use crate::services::error::ServiceError;
use crate::services::impact_analyzer::ImpactAnalyzer;
use crate::services::lookup::{
    find_record, load_children, load_issue, load_project, load_project_issues,
};
use crate::services::sequence_counter::SequenceCounter;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub type IssueCreation = Outcome<Issue, IssueDraft>;
pub type IssueUpdate = Outcome<Issue, Issue>;

const CHILD_COUNT_FIELD: &str = "childCount";

/// Owner of a project-scoped catalog record
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopedRecord {
    project_id: String,
}

/// A fully validated issue that only lacks its number
///
/// Returned as the preview of a dry-run create.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDraft {
    pub project_id: String,
    pub project_prefix: String,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub priority: Priority,
    pub parent_id: Option<String>,
    pub component_id: Option<String>,
    pub milestone_id: Option<String>,
    pub labels: Vec<String>,
}

impl IssueDraft {
    fn into_issue(self, number: i64) -> Issue {
        let now = Utc::now();
        Issue {
            id: Uuid::new_v4().to_string(),
            identifier: format_identifier(&self.project_prefix, number),
            project_id: self.project_id,
            number,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            parent_id: self.parent_id,
            child_count: 0,
            component_id: self.component_id,
            milestone_id: self.milestone_id,
            labels: self.labels,
            created_at: now,
            modified_at: now,
        }
    }
}

pub struct IssueService {
    store: Arc<dyn DocumentStore>,
    sequence: Arc<SequenceCounter>,
    analyzer: Arc<ImpactAnalyzer>,
}

impl IssueService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sequence: Arc<SequenceCounter>,
        analyzer: Arc<ImpactAnalyzer>,
    ) -> Self {
        Self {
            store,
            sequence,
            analyzer,
        }
    }

    pub async fn get_issue(&self, issue: &IssueRef) -> Result<Issue, ServiceError> {
        load_issue(self.store.as_ref(), issue).await
    }

    /// Direct children of an issue, ordered by number
    pub async fn list_children(&self, issue: &IssueRef) -> Result<Vec<Issue>, ServiceError> {
        let parent = self.get_issue(issue).await?;
        load_children(self.store.as_ref(), &parent.id).await
    }

    /// All issues of a project, ordered by number
    pub async fn list_issues(&self, project: &ProjectRef) -> Result<Vec<Issue>, ServiceError> {
        let project = load_project(self.store.as_ref(), project).await?;
        load_project_issues(self.store.as_ref(), &project.id).await
    }

    /// Create an issue and assign it the project's next number
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed input or dangling parent/component/milestone
    /// - `NotFound` if the project does not exist
    /// - `Conflict` if the project is archived
    /// - `Sequence` if no number could be drawn
    pub async fn create_issue(&self, new_issue: NewIssue) -> Result<Issue, ServiceError> {
        let draft = self.prepare(&new_issue).await?;
        let number = self.sequence.next(&draft.project_id).await?;
        self.insert_draft(draft, number).await
    }

    /// Create, or with `dry_run` only validate and return the draft
    pub async fn create_issue_with_options(
        &self,
        new_issue: NewIssue,
        dry_run: bool,
    ) -> Result<IssueCreation, ServiceError> {
        if dry_run {
            return Ok(Outcome::DryRun(self.prepare(&new_issue).await?));
        }
        Ok(Outcome::Applied(self.create_issue(new_issue).await?))
    }

    /// Validate an issue against the store without writing anything
    pub async fn prepare(&self, new_issue: &NewIssue) -> Result<IssueDraft, ServiceError> {
        new_issue.validate()?;

        let store = self.store.as_ref();
        let project = load_project(store, &new_issue.project).await?;
        if project.archived {
            return Err(ServiceError::conflict(format!(
                "project {} is archived",
                project.prefix
            )));
        }

        let parent_id = match &new_issue.parent {
            Some(parent) => Some(self.resolve_parent(parent, &project.id).await?.id),
            None => None,
        };
        if let Some(component_id) = &new_issue.component_id {
            self.check_catalog_ref(CatalogKind::Component, component_id, &project.id)
                .await?;
        }
        if let Some(milestone_id) = &new_issue.milestone_id {
            self.check_catalog_ref(CatalogKind::Milestone, milestone_id, &project.id)
                .await?;
        }

        Ok(IssueDraft {
            project_id: project.id,
            project_prefix: project.prefix,
            title: new_issue.title.trim().to_string(),
            description: new_issue.description.clone(),
            status: new_issue.status,
            priority: new_issue.priority,
            parent_id,
            component_id: new_issue.component_id.clone(),
            milestone_id: new_issue.milestone_id.clone(),
            labels: new_issue.labels.clone(),
        })
    }

    /// Persist a validated draft under an already reserved number
    pub(crate) async fn insert_draft(
        &self,
        draft: IssueDraft,
        number: i64,
    ) -> Result<Issue, ServiceError> {
        let issue = draft.into_issue(number);
        let doc = to_document(&issue).map_err(|e| ServiceError::store("issue encode", e))?;
        self.store
            .insert(Collection::Issues, doc)
            .await
            .map_err(|e| ServiceError::store("issue insert", e))?;

        if let Some(parent_id) = &issue.parent_id {
            self.adjust_child_count(parent_id, 1).await;
        }

        tracing::info!(
            issue_id = %issue.id,
            identifier = %issue.identifier,
            "Created issue"
        );
        Ok(issue)
    }

    /// Apply one typed field update
    ///
    /// With `dry_run` the would-be issue is returned and nothing is written.
    pub async fn update_issue(
        &self,
        issue: &IssueRef,
        update: IssueFieldUpdate,
        dry_run: bool,
    ) -> Result<IssueUpdate, ServiceError> {
        update.validate()?;
        let current = self.get_issue(issue).await?;
        let (updated, mut patch) = self.plan_update(&current, update).await?;

        if dry_run {
            return Ok(Outcome::DryRun(updated));
        }

        patch.insert(
            "modifiedAt".to_string(),
            serde_json::to_value(updated.modified_at)
                .map_err(|e| ServiceError::operation_failed(e.to_string()))?,
        );
        let found = self
            .store
            .update_fields(Collection::Issues, &current.id, patch)
            .await
            .map_err(|e| ServiceError::store("issue update", e))?;
        if !found {
            return Err(ServiceError::not_found("Issue", &current.identifier));
        }

        if current.parent_id != updated.parent_id {
            if let Some(new_parent) = &updated.parent_id {
                self.adjust_child_count(new_parent, 1).await;
            }
            if let Some(old_parent) = &current.parent_id {
                self.adjust_child_count(old_parent, -1).await;
            }
        }

        tracing::debug!(issue_id = %current.id, "Updated issue");
        Ok(Outcome::Applied(updated))
    }

    /// Per-field handlers: validate and build the document patch
    async fn plan_update(
        &self,
        current: &Issue,
        update: IssueFieldUpdate,
    ) -> Result<(Issue, Document), ServiceError> {
        let mut next = current.clone();
        let field = update.field().document_field().to_string();

        let value = match update {
            IssueFieldUpdate::Title(title) => {
                next.title = title.trim().to_string();
                Value::String(next.title.clone())
            }
            IssueFieldUpdate::Description(description) => {
                next.description = description;
                next.description.clone().map(Value::String).unwrap_or(Value::Null)
            }
            IssueFieldUpdate::Status(status) => {
                next.status = status;
                encode(&status)?
            }
            IssueFieldUpdate::Priority(priority) => {
                next.priority = priority;
                encode(&priority)?
            }
            IssueFieldUpdate::Parent(parent) => {
                next.parent_id = match parent {
                    Some(parent) => Some(self.check_reparent(current, &parent).await?),
                    None => None,
                };
                encode(&next.parent_id)?
            }
            IssueFieldUpdate::Component(component_id) => {
                if let Some(id) = &component_id {
                    self.check_catalog_ref(CatalogKind::Component, id, &current.project_id)
                        .await?;
                }
                next.component_id = component_id;
                encode(&next.component_id)?
            }
            IssueFieldUpdate::Milestone(milestone_id) => {
                if let Some(id) = &milestone_id {
                    self.check_catalog_ref(CatalogKind::Milestone, id, &current.project_id)
                        .await?;
                }
                next.milestone_id = milestone_id;
                encode(&next.milestone_id)?
            }
            IssueFieldUpdate::Labels(labels) => {
                next.labels = labels;
                encode(&next.labels)?
            }
        };
        next.modified_at = Utc::now();

        let mut patch = Document::new();
        patch.insert(field, value);
        Ok((next, patch))
    }

    /// Resolve a new parent; rejects self, descendants and other projects
    async fn check_reparent(
        &self,
        issue: &Issue,
        parent: &IssueRef,
    ) -> Result<String, ServiceError> {
        let parent = self.resolve_parent(parent, &issue.project_id).await?;
        if parent.id == issue.id {
            return Err(ValidationError::InvalidParent(format!(
                "{} cannot be its own parent",
                issue.identifier
            ))
            .into());
        }

        let subtree = self.analyzer.subtree(issue).await?;
        if subtree.nodes.iter().any(|n| n.issue.id == parent.id) {
            return Err(ValidationError::InvalidParent(format!(
                "{} is a sub-issue of {}",
                parent.identifier, issue.identifier
            ))
            .into());
        }

        Ok(parent.id)
    }

    async fn resolve_parent(
        &self,
        parent: &IssueRef,
        project_id: &str,
    ) -> Result<Issue, ServiceError> {
        let parent = match load_issue(self.store.as_ref(), parent).await {
            Ok(parent) => parent,
            Err(e) if e.is_not_found() => {
                return Err(
                    ValidationError::InvalidParent(format!("parent {} not found", parent)).into(),
                );
            }
            Err(e) => return Err(e),
        };

        if parent.project_id != project_id {
            return Err(ValidationError::InvalidParent(format!(
                "parent {} belongs to another project",
                parent.identifier
            ))
            .into());
        }
        Ok(parent)
    }

    async fn check_catalog_ref(
        &self,
        kind: CatalogKind,
        id: &str,
        project_id: &str,
    ) -> Result<(), ServiceError> {
        let record: Option<ScopedRecord> =
            find_record(self.store.as_ref(), Collection::from(kind), &Filter::by_id(id)).await?;

        match record {
            Some(record) if record.project_id == project_id => Ok(()),
            Some(_) => Err(ValidationError::InvalidReference(format!(
                "{} {} belongs to another project",
                kind, id
            ))
            .into()),
            None => {
                Err(ValidationError::InvalidReference(format!("{} {} not found", kind, id)).into())
            }
        }
    }

    async fn adjust_child_count(&self, parent_id: &str, delta: i64) {
        match self
            .store
            .atomic_increment(Collection::Issues, parent_id, CHILD_COUNT_FIELD, delta)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(parent_id, delta, "Parent vanished before counter update"),
            Err(e) => tracing::warn!(parent_id, delta, "Failed to update child counter: {:#}", e),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::operation_failed(e.to_string()))
}

#[cfg(test)]
#[path = "issue_service_test.rs"]
mod issue_service_test;
