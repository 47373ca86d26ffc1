//! Cascading Deleter
//!
//! Executes deletion plans produced by the [`ImpactAnalyzer`] bottom-up.
//!
//! # Failure Semantics
//!
//! The store offers no multi-document transactions. Each removal is one
//! store call; when a removal fails partway through a cascade, the deleter
//! stops, leaves the target (and every not-yet-visited ancestor) in place
//! and returns [`ServiceError::CascadeIncomplete`] listing what was removed,
//! what failed and what was never attempted. Nothing is rolled back.
//!
//! Every successful removal decrements its parent's `childCount` right
//! away, so a parent that survives a stopped cascade still reports exactly
//! its live children.
//!
//! Project deletes remove templates, milestones and components before any
//! issue. If an issue cascade then stops with `CascadeIncomplete`, the
//! surviving issues may still reference components or milestones that no
//! longer exist. Retrying the project delete removes those issues along
//! with the stale references.
//!
//! Removing a node that is already gone is not an error for descendants
//! (it is recorded as skipped) and surfaces as `NotFound` for the target, so
//! concurrent deletes of overlapping subtrees degrade gracefully.

use crate::db::{Collection, Document, DocumentStore};
use crate::models::{
    CatalogKind, DeleteOptions, IssueDeletionImpact, IssueDeletionReport, IssueRef, Outcome,
    Project, ProjectDeletionImpact, ProjectDeletionReport, ProjectRef, ReferenceDeletionImpact,
    ReferenceDeletionReport,
};
use crate::services::error::ServiceError;
use crate::services::impact_analyzer::ImpactAnalyzer;
use crate::services::lookup::{load_project, load_project_issues};
use crate::services::sequence_counter::SequenceCounter;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

pub type IssueDeletion = Outcome<IssueDeletionReport, IssueDeletionImpact>;
pub type ProjectDeletion = Outcome<ProjectDeletionReport, ProjectDeletionImpact>;
pub type ReferenceDeletion = Outcome<ReferenceDeletionReport, ReferenceDeletionImpact>;

/// Document field on issues holding the child counter
const CHILD_COUNT_FIELD: &str = "childCount";

/// Bottom-up deletion of issues, projects and catalog entries
pub struct CascadeDeleter {
    store: Arc<dyn DocumentStore>,
    analyzer: Arc<ImpactAnalyzer>,
    sequence: Arc<SequenceCounter>,
}

impl CascadeDeleter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        analyzer: Arc<ImpactAnalyzer>,
        sequence: Arc<SequenceCounter>,
    ) -> Self {
        Self {
            store,
            analyzer,
            sequence,
        }
    }

    /// Delete an issue, optionally with its subtree
    ///
    /// - `dry_run`: returns the impact report unchanged, no mutation
    /// - descendants present without `cascade`/`force`: `Conflict`, store untouched
    /// - otherwise removes descendants children-first, then the target, then
    ///   decrements the parent's child counter
    pub async fn delete_issue(
        &self,
        issue: &IssueRef,
        options: DeleteOptions,
    ) -> Result<IssueDeletion, ServiceError> {
        let impact = self.analyzer.analyze_issue_deletion(issue, &options).await?;

        if options.dry_run {
            return Ok(Outcome::DryRun(impact));
        }

        if impact.is_blocked() && !options.force {
            return Err(ServiceError::conflict(impact.blockers.join("; ")));
        }

        let report = self.execute_issue_deletion(impact).await?;
        Ok(Outcome::Applied(report))
    }

    async fn execute_issue_deletion(
        &self,
        impact: IssueDeletionImpact,
    ) -> Result<IssueDeletionReport, ServiceError> {
        let target = &impact.target;
        let mut removed = Vec::with_capacity(impact.total_count());
        let mut skipped = Vec::new();

        let order: Vec<_> = impact.removal_order().collect();
        for (position, node) in order.iter().enumerate() {
            let parent_id = match node.parent_index {
                Some(idx) => impact.descendants[idx].issue.id.as_str(),
                None => target.id.as_str(),
            };

            match self
                .store
                .remove_child(Collection::Issues, "parentId", parent_id, &node.issue.id)
                .await
            {
                Ok(true) => {
                    removed.push(node.issue.id.clone());
                    // childCount tracks live children after every removal
                    self.decrement_child_count(parent_id).await;
                }
                Ok(false) => {
                    tracing::debug!(
                        issue_id = %node.issue.id,
                        "Sub-issue already removed or re-parented, skipping"
                    );
                    skipped.push(node.issue.id.clone());
                }
                Err(e) => {
                    let not_attempted = order[position + 1..]
                        .iter()
                        .map(|n| n.issue.id.clone())
                        .chain(std::iter::once(target.id.clone()))
                        .collect();
                    tracing::warn!(
                        target_id = %target.id,
                        failed_id = %node.issue.id,
                        removed = removed.len(),
                        "Cascade delete stopped: {:#}",
                        e
                    );
                    return Err(ServiceError::CascadeIncomplete {
                        target_id: target.id.clone(),
                        removed,
                        failed: vec![(node.issue.id.clone(), format!("{:#}", e))],
                        not_attempted,
                    });
                }
            }
        }

        match self.store.remove(Collection::Issues, &target.id).await {
            Ok(true) => removed.push(target.id.clone()),
            Ok(false) => return Err(ServiceError::not_found("Issue", &target.identifier)),
            Err(e) if removed.is_empty() => {
                return Err(ServiceError::store("issue removal", e));
            }
            Err(e) => {
                return Err(ServiceError::CascadeIncomplete {
                    target_id: target.id.clone(),
                    removed,
                    failed: vec![(target.id.clone(), format!("{:#}", e))],
                    not_attempted: Vec::new(),
                });
            }
        }

        let parent_updated = match &target.parent_id {
            Some(parent_id) => self.decrement_child_count(parent_id).await,
            None => None,
        };

        tracing::info!(
            issue_id = %target.id,
            identifier = %target.identifier,
            removed = removed.len(),
            skipped = skipped.len(),
            "Deleted issue"
        );

        Ok(IssueDeletionReport {
            target_id: target.id.clone(),
            identifier: target.identifier.clone(),
            removed,
            skipped,
            parent_updated,
        })
    }

    /// Returns the parent id when its counter was updated
    async fn decrement_child_count(&self, parent_id: &str) -> Option<String> {
        match self
            .store
            .atomic_increment(Collection::Issues, parent_id, CHILD_COUNT_FIELD, -1)
            .await
        {
            Ok(Some(_)) => Some(parent_id.to_string()),
            Ok(None) => {
                tracing::debug!(parent_id, "Parent already removed, no counter to update");
                None
            }
            Err(e) => {
                tracing::warn!(parent_id, "Failed to decrement child counter: {:#}", e);
                None
            }
        }
    }

    /// Delete a project with everything it owns
    ///
    /// Templates, milestones and components go first, then issues through
    /// [`delete_issue`](Self::delete_issue) so sub-issue trees are removed
    /// bottom-up, and the project document last.
    pub async fn delete_project(
        &self,
        project: &ProjectRef,
        options: DeleteOptions,
    ) -> Result<ProjectDeletion, ServiceError> {
        let impact = self
            .analyzer
            .analyze_project_deletion(project, &options)
            .await?;

        if options.dry_run {
            return Ok(Outcome::DryRun(impact));
        }

        if impact.is_blocked() && !options.force {
            return Err(ServiceError::conflict(impact.blockers.join("; ")));
        }

        let project_id = impact.project.id.clone();
        let templates_removed = self
            .remove_all(Collection::Templates, impact.templates.iter().map(|t| t.id.as_str()))
            .await?;
        let milestones_removed = self
            .remove_all(Collection::Milestones, impact.milestones.iter().map(|m| m.id.as_str()))
            .await?;
        let components_removed = self
            .remove_all(Collection::Components, impact.components.iter().map(|c| c.id.as_str()))
            .await?;

        let project_issue_ids: HashSet<&str> =
            impact.issues.iter().map(|i| i.id.as_str()).collect();
        let roots: Vec<&str> = impact
            .issues
            .iter()
            .filter(|i| match &i.parent_id {
                Some(parent) => !project_issue_ids.contains(parent.as_str()),
                None => true,
            })
            .map(|i| i.id.as_str())
            .collect();

        let mut issues_removed = 0;
        for root in roots {
            issues_removed += self.delete_subtree(root).await?;
        }

        // Issues only reachable through a cycle have no root
        for leftover in load_project_issues(self.store.as_ref(), &project_id).await? {
            issues_removed += self.delete_subtree(&leftover.id).await?;
        }

        self.sequence.invalidate(&project_id).await;
        let removed = self
            .store
            .remove(Collection::Projects, &project_id)
            .await
            .map_err(|e| ServiceError::store("project removal", e))?;
        if !removed {
            return Err(ServiceError::not_found("Project", &project_id));
        }

        tracing::info!(
            project_id = %project_id,
            issues_removed,
            components_removed,
            milestones_removed,
            templates_removed,
            "Deleted project"
        );

        Ok(Outcome::Applied(ProjectDeletionReport {
            project_id,
            issues_removed,
            components_removed,
            milestones_removed,
            templates_removed,
        }))
    }

    /// Cascade-delete one issue; an issue already gone counts as zero
    async fn delete_subtree(&self, issue_id: &str) -> Result<usize, ServiceError> {
        let options = DeleteOptions::new().cascade().force();
        match self
            .delete_issue(&IssueRef::Id(issue_id.to_string()), options)
            .await
        {
            Ok(outcome) => Ok(outcome.applied().map(|r| r.removed_count()).unwrap_or(0)),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    async fn remove_all<'a>(
        &self,
        collection: Collection,
        ids: impl Iterator<Item = &'a str>,
    ) -> Result<usize, ServiceError> {
        let mut removed = 0;
        for id in ids {
            if self
                .store
                .remove(collection, id)
                .await
                .map_err(|e| ServiceError::store(&format!("{} removal", collection), e))?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Mark a project archived without touching anything it owns
    ///
    /// Fails with `Conflict` if the project is already archived.
    pub async fn archive_project(&self, project: &ProjectRef) -> Result<Project, ServiceError> {
        self.set_archived(project, true).await
    }

    /// Reverse of [`archive_project`](Self::archive_project)
    pub async fn unarchive_project(&self, project: &ProjectRef) -> Result<Project, ServiceError> {
        self.set_archived(project, false).await
    }

    async fn set_archived(
        &self,
        project: &ProjectRef,
        archived: bool,
    ) -> Result<Project, ServiceError> {
        let mut project = load_project(self.store.as_ref(), project).await?;
        if project.archived == archived {
            let state = if archived { "archived" } else { "active" };
            return Err(ServiceError::conflict(format!(
                "project {} is already {}",
                project.prefix, state
            )));
        }

        let archived_at = archived.then(Utc::now);
        let mut patch = Document::new();
        patch.insert("archived".to_string(), Value::Bool(archived));
        patch.insert(
            "archivedAt".to_string(),
            serde_json::to_value(archived_at)
                .map_err(|e| ServiceError::operation_failed(e.to_string()))?,
        );

        let updated = self
            .store
            .update_fields(Collection::Projects, &project.id, patch)
            .await
            .map_err(|e| ServiceError::store("project archive", e))?;
        if !updated {
            return Err(ServiceError::not_found("Project", &project.id));
        }

        tracing::info!(project_id = %project.id, archived, "Changed project archive state");
        project.archived = archived;
        project.archived_at = archived_at;
        Ok(project)
    }

    /// Delete a component; dependents block unless forced, then have their
    /// reference cleared first
    pub async fn delete_component(
        &self,
        component_id: &str,
        options: DeleteOptions,
    ) -> Result<ReferenceDeletion, ServiceError> {
        let impact = self
            .analyzer
            .analyze_component_deletion(component_id, &options)
            .await?;
        self.execute_reference_deletion(impact, options).await
    }

    /// Delete a milestone; same policy as components
    pub async fn delete_milestone(
        &self,
        milestone_id: &str,
        options: DeleteOptions,
    ) -> Result<ReferenceDeletion, ServiceError> {
        let impact = self
            .analyzer
            .analyze_milestone_deletion(milestone_id, &options)
            .await?;
        self.execute_reference_deletion(impact, options).await
    }

    async fn execute_reference_deletion(
        &self,
        impact: ReferenceDeletionImpact,
        options: DeleteOptions,
    ) -> Result<ReferenceDeletion, ServiceError> {
        if options.dry_run {
            return Ok(Outcome::DryRun(impact));
        }

        if impact.is_blocked() && !options.force {
            return Err(ServiceError::conflict(impact.blockers.join("; ")));
        }

        let kind: CatalogKind = impact.kind;
        let mut cleared_issue_ids = Vec::with_capacity(impact.dependent_issues.len());
        for issue in &impact.dependent_issues {
            let mut patch = Document::new();
            patch.insert(kind.issue_field().to_string(), Value::Null);
            patch.insert(
                "modifiedAt".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );

            let updated = self
                .store
                .update_fields(Collection::Issues, &issue.id, patch)
                .await
                .map_err(|e| ServiceError::store(&format!("clearing {} reference", kind), e))?;
            if updated {
                cleared_issue_ids.push(issue.id.clone());
            }
        }

        let removed = self
            .store
            .remove(Collection::from(kind), &impact.target_id)
            .await
            .map_err(|e| ServiceError::store(&format!("{} removal", kind), e))?;
        if !removed {
            return Err(ServiceError::not_found(kind.to_string(), &impact.target_id));
        }

        tracing::info!(
            kind = %kind,
            target_id = %impact.target_id,
            cleared = cleared_issue_ids.len(),
            "Deleted catalog entry"
        );

        Ok(Outcome::Applied(ReferenceDeletionReport {
            kind,
            target_id: impact.target_id,
            cleared_issue_ids,
        }))
    }
}

#[cfg(test)]
#[path = "cascade_deleter_test.rs"]
mod cascade_deleter_test;
