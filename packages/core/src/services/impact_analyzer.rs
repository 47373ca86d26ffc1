//! Impact Analyzer
//!
//! Computes, without mutating anything, everything a deletion would touch.
//! Every method here issues only `find_one` / `find_all` calls, so a dry run
//! is indistinguishable from any other read as far as the store can tell.
//!
//! Blockers are advisory: the analyzer reports them, the cascade deleter
//! decides whether to proceed.

use crate::db::{Collection, DocumentStore, Filter, FindOptions};
use crate::models::{
    CatalogKind, Component, DeleteOptions, ImpactNode, Issue, IssueDeletionImpact, IssueRef,
    Milestone, ProjectDeletionImpact, ProjectRef, ReferenceDeletionImpact, Template,
};
use crate::services::error::ServiceError;
use crate::services::lookup::{
    find_record, find_records, load_children, load_issue, load_project, load_project_issues,
};
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Fields shared by components and milestones
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    id: String,
    project_id: String,
    name: String,
}

/// Descendants of one issue plus the anomalies found on the way
pub(crate) struct Subtree {
    pub nodes: Vec<ImpactNode>,
    pub warnings: Vec<String>,
}

/// Read-only deletion impact computation
pub struct ImpactAnalyzer {
    store: Arc<dyn DocumentStore>,
}

impl ImpactAnalyzer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Impact of deleting one issue
    ///
    /// Enumerates the full subtree below the issue. A blocker is reported when
    /// descendants exist and neither `cascade` nor `force` is set.
    pub async fn analyze_issue_deletion(
        &self,
        issue: &IssueRef,
        options: &DeleteOptions,
    ) -> Result<IssueDeletionImpact, ServiceError> {
        let target = load_issue(self.store.as_ref(), issue).await?;
        self.analyze_loaded_issue(target, options).await
    }

    pub(crate) async fn analyze_loaded_issue(
        &self,
        target: Issue,
        options: &DeleteOptions,
    ) -> Result<IssueDeletionImpact, ServiceError> {
        let Subtree {
            nodes: descendants,
            mut warnings,
        } = self.subtree(&target).await?;

        let mut blockers = Vec::new();
        if !descendants.is_empty() {
            if options.cascade || options.force {
                warnings.push(format!(
                    "{} sub-issue(s) of {} will be deleted",
                    descendants.len(),
                    target.identifier
                ));
            } else {
                blockers.push(format!(
                    "issue {} has {} sub-issues; cascade or force required",
                    target.identifier,
                    descendants.len()
                ));
            }
        }

        tracing::debug!(
            issue_id = %target.id,
            descendants = descendants.len(),
            blockers = blockers.len(),
            "Analyzed issue deletion"
        );

        Ok(IssueDeletionImpact {
            target,
            direct_count: 1,
            descendants,
            blockers,
            warnings,
        })
    }

    /// Walk the subtree below `root` breadth-first
    ///
    /// Uses an explicit queue and a visited set keyed by issue id, so the
    /// walk terminates on cyclic parent links left behind by corruption and
    /// never recurses on the call stack.
    pub(crate) async fn subtree(&self, root: &Issue) -> Result<Subtree, ServiceError> {
        let mut nodes: Vec<ImpactNode> = Vec::new();
        let mut warnings = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut queue: VecDeque<(String, Option<usize>, usize)> = VecDeque::new();
        queue.push_back((root.id.clone(), None, 0));

        while let Some((parent_id, parent_index, depth)) = queue.pop_front() {
            let children = load_children(self.store.as_ref(), &parent_id).await?;

            let (recorded, parent_label) = match parent_index {
                Some(idx) => (nodes[idx].issue.child_count, nodes[idx].issue.identifier.clone()),
                None => (root.child_count, root.identifier.clone()),
            };
            if recorded != children.len() as i64 {
                warnings.push(format!(
                    "child counter of {} is {} but {} live children were found",
                    parent_label,
                    recorded,
                    children.len()
                ));
            }

            for child in children {
                if !visited.insert(child.id.clone()) {
                    tracing::warn!(
                        issue_id = %child.id,
                        parent_id = %parent_id,
                        "Cycle in issue hierarchy"
                    );
                    warnings.push(format!(
                        "cycle detected: {} is reachable from itself",
                        child.identifier
                    ));
                    continue;
                }

                if child.project_id != root.project_id {
                    warnings.push(format!(
                        "sub-issue {} belongs to a different project",
                        child.identifier
                    ));
                }

                let child_id = child.id.clone();
                nodes.push(ImpactNode {
                    issue: child,
                    depth: depth + 1,
                    parent_index,
                });
                queue.push_back((child_id, Some(nodes.len() - 1), depth + 1));
            }
        }

        Ok(Subtree { nodes, warnings })
    }

    /// Impact of deleting a project and everything it owns
    ///
    /// Dependent collections are one level deep, so no traversal is needed.
    /// Remaining issues block the deletion unless `force` is set.
    pub async fn analyze_project_deletion(
        &self,
        project: &ProjectRef,
        options: &DeleteOptions,
    ) -> Result<ProjectDeletionImpact, ServiceError> {
        let store = self.store.as_ref();
        let project = load_project(store, project).await?;
        let owned = Filter::new().eq("projectId", project.id.as_str());
        let all = FindOptions::new();

        let issues = load_project_issues(store, &project.id).await?;
        let components: Vec<Component> =
            find_records(store, Collection::Components, &owned, &all).await?;
        let milestones: Vec<Milestone> =
            find_records(store, Collection::Milestones, &owned, &all).await?;
        let templates: Vec<Template> =
            find_records(store, Collection::Templates, &owned, &all).await?;

        let mut blockers = Vec::new();
        let mut warnings = Vec::new();
        if !issues.is_empty() {
            if options.force {
                warnings.push(format!(
                    "{} issue(s) will be deleted with project {}",
                    issues.len(),
                    project.prefix
                ));
            } else {
                blockers.push(format!(
                    "project {} has {} issues; force required",
                    project.prefix,
                    issues.len()
                ));
            }
        }
        for (count, label) in [
            (components.len(), "component"),
            (milestones.len(), "milestone"),
            (templates.len(), "template"),
        ] {
            if count > 0 {
                warnings.push(format!("{} {}(s) will be deleted", count, label));
            }
        }

        Ok(ProjectDeletionImpact {
            project,
            issues,
            components,
            milestones,
            templates,
            blockers,
            warnings,
        })
    }

    /// Impact of deleting a component
    pub async fn analyze_component_deletion(
        &self,
        component_id: &str,
        options: &DeleteOptions,
    ) -> Result<ReferenceDeletionImpact, ServiceError> {
        self.analyze_reference_deletion(CatalogKind::Component, component_id, options)
            .await
    }

    /// Impact of deleting a milestone
    pub async fn analyze_milestone_deletion(
        &self,
        milestone_id: &str,
        options: &DeleteOptions,
    ) -> Result<ReferenceDeletionImpact, ServiceError> {
        self.analyze_reference_deletion(CatalogKind::Milestone, milestone_id, options)
            .await
    }

    async fn analyze_reference_deletion(
        &self,
        kind: CatalogKind,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<ReferenceDeletionImpact, ServiceError> {
        let store = self.store.as_ref();
        let entry: CatalogEntry = find_record(store, Collection::from(kind), &Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::not_found(kind.to_string(), id))?;

        let dependent_issues: Vec<Issue> = find_records(
            store,
            Collection::Issues,
            &Filter::new().eq(kind.issue_field(), entry.id.as_str()),
            &FindOptions::new().sort_asc("number"),
        )
        .await?;

        let mut blockers = Vec::new();
        let mut warnings = Vec::new();
        if !dependent_issues.is_empty() {
            if options.force {
                warnings.push(format!(
                    "{} issue(s) will have their {} cleared",
                    dependent_issues.len(),
                    kind
                ));
            } else {
                blockers.push(format!(
                    "{} '{}' is referenced by {} issues; force required",
                    kind,
                    entry.name,
                    dependent_issues.len()
                ));
            }
        }

        Ok(ReferenceDeletionImpact {
            kind,
            target_id: entry.id,
            target_name: entry.name,
            project_id: entry.project_id,
            dependent_issues,
            blockers,
            warnings,
        })
    }
}

#[cfg(test)]
#[path = "impact_analyzer_test.rs"]
mod impact_analyzer_test;
