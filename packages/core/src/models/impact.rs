//! Deletion Impact Reports
//!
//! Impact reports are computed snapshots of what a deletion would touch.
//! They are never persisted: the caller either shows them to a human
//! (dry run) or hands them to the cascade deleter as its execution plan.

use super::{CatalogKind, Component, Issue, Milestone, Project, Template};
use serde::{Deserialize, Serialize};

/// Policy flags for delete operations
///
/// - `cascade`: remove dependents together with the target
/// - `force`: proceed even when blockers are reported
/// - `dry_run`: stop after impact analysis, mutate nothing
///
/// Project deletes always remove their dependents; `cascade` is ignored there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteOptions {
    pub cascade: bool,
    pub force: bool,
    pub dry_run: bool,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// One descendant found while walking an issue subtree
///
/// Nodes live in an arena (`IssueDeletionImpact::descendants`) in the order
/// they were discovered; `parent_index` points back into that arena, or is
/// `None` when the parent is the deletion target itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactNode {
    pub issue: Issue,
    pub depth: usize,
    pub parent_index: Option<usize>,
}

/// Everything deleting one issue would affect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDeletionImpact {
    pub target: Issue,
    /// Always 1: the target itself
    pub direct_count: usize,
    /// Full subtree below the target, breadth-first
    pub descendants: Vec<ImpactNode>,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
}

impl IssueDeletionImpact {
    /// Number of descendants that would be removed along with the target
    pub fn cascade_count(&self) -> usize {
        self.descendants.len()
    }

    pub fn total_count(&self) -> usize {
        self.direct_count + self.cascade_count()
    }

    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }

    /// Descendants ordered so that every node comes after all of its children
    ///
    /// Breadth-first discovery places a child after its parent, so walking the
    /// arena backwards yields a valid bottom-up removal order.
    pub fn removal_order(&self) -> impl Iterator<Item = &ImpactNode> {
        self.descendants.iter().rev()
    }
}

/// Everything deleting a project would affect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDeletionImpact {
    pub project: Project,
    pub issues: Vec<Issue>,
    pub components: Vec<Component>,
    pub milestones: Vec<Milestone>,
    pub templates: Vec<Template>,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
}

impl ProjectDeletionImpact {
    /// Documents removed including the project itself
    pub fn total_count(&self) -> usize {
        1 + self.issues.len() + self.components.len() + self.milestones.len() + self.templates.len()
    }

    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }
}

/// Everything deleting a component or milestone would affect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDeletionImpact {
    pub kind: CatalogKind,
    pub target_id: String,
    pub target_name: String,
    pub project_id: String,
    /// Issues whose reference would be cleared
    pub dependent_issues: Vec<Issue>,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReferenceDeletionImpact {
    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }
}

/// Result of an executed issue deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDeletionReport {
    pub target_id: String,
    pub identifier: String,
    /// Ids removed by this call, children before parents, target last
    pub removed: Vec<String>,
    /// Descendants that were already gone, or had moved under another parent,
    /// when their removal was attempted
    pub skipped: Vec<String>,
    /// Parent whose child counter was decremented
    pub parent_updated: Option<String>,
}

impl IssueDeletionReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Result of an executed project deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDeletionReport {
    pub project_id: String,
    pub issues_removed: usize,
    pub components_removed: usize,
    pub milestones_removed: usize,
    pub templates_removed: usize,
}

/// Result of an executed component or milestone deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDeletionReport {
    pub kind: CatalogKind,
    pub target_id: String,
    /// Issues whose reference was set to null before removal
    pub cleared_issue_ids: Vec<String>,
}
