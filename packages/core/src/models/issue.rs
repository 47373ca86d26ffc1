//! Issue model
//!
//! Issues belong to exactly one project and optionally to a parent issue.
//! `number` is assigned once from the project's sequence counter and never
//! changes; `identifier` is derived from it (`PREFIX-number`).

use super::{ProjectRef, ValidationError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// Capture group 1: project prefix, capture group 2: issue number
const IDENTIFIER_PATTERN: &str = r"^([A-Z][A-Z0-9]{0,9})-(\d+)$";

/// Maximum title length accepted on create/update
const MAX_TITLE_LEN: usize = 500;

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER_REGEX.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Backlog,
    #[default]
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl FromStr for IssueStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(Self::Backlog),
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError::invalid_field_value(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Urgent,
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(ValidationError::invalid_field_value(
                "priority",
                format!("unknown priority '{}'", other),
            )),
        }
    }
}

/// Issue record
///
/// # Fields
///
/// - `number`: Assigned once from the project's sequence counter, never reused
/// - `identifier`: `PREFIX-number`, unique within the project
/// - `parent_id`: Optional tree edge to the parent issue
/// - `child_count`: Redundant counter of live children, maintained with atomic increments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,

    pub project_id: String,

    pub number: i64,

    pub identifier: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: IssueStatus,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub child_count: i64,

    #[serde(default)]
    pub component_id: Option<String>,

    #[serde(default)]
    pub milestone_id: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

/// Reference to an issue, either by document id or by human identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IssueRef {
    Id(String),
    Identifier { prefix: String, number: i64 },
}

impl IssueRef {
    /// Interpret a caller-supplied string
    ///
    /// ```
    /// # use tracker_core::models::IssueRef;
    /// assert_eq!(
    ///     IssueRef::parse("PROJ-12"),
    ///     IssueRef::Identifier { prefix: "PROJ".to_string(), number: 12 }
    /// );
    /// assert_eq!(IssueRef::parse("abc"), IssueRef::Id("abc".to_string()));
    /// ```
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let Some(caps) = identifier_regex().captures(value) {
            if let Ok(number) = caps[2].parse::<i64>() {
                return Self::Identifier {
                    prefix: caps[1].to_string(),
                    number,
                };
            }
        }
        Self::Id(value.to_string())
    }
}

impl From<&str> for IssueRef {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<&Issue> for IssueRef {
    fn from(issue: &Issue) -> Self {
        Self::Id(issue.id.clone())
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Identifier { prefix, number } => write!(f, "{}-{}", prefix, number),
        }
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::MissingField("title".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::invalid_field_value(
            "title",
            format!("longer than {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(())
}

fn validate_labels(labels: &[String]) -> Result<(), ValidationError> {
    if labels.iter().any(|l| l.trim().is_empty()) {
        return Err(ValidationError::invalid_field_value(
            "labels",
            "labels cannot be empty",
        ));
    }
    Ok(())
}

/// Input for creating an issue
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub project: ProjectRef,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub priority: Priority,
    pub parent: Option<IssueRef>,
    pub component_id: Option<String>,
    pub milestone_id: Option<String>,
    pub labels: Vec<String>,
}

impl NewIssue {
    pub fn new(project: impl Into<ProjectRef>, title: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            title: title.into(),
            description: None,
            status: IssueStatus::default(),
            priority: Priority::default(),
            parent: None,
            component_id: None,
            milestone_id: None,
            labels: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: IssueStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<IssueRef>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_component(mut self, component_id: impl Into<String>) -> Self {
        self.component_id = Some(component_id.into());
        self
    }

    pub fn with_milestone(mut self, milestone_id: impl Into<String>) -> Self {
        self.milestone_id = Some(milestone_id.into());
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Field-level validation that needs no store access
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_labels(&self.labels)
    }
}

/// Identifies one updatable issue field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueField {
    Title,
    Description,
    Status,
    Priority,
    Parent,
    Component,
    Milestone,
    Labels,
}

impl IssueField {
    /// Resolve a transport-level field name
    ///
    /// Accepts the plain name as well as the camelCase and snake_case
    /// document field names for reference fields.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "status" => Some(Self::Status),
            "priority" => Some(Self::Priority),
            "parent" | "parentId" | "parent_id" => Some(Self::Parent),
            "component" | "componentId" | "component_id" => Some(Self::Component),
            "milestone" | "milestoneId" | "milestone_id" => Some(Self::Milestone),
            "labels" => Some(Self::Labels),
            _ => None,
        }
    }

    /// Document field written by this update
    pub fn document_field(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Parent => "parentId",
            Self::Component => "componentId",
            Self::Milestone => "milestoneId",
            Self::Labels => "labels",
        }
    }
}

impl fmt::Display for IssueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document_field())
    }
}

/// A typed single-field update
#[derive(Debug, Clone, PartialEq)]
pub enum IssueFieldUpdate {
    Title(String),
    Description(Option<String>),
    Status(IssueStatus),
    Priority(Priority),
    Parent(Option<IssueRef>),
    Component(Option<String>),
    Milestone(Option<String>),
    Labels(Vec<String>),
}

fn optional_string(field: IssueField, value: &Value) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(ValidationError::invalid_field_value(
            field.document_field(),
            format!("expected string or null, got {}", other),
        )),
    }
}

fn required_string(field: IssueField, value: &Value) -> Result<String, ValidationError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ValidationError::invalid_field_value(
            field.document_field(),
            format!("expected string, got {}", value),
        )
    })
}

impl IssueFieldUpdate {
    /// Build a typed update from a field name and a JSON value
    ///
    /// ```
    /// # use tracker_core::models::{IssueFieldUpdate, IssueStatus};
    /// # use serde_json::json;
    /// let update = IssueFieldUpdate::parse("status", &json!("done")).unwrap();
    /// assert_eq!(update, IssueFieldUpdate::Status(IssueStatus::Done));
    /// assert!(IssueFieldUpdate::parse("colour", &json!("red")).is_err());
    /// ```
    pub fn parse(name: &str, value: &Value) -> Result<Self, ValidationError> {
        let field = IssueField::from_name(name)
            .ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;

        let update = match field {
            IssueField::Title => Self::Title(required_string(field, value)?),
            IssueField::Description => Self::Description(optional_string(field, value)?),
            IssueField::Status => Self::Status(required_string(field, value)?.parse()?),
            IssueField::Priority => Self::Priority(required_string(field, value)?.parse()?),
            IssueField::Parent => {
                Self::Parent(optional_string(field, value)?.map(|s| IssueRef::parse(&s)))
            }
            IssueField::Component => Self::Component(optional_string(field, value)?),
            IssueField::Milestone => Self::Milestone(optional_string(field, value)?),
            IssueField::Labels => {
                let labels: Vec<String> = serde_json::from_value(value.clone()).map_err(|e| {
                    ValidationError::invalid_field_value("labels", e.to_string())
                })?;
                Self::Labels(labels)
            }
        };
        update.validate()?;
        Ok(update)
    }

    pub fn field(&self) -> IssueField {
        match self {
            Self::Title(_) => IssueField::Title,
            Self::Description(_) => IssueField::Description,
            Self::Status(_) => IssueField::Status,
            Self::Priority(_) => IssueField::Priority,
            Self::Parent(_) => IssueField::Parent,
            Self::Component(_) => IssueField::Component,
            Self::Milestone(_) => IssueField::Milestone,
            Self::Labels(_) => IssueField::Labels,
        }
    }

    /// Field-level validation that needs no store access
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Title(title) => validate_title(title),
            Self::Labels(labels) => validate_labels(labels),
            _ => Ok(()),
        }
    }
}
