//! Project model
//!
//! A project owns the monotonic `sequence` counter from which issue numbers
//! are drawn, and the prefix used to build human identifiers (`PROJ-12`).

use super::ValidationError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

// Uppercase letter followed by 1-9 uppercase letters or digits
const PREFIX_PATTERN: &str = r"^[A-Z][A-Z0-9]{0,9}$";

fn prefix_regex() -> &'static Regex {
    static PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();
    PREFIX_REGEX.get_or_init(|| Regex::new(PREFIX_PATTERN).unwrap())
}

/// Validate a project identifier prefix
///
/// # Examples
///
/// ```
/// # use tracker_core::models::validate_prefix;
/// assert!(validate_prefix("PROJ").is_ok());
/// assert!(validate_prefix("A1").is_ok());
/// assert!(validate_prefix("proj").is_err());
/// assert!(validate_prefix("P").is_ok());
/// assert!(validate_prefix("P-1").is_err());
/// ```
pub fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix_regex().is_match(prefix) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPrefix(prefix.to_string()))
    }
}

/// Build the human identifier for an issue number
///
/// ```
/// # use tracker_core::models::format_identifier;
/// assert_eq!(format_identifier("PROJ", 12), "PROJ-12");
/// ```
pub fn format_identifier(prefix: &str, number: i64) -> String {
    format!("{}-{}", prefix, number)
}

/// Project record
///
/// `sequence` is only ever mutated by the sequence counter, and only upward.
/// It is `None` for projects whose counter field was never written; the
/// counter heals such projects before its first increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,

    pub name: String,

    /// Identifier prefix (e.g. "PROJ")
    pub prefix: String,

    /// Last issue number handed out for this project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,

    #[serde(default)]
    pub archived: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project with a zeroed counter
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            prefix: prefix.into(),
            sequence: Some(0),
            archived: false,
            archived_at: None,
            created_at: Utc::now(),
        }
    }

    /// Check name and prefix
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        validate_prefix(&self.prefix)
    }

    /// Identifier for an issue number within this project
    pub fn identifier_for(&self, number: i64) -> String {
        format_identifier(&self.prefix, number)
    }
}

/// Reference to a project, either by document id or by prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectRef {
    Id(String),
    Prefix(String),
}

impl ProjectRef {
    /// Interpret a caller-supplied string
    ///
    /// Strings shaped like a prefix resolve by prefix, everything else by id.
    ///
    /// ```
    /// # use tracker_core::models::ProjectRef;
    /// assert_eq!(ProjectRef::parse("PROJ"), ProjectRef::Prefix("PROJ".to_string()));
    /// assert_eq!(
    ///     ProjectRef::parse("4f1c2a9e-0000-4000-8000-000000000000"),
    ///     ProjectRef::Id("4f1c2a9e-0000-4000-8000-000000000000".to_string())
    /// );
    /// ```
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if prefix_regex().is_match(value) {
            Self::Prefix(value.to_string())
        } else {
            Self::Id(value.to_string())
        }
    }
}

impl From<&str> for ProjectRef {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<&Project> for ProjectRef {
    fn from(project: &Project) -> Self {
        Self::Id(project.id.clone())
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Prefix(prefix) => write!(f, "{}", prefix),
        }
    }
}
