use serde::Serialize;

/// Result of an operation that can run in dry-run mode
///
/// `Applied` carries the committed result; `DryRun` carries the computed
/// preview of what would have happened, with the store left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "snake_case")]
pub enum Outcome<T, P> {
    Applied(T),
    DryRun(P),
}

impl<T, P> Outcome<T, P> {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::DryRun(_) => None,
        }
    }

    pub fn preview(self) -> Option<P> {
        match self {
            Self::Applied(_) => None,
            Self::DryRun(preview) => Some(preview),
        }
    }
}
