//! Per-file data quality issues found during refresh.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// What went wrong with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    MissingStat,
    MissingNotejson,
    InvalidNotejson,
    InvalidFrontmatter,
    MissingFrontmatter,
    TagsNotArray,
    RepairFailed,
    ParseError,
    FetchError,
}

impl IssueKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingStat => "MISSING_STAT",
            Self::MissingNotejson => "MISSING_NOTEJSON",
            Self::InvalidNotejson => "INVALID_NOTEJSON",
            Self::InvalidFrontmatter => "INVALID_FRONTMATTER",
            Self::MissingFrontmatter => "MISSING_FRONTMATTER",
            Self::TagsNotArray => "TAGS_NOT_ARRAY",
            Self::RepairFailed => "REPAIR_FAILED",
            Self::ParseError => "PARSE_ERROR",
            Self::FetchError => "FETCH_ERROR",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub file_path: String,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only issue list per path. Reset at the start of every refresh.
#[derive(Default)]
pub struct DiagnosticsLog {
    issues: Mutex<BTreeMap<String, Vec<Issue>>>,
}

impl DiagnosticsLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Issue>>> {
        self.issues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, path: &str, kind: IssueKind, detail: Option<String>) {
        self.lock().entry(path.to_string()).or_default().push(Issue {
            file_path: path.to_string(),
            kind,
            detail,
        });
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Read-only copy of all issues, ordered by path.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Issue>> {
        self.lock().clone()
    }

    pub fn issues_for(&self, path: &str) -> Vec<Issue> {
        self.lock().get(path).cloned().unwrap_or_default()
    }

    pub fn has_issue(&self, path: &str, kind: IssueKind) -> bool {
        self.lock()
            .get(path)
            .is_some_and(|issues| issues.iter().any(|i| i.kind == kind))
    }

    /// Number of files with at least one issue.
    pub fn file_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_per_path() {
        let log = DiagnosticsLog::new();
        log.record("a.md", IssueKind::MissingStat, None);
        log.record("a.md", IssueKind::TagsNotArray, Some("string".into()));
        log.record("b.md", IssueKind::FetchError, Some("503".into()));

        let issues = log.issues_for("a.md");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::MissingStat);
        assert_eq!(issues[1].detail.as_deref(), Some("string"));
        assert!(log.has_issue("b.md", IssueKind::FetchError));
        assert_eq!(log.file_count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let log = DiagnosticsLog::new();
        log.record("a.md", IssueKind::ParseError, None);
        log.reset();
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn issue_serializes_with_wire_names() {
        let issue = Issue {
            file_path: "a.md".to_string(),
            kind: IssueKind::MissingNotejson,
            detail: None,
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["filePath"], "a.md");
        assert_eq!(json["kind"], "MISSING_NOTEJSON");
        assert!(json.get("detail").is_none());
        assert_eq!(IssueKind::TagsNotArray.to_string(), "TAGS_NOT_ARRAY");
    }
}
