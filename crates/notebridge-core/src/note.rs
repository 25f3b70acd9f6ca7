//! Note types — what the source returns and what the cache stores.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::basename;

/// File timestamps and size. Always complete once stored in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteStat {
    /// Modification time, epoch milliseconds.
    pub mtime: i64,
    /// Creation time, epoch milliseconds.
    pub ctime: i64,
    /// Size in bytes.
    pub size: u64,
}

impl NoteStat {
    /// A stat synthesized from the current time.
    #[must_use]
    pub fn now(size: u64) -> Self {
        let now = now_ms();
        Self {
            mtime: now,
            ctime: now,
            size,
        }
    }
}

impl From<NoteStat> for RawStat {
    fn from(stat: NoteStat) -> Self {
        Self {
            mtime: Some(stat.mtime),
            ctime: Some(stat.ctime),
            size: Some(stat.size),
        }
    }
}

/// Stat as reported by the source. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStat {
    pub mtime: Option<i64>,
    pub ctime: Option<i64>,
    pub size: Option<u64>,
}

impl RawStat {
    /// Fill each missing field from `fallback`.
    #[must_use]
    pub fn or(self, fallback: RawStat) -> Self {
        Self {
            mtime: self.mtime.or(fallback.mtime),
            ctime: self.ctime.or(fallback.ctime),
            size: self.size.or(fallback.size),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.mtime.is_some() && self.ctime.is_some() && self.size.is_some()
    }
}

/// The canonical structured note as the source returns it.
///
/// Shapes are deliberately loose: `frontmatter` may not be an object,
/// `tags` may not be an array and `stat` may be missing. The cache
/// normalizes before storing anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredNote {
    pub path: Option<String>,
    pub content: Option<String>,
    pub frontmatter: Value,
    pub tags: Value,
    pub stat: Option<RawStat>,
}

impl StructuredNote {
    /// A structured note is usable only when it names its path.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.path.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Normalized metadata for one vault file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    /// Normalized vault-relative path.
    pub path: String,
    /// File name without extension.
    pub basename: String,
    /// Parsed frontmatter; empty when absent.
    pub frontmatter: Map<String, Value>,
    /// Deduplicated tags.
    pub tags: Vec<String>,
    pub stat: NoteStat,
}

impl NoteMetadata {
    #[must_use]
    pub fn new(
        path: String,
        frontmatter: Map<String, Value>,
        tags: Vec<String>,
        stat: NoteStat,
    ) -> Self {
        let basename = basename(&path).to_string();
        Self {
            path,
            basename,
            frontmatter,
            tags,
            stat,
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
