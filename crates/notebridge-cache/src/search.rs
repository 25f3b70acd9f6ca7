//! Search over the cached index.
//!
//! Reads only what is already in memory. Note bodies are consulted through
//! [`ContentCache::peek`](crate::ContentCache::peek), so searching neither
//! touches the source nor refreshes any TTL.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use notebridge_core::frontmatter::parse_frontmatter;
use notebridge_core::NoteMetadata;

use crate::service::VaultCache;

const BASENAME_SCORE: u32 = 10;
const EXACT_TAG_SCORE: u32 = 8;
const PARTIAL_TAG_SCORE: u32 = 4;
const PATH_SCORE: u32 = 3;
const FRONTMATTER_SCORE: u32 = 2;
const CONTENT_SCORE: u32 = 1;

const SNIPPET_CHARS: usize = 160;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("vault cache is not ready")]
    NotReady,

    #[error("search query is empty")]
    EmptyQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    /// Also match against cached note bodies.
    pub include_content: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            include_content: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub basename: String,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub tags: Vec<String>,
}

impl VaultCache {
    /// Case-insensitive search across basenames, tags, paths, frontmatter
    /// string values and cached content. Hits are ordered by score, then path.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotReady`] before the first completed refresh,
    /// [`SearchError::EmptyQuery`] for a blank query.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>, SearchError> {
        if !self.is_ready() {
            return Err(SearchError::NotReady);
        }
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let mut hits: Vec<SearchHit> = self
            .index
            .snapshot()
            .into_values()
            .filter_map(|meta| {
                let body = if options.include_content {
                    self.content
                        .peek(&meta.path)
                        .map(|c| parse_frontmatter(&c).body().to_string())
                } else {
                    None
                };
                score_note(&meta, body.as_deref(), &needle)
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        hits.truncate(options.limit);
        Ok(hits)
    }

    /// Every indexed note carrying `tag` (compared case-insensitively, a
    /// leading `#` ignored), sorted by path.
    pub fn notes_with_tag(&self, tag: &str) -> Vec<Arc<NoteMetadata>> {
        let wanted = tag.trim().trim_start_matches('#').to_lowercase();
        let mut notes: Vec<_> = self
            .index
            .snapshot()
            .into_values()
            .filter(|meta| meta.tags.iter().any(|t| t.to_lowercase() == wanted))
            .collect();
        notes.sort_by(|a, b| a.path.cmp(&b.path));
        notes
    }
}

fn score_note(meta: &NoteMetadata, content: Option<&str>, needle: &str) -> Option<SearchHit> {
    let mut score = 0;
    let mut snippet = None;

    if meta.basename.to_lowercase().contains(needle) {
        score += BASENAME_SCORE;
    }

    let bare = needle.trim_start_matches('#');
    if meta.tags.iter().any(|t| t.to_lowercase() == bare) {
        score += EXACT_TAG_SCORE;
    } else if !bare.is_empty() && meta.tags.iter().any(|t| t.to_lowercase().contains(bare)) {
        score += PARTIAL_TAG_SCORE;
    }

    if meta.path.to_lowercase().contains(needle) {
        score += PATH_SCORE;
    }

    if meta.frontmatter.values().any(|v| value_contains(v, needle)) {
        score += FRONTMATTER_SCORE;
    }

    if let Some(line) = content.and_then(|c| matching_line(c, needle)) {
        score += CONTENT_SCORE;
        snippet = Some(line);
    }

    (score > 0).then(|| SearchHit {
        path: meta.path.clone(),
        basename: meta.basename.clone(),
        score,
        snippet,
        tags: meta.tags.clone(),
    })
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| value_contains(v, needle)),
        Value::Object(map) => map.values().any(|v| value_contains(v, needle)),
        _ => false,
    }
}

fn matching_line(content: &str, needle: &str) -> Option<String> {
    let line = content
        .lines()
        .find(|line| line.to_lowercase().contains(needle))?
        .trim();
    if line.chars().count() <= SNIPPET_CHARS {
        Some(line.to_string())
    } else {
        let cut: String = line.chars().take(SNIPPET_CHARS).collect();
        Some(format!("{cut}…"))
    }
}
