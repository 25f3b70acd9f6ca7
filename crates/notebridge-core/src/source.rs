//! The note source seen from the cache: a black-box collaborator.
//!
//! The remote note API (HTTP client, path encoding, PATCH headers) lives
//! outside this workspace. The cache only needs the reads below plus two
//! optional write capabilities used to apply repairs.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::SourceError;
use crate::note::{RawStat, StructuredNote};

/// Read access to the remote vault.
///
/// Implementations must be `Send + Sync`; the cache calls them from many
/// concurrent refresh futures.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// List one directory. Subdirectory entries end with `/`.
    ///
    /// Returns [`SourceError::NotFound`] when the directory does not exist.
    async fn list_directory(&self, path: &str) -> Result<Vec<String>, SourceError>;

    /// Lightweight stat for a file, `None` when the source has none to give.
    async fn get_metadata(&self, path: &str) -> Result<Option<RawStat>, SourceError>;

    /// Canonical structured note: content, frontmatter, tags and stat.
    async fn get_structured_note(&self, path: &str) -> Result<StructuredNote, SourceError>;

    /// Raw markdown text of a file.
    async fn get_raw_content(&self, path: &str) -> Result<String, SourceError>;
}

/// Replace a file's entire content.
#[async_trait]
pub trait ContentRewriter: Send + Sync {
    async fn rewrite_content(&self, path: &str, body: &str) -> Result<(), SourceError>;
}

/// Set individual frontmatter fields, leaving the rest of the file alone.
#[async_trait]
pub trait FrontmatterUpserter: Send + Sync {
    async fn upsert_frontmatter(
        &self,
        path: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SourceError>;
}

/// Optional write slots injected into the cache at construction.
///
/// With neither slot filled, repairs degrade to report-only.
#[derive(Clone, Default)]
pub struct WriteCapabilities {
    pub rewrite: Option<Arc<dyn ContentRewriter>>,
    pub upsert_frontmatter: Option<Arc<dyn FrontmatterUpserter>>,
}

impl WriteCapabilities {
    /// No write access.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Fill both slots from one writer.
    #[must_use]
    pub fn full<W>(writer: Arc<W>) -> Self
    where
        W: ContentRewriter + FrontmatterUpserter + 'static,
    {
        Self {
            rewrite: Some(writer.clone()),
            upsert_frontmatter: Some(writer),
        }
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.rewrite.is_some() || self.upsert_frontmatter.is_some()
    }
}

impl fmt::Debug for WriteCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteCapabilities")
            .field("rewrite", &self.rewrite.is_some())
            .field("upsert_frontmatter", &self.upsert_frontmatter.is_some())
            .finish()
    }
}
