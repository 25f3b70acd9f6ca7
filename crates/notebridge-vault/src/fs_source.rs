//! A [`NoteSource`] over a local directory.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use notebridge_core::frontmatter::{parse_frontmatter, render_frontmatter};
use notebridge_core::path::normalize_path;
use notebridge_core::tags::extract_inline_tags;
use notebridge_core::{
    ContentRewriter, FrontmatterUpserter, NoteSource, ParsedFrontmatter, RawStat, SourceError,
    StructuredNote,
};

/// Serves notes from `root`. Hidden entries (leading `.`) are never listed.
#[derive(Debug, Clone)]
pub struct FsNoteSource {
    root: PathBuf,
}

impl FsNoteSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path onto the filesystem, refusing to leave the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, SourceError> {
        let normalized = normalize_path(path);
        if normalized.split('/').any(|seg| seg == "..") {
            return Err(SourceError::Validation(format!("path escapes vault: {path}")));
        }
        Ok(normalized
            .split('/')
            .filter(|seg| !seg.is_empty())
            .fold(self.root.clone(), |acc, seg| acc.join(seg)))
    }

    async fn stat(&self, path: &str) -> Result<RawStat, SourceError> {
        let meta = tokio::fs::metadata(self.resolve(path)?)
            .await
            .map_err(|e| io_error(path, &e))?;
        if !meta.is_file() {
            return Err(SourceError::NotFound(path.to_string()));
        }
        Ok(RawStat {
            mtime: meta.modified().ok().and_then(epoch_ms),
            ctime: meta.created().ok().and_then(epoch_ms),
            size: Some(meta.len()),
        })
    }

    async fn read(&self, path: &str) -> Result<String, SourceError> {
        tokio::fs::read_to_string(self.resolve(path)?)
            .await
            .map_err(|e| io_error(path, &e))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), SourceError> {
        let target = self.resolve(path)?;
        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(SourceError::NotFound(path.to_string()));
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| io_error(path, &e))?;
        debug!(path, bytes = content.len(), "wrote note");
        Ok(())
    }
}

fn epoch_ms(time: SystemTime) -> Option<i64> {
    let elapsed = time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(elapsed.as_millis()).ok()
}

fn io_error(path: &str, e: &io::Error) -> SourceError {
    match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
        io::ErrorKind::TimedOut => SourceError::Timeout(format!("{path}: {e}")),
        io::ErrorKind::InvalidData => SourceError::Validation(format!("{path}: {e}")),
        _ => SourceError::Other(format!("{path}: {e}")),
    }
}

#[async_trait]
impl NoteSource for FsNoteSource {
    async fn list_directory(&self, path: &str) -> Result<Vec<String>, SourceError> {
        let dir = self.resolve(path)?;
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_error(path, &e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(path, &e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let kind = entry.file_type().await.map_err(|e| io_error(path, &e))?;
            if kind.is_dir() {
                entries.push(format!("{name}/"));
            } else {
                entries.push(name);
            }
        }
        entries.sort();
        Ok(entries)
    }

    async fn get_metadata(&self, path: &str) -> Result<Option<RawStat>, SourceError> {
        self.stat(path).await.map(Some)
    }

    /// Unparsable frontmatter is reported as a validation failure so the
    /// cache falls back to reading the raw markdown.
    async fn get_structured_note(&self, path: &str) -> Result<StructuredNote, SourceError> {
        let content = self.read(path).await?;
        let stat = self.stat(path).await?;

        let (frontmatter, tags) = match parse_frontmatter(&content) {
            ParsedFrontmatter::Parsed { frontmatter, body } => {
                (Value::Object(frontmatter), extract_inline_tags(&body))
            }
            ParsedFrontmatter::Missing { body } => (Value::Null, extract_inline_tags(&body)),
            ParsedFrontmatter::Failed { reason, .. } => {
                return Err(SourceError::Validation(format!("{path}: {reason}")));
            }
        };

        Ok(StructuredNote {
            path: Some(normalize_path(path)),
            content: Some(content),
            frontmatter,
            tags: Value::Array(tags.into_iter().map(Value::String).collect()),
            stat: Some(stat),
        })
    }

    async fn get_raw_content(&self, path: &str) -> Result<String, SourceError> {
        self.read(path).await
    }
}

#[async_trait]
impl ContentRewriter for FsNoteSource {
    async fn rewrite_content(&self, path: &str, body: &str) -> Result<(), SourceError> {
        self.write(path, body).await
    }
}

#[async_trait]
impl FrontmatterUpserter for FsNoteSource {
    async fn upsert_frontmatter(
        &self,
        path: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SourceError> {
        let parsed = parse_frontmatter(&self.read(path).await?);
        let mut frontmatter = parsed.frontmatter();
        for (key, value) in fields {
            frontmatter.insert(key.clone(), value.clone());
        }
        let content = render_frontmatter(&frontmatter, parsed.body())
            .map_err(|e| SourceError::Validation(e.to_string()))?;
        self.write(path, &content).await
    }
}
