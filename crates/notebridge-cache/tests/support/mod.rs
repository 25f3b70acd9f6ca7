//! In-memory note source with scripted failures, call accounting and
//! write capture.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use notebridge_cache::VaultCache;
use notebridge_core::frontmatter::{parse_frontmatter, render_frontmatter};
use notebridge_core::path::normalize_path;
use notebridge_core::tags::extract_inline_tags;
use notebridge_core::{
    CacheConfig, ContentRewriter, FrontmatterUpserter, NoteSource, RawStat, SourceError,
    StructuredNote, WriteCapabilities,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Stat,
    Structured,
    Raw,
    Write,
}

#[derive(Debug, Clone)]
struct MemFile {
    content: String,
    mtime: i64,
    ctime: i64,
}

struct Failure {
    op: Op,
    path: String,
    error: SourceError,
    remaining: Option<usize>,
}

#[derive(Default)]
pub struct MemorySource {
    files: Mutex<BTreeMap<String, MemFile>>,
    listings: Mutex<HashMap<String, Vec<String>>>,
    structured: Mutex<HashMap<String, StructuredNote>>,
    failures: Mutex<Vec<Failure>>,
    calls: Mutex<Vec<(Op, String)>>,
    writes: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    clock: AtomicI64,
    latency: Mutex<Duration>,
}

impl MemorySource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clock: AtomicI64::new(1_700_000_000_000),
            ..Self::default()
        })
    }

    pub fn with_files(files: &[(&str, &str)]) -> Arc<Self> {
        let source = Self::new();
        for (path, content) in files {
            source.put(path, content);
        }
        source
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1_000, Ordering::SeqCst) + 1_000
    }

    /// Create or overwrite a file with a fresh mtime.
    pub fn put(&self, path: &str, content: &str) {
        let path = normalize_path(path);
        let now = self.tick();
        let mut files = self.files.lock().unwrap();
        let ctime = files.get(&path).map_or(now, |f| f.ctime);
        files.insert(
            path,
            MemFile {
                content: content.to_string(),
                mtime: now,
                ctime,
            },
        );
    }

    /// Change content without touching mtime.
    pub fn put_silently(&self, path: &str, content: &str) {
        let mut files = self.files.lock().unwrap();
        if let Some(file) = files.get_mut(path) {
            file.content = content.to_string();
        }
    }

    pub fn delete(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn content_of(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).map(|f| f.content.clone())
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Serve `entries` verbatim when `dir` is listed.
    pub fn set_listing(&self, dir: &str, entries: &[&str]) {
        self.listings.lock().unwrap().insert(
            dir.to_string(),
            entries.iter().map(|e| (*e).to_string()).collect(),
        );
    }

    /// Serve `note` instead of the derived structured note for `path`.
    pub fn set_structured(&self, path: &str, note: StructuredNote) {
        self.structured.lock().unwrap().insert(path.to_string(), note);
    }

    /// Fail every `op` on `path` with `error`.
    pub fn fail(&self, op: Op, path: &str, error: SourceError) {
        self.push_failure(op, path, error, None);
    }

    /// Fail the next `times` calls of `op` on `path`.
    pub fn fail_times(&self, op: Op, path: &str, error: SourceError, times: usize) {
        self.push_failure(op, path, error, Some(times));
    }

    fn push_failure(&self, op: Op, path: &str, error: SourceError, remaining: Option<usize>) {
        self.failures.lock().unwrap().push(Failure {
            op,
            path: path.to_string(),
            error,
            remaining,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn call_count(&self, op: Op, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, p)| *o == op && p == path)
            .count()
    }

    pub fn calls_of(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|(o, _)| *o == op).count()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: Op, path: &str) -> Result<(), SourceError> {
        self.calls.lock().unwrap().push((op, path.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.scripted_failure(op, path)
    }

    fn scripted_failure(&self, op: Op, path: &str) -> Result<(), SourceError> {
        let mut failures = self.failures.lock().unwrap();
        let Some(failure) = failures
            .iter_mut()
            .find(|f| f.op == op && f.path == path && f.remaining != Some(0))
        else {
            return Ok(());
        };
        if let Some(left) = failure.remaining.as_mut() {
            *left -= 1;
        }
        Err(failure.error.clone())
    }

    fn file(&self, path: &str) -> Result<MemFile, SourceError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_string()))
    }

    fn derived_listing(&self, dir: &str) -> Option<Vec<String>> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let files = self.files.lock().unwrap();
        let mut entries = BTreeSet::new();
        for path in files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => entries.insert(format!("{sub}/")),
                None => entries.insert(rest.to_string()),
            };
        }
        if entries.is_empty() && !dir.is_empty() {
            None
        } else {
            Some(entries.into_iter().collect())
        }
    }

    fn bump(&self, path: &str, content: String) -> Result<(), SourceError> {
        let now = self.tick();
        let mut files = self.files.lock().unwrap();
        let file = files
            .get_mut(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;
        file.content = content.clone();
        file.mtime = now;
        self.writes.lock().unwrap().push((path.to_string(), content));
        Ok(())
    }
}

#[async_trait]
impl NoteSource for MemorySource {
    async fn list_directory(&self, path: &str) -> Result<Vec<String>, SourceError> {
        self.enter(Op::List, path).await?;
        if let Some(entries) = self.listings.lock().unwrap().get(path) {
            return Ok(entries.clone());
        }
        self.derived_listing(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))
    }

    async fn get_metadata(&self, path: &str) -> Result<Option<RawStat>, SourceError> {
        self.enter(Op::Stat, path).await?;
        let file = self.file(path)?;
        Ok(Some(RawStat {
            mtime: Some(file.mtime),
            ctime: Some(file.ctime),
            size: Some(file.content.len() as u64),
        }))
    }

    async fn get_structured_note(&self, path: &str) -> Result<StructuredNote, SourceError> {
        self.enter(Op::Structured, path).await?;
        if let Some(note) = self.structured.lock().unwrap().get(path) {
            return Ok(note.clone());
        }
        let file = self.file(path)?;
        let parsed = parse_frontmatter(&file.content);
        let tags = extract_inline_tags(parsed.body())
            .into_iter()
            .map(Value::String)
            .collect();
        Ok(StructuredNote {
            path: Some(path.to_string()),
            frontmatter: Value::Object(parsed.frontmatter()),
            tags: Value::Array(tags),
            stat: Some(RawStat {
                mtime: Some(file.mtime),
                ctime: Some(file.ctime),
                size: Some(file.content.len() as u64),
            }),
            content: Some(file.content),
        })
    }

    async fn get_raw_content(&self, path: &str) -> Result<String, SourceError> {
        self.enter(Op::Raw, path).await?;
        Ok(self.file(path)?.content)
    }
}

#[async_trait]
impl ContentRewriter for MemorySource {
    async fn rewrite_content(&self, path: &str, body: &str) -> Result<(), SourceError> {
        self.enter(Op::Write, path).await?;
        self.bump(path, body.to_string())
    }
}

#[async_trait]
impl FrontmatterUpserter for MemorySource {
    async fn upsert_frontmatter(
        &self,
        path: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SourceError> {
        self.enter(Op::Write, path).await?;
        let parsed = parse_frontmatter(&self.file(path)?.content);
        let mut frontmatter = parsed.frontmatter();
        for (key, value) in fields {
            frontmatter.insert(key.clone(), value.clone());
        }
        let content = render_frontmatter(&frontmatter, parsed.body())
            .map_err(|e| SourceError::Other(e.to_string()))?;
        self.bump(path, content)
    }
}

/// Config with no retry delay so tests do not depend on timer behavior.
pub fn test_config() -> CacheConfig {
    CacheConfig {
        retry_attempts: 2,
        retry_delay: Duration::ZERO,
        ..CacheConfig::default()
    }
}

pub fn read_only(source: &Arc<MemorySource>, config: CacheConfig) -> Arc<VaultCache> {
    VaultCache::new(source.clone(), WriteCapabilities::none(), config)
}

pub fn writable(source: &Arc<MemorySource>, config: CacheConfig) -> Arc<VaultCache> {
    VaultCache::new(source.clone(), WriteCapabilities::full(source.clone()), config)
}
