//! The vault cache service: refresh orchestration, post-write updates,
//! periodic scheduling and read accessors.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use notebridge_core::config::MAX_REFRESH_INTERVAL;
use notebridge_core::frontmatter::parse_frontmatter;
use notebridge_core::path::normalize_path;
use notebridge_core::{CacheConfig, NoteMetadata, NoteSource, RawStat, SourceError, WriteCapabilities};

use crate::content::ContentCache;
use crate::diagnostics::{DiagnosticsLog, Issue, IssueKind};
use crate::index::MetadataIndex;
use crate::limiter::run_limited;
use crate::normalize;
use crate::retry::RetryPolicy;
use crate::walk::list_markdown_files;

/// Lifecycle of the cache as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Never built, or disposed.
    Idle,
    /// First build in progress; readers should not trust the cache yet.
    Building,
    /// A later pass is running; the previous index stays servable.
    Refreshing,
    Ready,
}

/// Counters for one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    /// Markdown files found at the source.
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Files whose cached mtime was already current.
    pub skipped: usize,
    /// Files indexed through the markdown recovery path.
    pub recovered: usize,
    /// Files that could not be read at all.
    pub failed: usize,
    pub repairs_planned: usize,
    pub repairs_applied: usize,
    pub elapsed_ms: u64,
}

/// Result of [`VaultCache::refresh_cache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(RefreshStats),
    /// Another pass was already running.
    Skipped,
    Failed(String),
}

impl RefreshOutcome {
    #[must_use]
    pub fn stats(&self) -> Option<&RefreshStats> {
        match self {
            Self::Completed(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Result of a single-file update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileUpdate {
    Updated,
    /// The source no longer has the file; both caches dropped it.
    Removed,
}

/// Point-in-time summary for status tools.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub state: CacheState,
    pub ready: bool,
    pub building: bool,
    pub indexed_notes: usize,
    pub cached_contents: usize,
    pub files_with_issues: usize,
    pub periodic_refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<RefreshStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    Added,
    Updated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RepairStatus {
    NotPlanned,
    Planned,
    Applied,
}

pub(crate) struct FileReport {
    change: Change,
    recovered: bool,
    repair: RepairStatus,
}

impl FileReport {
    fn new(change: Change) -> Self {
        Self {
            change,
            recovered: false,
            repair: RepairStatus::NotPlanned,
        }
    }
}

#[derive(Default)]
struct PassCounters {
    added: AtomicUsize,
    updated: AtomicUsize,
    skipped: AtomicUsize,
    recovered: AtomicUsize,
    failed: AtomicUsize,
    repairs_planned: AtomicUsize,
    repairs_applied: AtomicUsize,
}

impl PassCounters {
    fn record(&self, report: &FileReport) {
        let counter = match report.change {
            Change::Added => &self.added,
            Change::Updated => &self.updated,
            Change::Skipped => &self.skipped,
            Change::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if report.recovered {
            self.recovered.fetch_add(1, Ordering::Relaxed);
        }
        match report.repair {
            RepairStatus::NotPlanned => {}
            RepairStatus::Planned => {
                self.repairs_planned.fetch_add(1, Ordering::Relaxed);
            }
            RepairStatus::Applied => {
                self.repairs_planned.fetch_add(1, Ordering::Relaxed);
                self.repairs_applied.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn fill(&self, stats: &mut RefreshStats) {
        stats.added = self.added.load(Ordering::Relaxed);
        stats.updated = self.updated.load(Ordering::Relaxed);
        stats.skipped = self.skipped.load(Ordering::Relaxed);
        stats.recovered = self.recovered.load(Ordering::Relaxed);
        stats.failed = self.failed.load(Ordering::Relaxed);
        stats.repairs_planned = self.repairs_planned.load(Ordering::Relaxed);
        stats.repairs_applied = self.repairs_applied.load(Ordering::Relaxed);
    }
}

/// Clears the re-entrancy flag when a pass ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process, self-healing cache in front of a [`NoteSource`].
///
/// Owns the [`MetadataIndex`], [`ContentCache`] and [`DiagnosticsLog`];
/// callers only ever get snapshots or cloned values back.
pub struct VaultCache {
    pub(crate) source: Arc<dyn NoteSource>,
    pub(crate) writers: WriteCapabilities,
    pub(crate) config: CacheConfig,
    pub(crate) retry: RetryPolicy,
    pub(crate) index: MetadataIndex,
    pub(crate) content: ContentCache,
    pub(crate) diagnostics: DiagnosticsLog,
    ready: AtomicBool,
    building: AtomicBool,
    refreshing: AtomicBool,
    /// Bumped by every `dispose`; a pass started under an older value is discarded.
    generation: AtomicU64,
    pub(crate) repair_budget: AtomicUsize,
    last_stats: Mutex<Option<RefreshStats>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl VaultCache {
    /// Create an empty, unready cache.
    #[must_use]
    pub fn new(
        source: Arc<dyn NoteSource>,
        writers: WriteCapabilities,
        config: CacheConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            writers,
            retry: RetryPolicy::from(&config),
            index: MetadataIndex::new(),
            content: ContentCache::new(config.content_max_items, config.content_ttl),
            diagnostics: DiagnosticsLog::new(),
            ready: AtomicBool::new(false),
            building: AtomicBool::new(false),
            refreshing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            repair_budget: AtomicUsize::new(config.max_repairs_per_run),
            last_stats: Mutex::new(None),
            timer: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // === State ===

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CacheState {
        if self.is_building() {
            CacheState::Building
        } else if self.is_ready() && self.refreshing.load(Ordering::Acquire) {
            CacheState::Refreshing
        } else if self.is_ready() {
            CacheState::Ready
        } else {
            CacheState::Idle
        }
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            state: self.state(),
            ready: self.is_ready(),
            building: self.is_building(),
            indexed_notes: self.index.len(),
            cached_contents: self.content.len(),
            files_with_issues: self.diagnostics.file_count(),
            periodic_refresh: lock(&self.timer)
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
            last_refresh: self.last_refresh_stats(),
        }
    }

    pub fn last_refresh_stats(&self) -> Option<RefreshStats> {
        lock(&self.last_stats).clone()
    }

    // === Read accessors ===

    /// Metadata for one note, or `None` when the index has no entry.
    pub fn get_metadata(&self, path: &str) -> Option<Arc<NoteMetadata>> {
        self.index.get(&normalize_path(path))
    }

    /// Read-only snapshot of the whole index.
    pub fn get_all_metadata(&self) -> HashMap<String, Arc<NoteMetadata>> {
        self.index.snapshot()
    }

    /// Cache-through content read.
    ///
    /// # Errors
    ///
    /// Returns the source error when the content is not cached and the
    /// fetch fails (including [`SourceError::NotFound`] for deleted files).
    pub async fn get_content(&self, path: &str) -> Result<String, SourceError> {
        let path = normalize_path(path);
        self.content
            .get_or_fetch(&path, || {
                self.retry.run(|| self.source.get_raw_content(&path))
            })
            .await
    }

    /// Whether unexpired content for `path` is held in memory.
    pub fn is_content_cached(&self, path: &str) -> bool {
        self.content.contains(&normalize_path(path))
    }

    /// Issues recorded during the latest refresh, by path.
    pub fn get_diagnostics(&self) -> BTreeMap<String, Vec<Issue>> {
        self.diagnostics.snapshot()
    }

    // === Refresh ===

    /// Run the first build unless the cache is already ready or building.
    pub async fn build_vault_cache(&self) -> RefreshOutcome {
        if self.is_ready() || self.is_building() {
            debug!("vault cache already built or building");
            return RefreshOutcome::Skipped;
        }
        self.refresh_cache(true).await
    }

    /// One full refresh pass. At most one pass runs at a time; a call made
    /// while another is in flight returns [`RefreshOutcome::Skipped`].
    pub async fn refresh_cache(&self, is_initial_build: bool) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            info!("vault cache refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        };

        if is_initial_build {
            self.building.store(true, Ordering::Release);
            info!("building vault cache");
        } else {
            debug!("refreshing vault cache");
        }

        let generation = self.generation.load(Ordering::Acquire);
        let started = Instant::now();
        self.diagnostics.reset();
        let result = self.run_pass().await;
        self.building.store(false, Ordering::Release);

        if self.generation.load(Ordering::Acquire) != generation {
            self.index.clear();
            self.content.clear();
            self.diagnostics.reset();
            info!("vault cache disposed during refresh, discarding pass");
            return RefreshOutcome::Failed("vault cache disposed during refresh".to_string());
        }

        match result {
            Ok(mut stats) => {
                stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.ready.store(true, Ordering::Release);
                info!(
                    total = stats.total,
                    added = stats.added,
                    updated = stats.updated,
                    removed = stats.removed,
                    skipped = stats.skipped,
                    recovered = stats.recovered,
                    failed = stats.failed,
                    repairs_applied = stats.repairs_applied,
                    elapsed_ms = stats.elapsed_ms,
                    "vault cache refresh complete"
                );
                *lock(&self.last_stats) = Some(stats.clone());
                RefreshOutcome::Completed(stats)
            }
            Err(e) => {
                error!(error = %e, initial = is_initial_build, "vault cache refresh failed");
                if is_initial_build {
                    self.ready.store(false, Ordering::Release);
                }
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_pass(&self) -> Result<RefreshStats, SourceError> {
        let mut visited = HashSet::new();
        let remote = list_markdown_files(self.source.as_ref(), "", &mut visited, &self.retry).await?;

        let mut stats = RefreshStats {
            total: remote.len(),
            ..RefreshStats::default()
        };

        // Tombstones complete before any per-file fetch starts.
        let remote_set: HashSet<&str> = remote.iter().map(String::as_str).collect();
        for path in self.index.keys() {
            if !remote_set.contains(path.as_str()) {
                debug!(path = %path, "file gone from source, removing");
                self.index.remove(&path);
                self.content.remove(&path);
                stats.removed += 1;
            }
        }

        self.repair_budget
            .store(self.config.max_repairs_per_run, Ordering::Release);

        let counters = PassCounters::default();
        run_limited(self.config.refresh_concurrency, remote.iter().cloned(), |path| {
            let counters = &counters;
            async move {
                let report = self.process_file(&path).await;
                counters.record(&report);
            }
        })
        .await;

        counters.fill(&mut stats);
        Ok(stats)
    }

    async fn process_file(&self, path: &str) -> FileReport {
        let cached = self.index.get(path);

        let remote_stat = match self.retry.run(|| self.source.get_metadata(path)).await {
            Ok(stat) => stat,
            Err(e) => {
                debug!(path, error = %e, "stat fetch failed, refreshing file");
                None
            }
        };

        // Strict comparison: equal mtimes keep the cached entry.
        if let (Some(cached), Some(remote_mtime)) = (&cached, remote_stat.and_then(|s| s.mtime)) {
            if cached.stat.mtime >= remote_mtime {
                return FileReport::new(Change::Skipped);
            }
        }

        let fallback_stat = remote_stat
            .unwrap_or_default()
            .or(cached.as_ref().map(|c| RawStat::from(c.stat)).unwrap_or_default());
        let existed = cached.is_some();

        let note = match self.retry.run(|| self.source.get_structured_note(path)).await {
            Ok(note) if note.is_valid() => note,
            Ok(_) => {
                self.diagnostics.record(
                    path,
                    IssueKind::InvalidNotejson,
                    Some("structured note has no path".to_string()),
                );
                return self.recover_file(path, fallback_stat, existed).await;
            }
            Err(e) => {
                debug!(path, error = %e, "structured fetch failed, trying markdown recovery");
                self.diagnostics
                    .record(path, IssueKind::MissingNotejson, Some(e.to_string()));
                return self.recover_file(path, fallback_stat, existed).await;
            }
        };

        let metadata = normalize::from_structured(
            path,
            &note,
            fallback_stat,
            self.config.lowercase_tags,
            &self.diagnostics,
        );
        let tags = metadata.tags.clone();
        let previous = self.index.set(metadata);

        let mut report = FileReport::new(if previous.is_some() {
            Change::Updated
        } else {
            Change::Added
        });

        if let Some(content) = note.content {
            let parsed = parse_frontmatter(&content);
            self.content.insert(path, content);
            report.repair = self.evaluate_repair(path, &parsed, &tags).await;
        }
        report
    }

    async fn recover_file(&self, path: &str, fallback_stat: RawStat, existed: bool) -> FileReport {
        match self.recover_from_markdown(path, fallback_stat).await {
            Ok((metadata, parsed)) => {
                let tags = metadata.tags.clone();
                let previous = self.index.set(metadata);
                let mut report = FileReport::new(if previous.is_some() {
                    Change::Updated
                } else {
                    Change::Added
                });
                report.recovered = true;
                report.repair = self.evaluate_repair(path, &parsed, &tags).await;
                report
            }
            Err(e) => {
                warn!(path, error = %e, retained = existed, "could not read file, keeping previous entry");
                self.diagnostics
                    .record(path, IssueKind::FetchError, Some(e.to_string()));
                FileReport::new(Change::Failed)
            }
        }
    }

    // === Post-write consistency ===

    /// Fire-and-forget refresh of one file after a write.
    ///
    /// The content entry is invalidated before this returns; the metadata
    /// refetch runs on a background task whose failures are logged and
    /// swallowed. Never blocks, never propagates errors.
    pub fn update_cache_for_file(self: &Arc<Self>, path: &str) {
        let path = normalize_path(path);
        self.content.remove(&path);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(path = %path, "no async runtime, skipping proactive cache update");
            return;
        };
        let cache = Arc::clone(self);
        handle.spawn(async move {
            match cache.refresh_file(&path).await {
                Ok(update) => debug!(path = %path, ?update, "proactive cache update done"),
                Err(e) => warn!(path = %path, error = %e, "proactive cache update failed, keeping stale entry"),
            }
        });
    }

    /// Refetch one file and replace its index entry, pre-warming content.
    ///
    /// A `NotFound` answer drops the file from both caches. Any other
    /// failure leaves the existing entry in place.
    ///
    /// # Errors
    ///
    /// Returns the source error, or [`SourceError::Validation`] when the
    /// structured note is malformed.
    pub async fn refresh_file(&self, path: &str) -> Result<FileUpdate, SourceError> {
        let path = normalize_path(path);
        self.content.remove(&path);

        match self.retry.run(|| self.source.get_structured_note(&path)).await {
            Ok(note) if note.is_valid() => {
                let fallback = self
                    .index
                    .get(&path)
                    .map(|c| RawStat::from(c.stat))
                    .unwrap_or_default();
                let metadata = normalize::from_structured(
                    &path,
                    &note,
                    fallback,
                    self.config.lowercase_tags,
                    &self.diagnostics,
                );
                self.index.set(metadata);
                if let Some(content) = note.content {
                    self.content.insert(&path, content);
                }
                Ok(FileUpdate::Updated)
            }
            Ok(_) => Err(SourceError::Validation(format!(
                "structured note for {path} has no path"
            ))),
            Err(e) if e.is_not_found() => {
                self.index.remove(&path);
                self.content.remove(&path);
                Ok(FileUpdate::Removed)
            }
            Err(e) => Err(e),
        }
    }

    // === Scheduling ===

    /// Start refreshing every `refresh_interval`, clamped between one second
    /// and one week. No-op with a warning when already scheduled.
    pub fn start_periodic_refresh(self: &Arc<Self>) {
        let mut timer = lock(&self.timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("periodic vault cache refresh already scheduled");
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, periodic refresh not started");
            return;
        };

        let period = self
            .config
            .refresh_interval
            .clamp(Duration::from_secs(1), MAX_REFRESH_INTERVAL);
        let cache = Arc::downgrade(self);
        *timer = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.refresh_cache(false).await;
            }
        }));
        info!(interval_secs = period.as_secs(), "periodic vault cache refresh started");
    }

    /// Stop the periodic refresh. Safe to call when not running.
    pub fn stop_periodic_refresh(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
            info!("periodic vault cache refresh stopped");
        }
    }

    /// Stop the timer and drop every cached value and issue. The cache is
    /// unready afterwards, and a pass still in flight discards its results
    /// when it finishes.
    pub fn dispose(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.stop_periodic_refresh();
        self.index.clear();
        self.content.clear();
        self.diagnostics.reset();
        *lock(&self.last_stats) = None;
        self.ready.store(false, Ordering::Release);
        self.building.store(false, Ordering::Release);
        info!("vault cache disposed");
    }

    /// Configured period between periodic refreshes.
    pub fn refresh_interval(&self) -> Duration {
        self.config.refresh_interval
    }
}

impl Drop for VaultCache {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}
