use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use notebridge_cache::{RefreshOutcome, RefreshStats, SearchOptions, VaultCache};
use notebridge_core::{CacheConfig, NoteMetadata, WriteCapabilities};
use notebridge_vault::{FsNoteSource, VaultEvent, VaultWatcher};

pub struct Context {
    pub cache: Arc<VaultCache>,
    root: PathBuf,
}

impl Context {
    pub fn open(vault: &Path, config: CacheConfig) -> anyhow::Result<Self> {
        if !vault.is_dir() {
            bail!("vault directory not found: {}", vault.display());
        }
        let source = Arc::new(FsNoteSource::new(vault));
        let cache = VaultCache::new(source.clone(), WriteCapabilities::full(source), config);
        Ok(Self {
            cache,
            root: vault.to_path_buf(),
        })
    }

    async fn build(&self) -> anyhow::Result<RefreshStats> {
        match self.cache.build_vault_cache().await {
            RefreshOutcome::Completed(stats) => Ok(stats),
            RefreshOutcome::Failed(reason) => bail!("cache build failed: {reason}"),
            RefreshOutcome::Skipped => self
                .cache
                .last_refresh_stats()
                .context("cache build was skipped before any pass completed"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn sorted_notes(cache: &VaultCache) -> Vec<NoteMetadata> {
    let mut notes: Vec<NoteMetadata> = cache
        .get_all_metadata()
        .into_values()
        .map(|meta| (*meta).clone())
        .collect();
    notes.sort_by(|a, b| a.path.cmp(&b.path));
    notes
}

pub async fn scan(ctx: &Context, include_notes: bool) -> anyhow::Result<()> {
    let stats = ctx.build().await?;
    let mut output = json!({
        "vault": ctx.root.display().to_string(),
        "stats": stats,
        "status": ctx.cache.status(),
        "issues": ctx.cache.get_diagnostics(),
    });
    if include_notes {
        output["notes"] = serde_json::to_value(sorted_notes(&ctx.cache))?;
    }
    print_json(&output)
}

pub async fn search(ctx: &Context, query: &str, limit: usize, include_content: bool) -> anyhow::Result<()> {
    ctx.build().await?;
    let hits = ctx.cache.search(
        query,
        &SearchOptions {
            limit,
            include_content,
        },
    )?;
    print_json(&hits)
}

pub async fn tag(ctx: &Context, tag: &str) -> anyhow::Result<()> {
    ctx.build().await?;
    let notes = ctx.cache.notes_with_tag(tag);
    let notes: Vec<&NoteMetadata> = notes.iter().map(Arc::as_ref).collect();
    print_json(&notes)
}

pub async fn cat(ctx: &Context, path: &str) -> anyhow::Result<()> {
    let content = ctx
        .cache
        .get_content(path)
        .await
        .with_context(|| format!("cannot read {path}"))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn emit_line(value: &serde_json::Value) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{value}")?;
    stdout.flush()?;
    Ok(())
}

pub async fn watch(ctx: &Context, max_events: Option<usize>) -> anyhow::Result<()> {
    let mut watcher = VaultWatcher::start(&ctx.root)?;
    let stats = ctx.build().await?;
    ctx.cache.start_periodic_refresh();
    emit_line(&json!({"event": "ready", "notes": stats.total}))?;

    let mut seen = 0usize;
    loop {
        let event = tokio::select! {
            event = watcher.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        };

        let kind = match &event {
            VaultEvent::Changed(_) => "changed",
            VaultEvent::Removed(_) => "removed",
        };
        ctx.cache.update_cache_for_file(event.path());
        emit_line(&json!({"event": kind, "path": event.path()}))?;

        seen += 1;
        if max_events.is_some_and(|max| seen >= max) {
            break;
        }
    }

    ctx.cache.dispose();
    Ok(())
}
