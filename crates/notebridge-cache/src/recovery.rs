//! Markdown recovery path and repair application.

use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use notebridge_core::frontmatter::parse_frontmatter;
use notebridge_core::tags::{extract_inline_tags, frontmatter_tags};
use notebridge_core::{NoteMetadata, ParsedFrontmatter, RawStat, SourceError};

use crate::diagnostics::IssueKind;
use crate::normalize::{choose_tags, complete_stat};
use crate::repair::{plan_repair, RepairPlan};
use crate::service::{RepairStatus, VaultCache};

impl VaultCache {
    /// Build metadata straight from the raw markdown when the structured
    /// note is unavailable or malformed.
    ///
    /// Frontmatter tags win when present and non-empty; inline `#tags` in
    /// the body fill in otherwise. The fetched text pre-warms the content
    /// cache.
    pub(crate) async fn recover_from_markdown(
        &self,
        path: &str,
        fallback_stat: RawStat,
    ) -> Result<(NoteMetadata, ParsedFrontmatter), SourceError> {
        let raw = self.retry.run(|| self.source.get_raw_content(path)).await?;
        let parsed = parse_frontmatter(&raw);

        match &parsed {
            ParsedFrontmatter::Parsed { .. } => {}
            ParsedFrontmatter::Missing { .. } => {
                self.diagnostics.record(path, IssueKind::MissingFrontmatter, None);
            }
            ParsedFrontmatter::Failed { reason, .. } => {
                self.diagnostics
                    .record(path, IssueKind::ParseError, Some(reason.clone()));
            }
        }

        let frontmatter = parsed.frontmatter();
        let fm_tags = frontmatter_tags(&frontmatter);
        if fm_tags.is_not_array() {
            self.diagnostics.record(
                path,
                IssueKind::TagsNotArray,
                Some("frontmatter tags is not an array".to_string()),
            );
        }
        let inline = extract_inline_tags(parsed.body());
        let tags = choose_tags(&fm_tags, &inline, self.config.lowercase_tags);
        let stat = complete_stat(path, fallback_stat, raw.len() as u64, &self.diagnostics);

        debug!(path, tags = tags.len(), "recovered metadata from markdown");
        self.content.insert(path, raw);
        Ok((NoteMetadata::new(path.to_string(), frontmatter, tags, stat), parsed))
    }

    /// Plan a repair for one file and apply it if the run's budget allows.
    ///
    /// Once the budget is spent no further files are evaluated in this pass.
    /// A budget slot is reserved before applying and handed back when the
    /// write does not happen, so concurrent workers never exceed
    /// `max_repairs_per_run`.
    pub(crate) async fn evaluate_repair(
        &self,
        path: &str,
        parsed: &ParsedFrontmatter,
        chosen_tags: &[String],
    ) -> RepairStatus {
        if !self.config.repair_enabled {
            return RepairStatus::NotPlanned;
        }
        if self.repair_budget.load(Ordering::Acquire) == 0 {
            debug!(path, "repair budget exhausted for this run");
            return RepairStatus::NotPlanned;
        }
        let Some(plan) = plan_repair(path, parsed, chosen_tags) else {
            return RepairStatus::NotPlanned;
        };

        let reserved = self
            .repair_budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok();
        if !reserved {
            debug!(path, "repair budget exhausted for this run");
            return RepairStatus::Planned;
        }

        if self.apply_repair(&plan).await {
            RepairStatus::Applied
        } else {
            self.repair_budget.fetch_add(1, Ordering::AcqRel);
            RepairStatus::Planned
        }
    }

    /// Write a repair plan back to the source.
    ///
    /// Returns `false` without writing when repair is disabled or in dry-run
    /// mode. Prefers a full rewrite, falls back to a frontmatter upsert, and
    /// records `REPAIR_FAILED` when neither capability is available or the
    /// write fails. After a successful write the file is re-read so the
    /// index reflects what was written.
    pub async fn apply_repair(&self, plan: &RepairPlan) -> bool {
        if !self.config.repair_enabled {
            return false;
        }
        let path = plan.file_path.as_str();
        if self.config.repair_dry_run {
            warn!(path, actions = %plan.summary(), "dry run: would repair note");
            return false;
        }

        let written = match (&self.writers.rewrite, &plan.new_content) {
            (Some(writer), Some(content)) => {
                self.retry.run(|| writer.rewrite_content(path, content)).await
            }
            _ => match (&self.writers.upsert_frontmatter, &plan.new_frontmatter) {
                (Some(writer), Some(fields)) => {
                    self.retry
                        .run(|| writer.upsert_frontmatter(path, fields))
                        .await
                }
                _ => {
                    self.diagnostics.record(
                        path,
                        IssueKind::RepairFailed,
                        Some("no write capability".to_string()),
                    );
                    return false;
                }
            },
        };

        if let Err(e) = written {
            warn!(path, error = %e, "repair write failed");
            self.diagnostics
                .record(path, IssueKind::RepairFailed, Some(e.to_string()));
            return false;
        }

        info!(path, actions = %plan.summary(), "repaired note");
        if let Err(e) = self.refresh_file(path).await {
            debug!(path, error = %e, "re-read after repair failed, next refresh will catch up");
        }
        true
    }
}
