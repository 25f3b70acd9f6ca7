//! Turning loosely shaped source data into complete [`NoteMetadata`].
//!
//! Nothing reaches the index without going through here: frontmatter is
//! always an object, tags always a deduplicated list and stat always
//! complete. Every coercion is recorded in the [`DiagnosticsLog`].

use serde_json::{Map, Value};

use notebridge_core::tags::{frontmatter_tags, normalize_tags, tags_from_value, TagField};
use notebridge_core::{NoteMetadata, NoteStat, RawStat, StructuredNote};

use crate::diagnostics::{DiagnosticsLog, IssueKind};

/// Pick tags: frontmatter tags win when non-empty, otherwise `fallback`.
#[must_use]
pub fn choose_tags(frontmatter: &TagField, fallback: &[String], lowercase: bool) -> Vec<String> {
    let from_frontmatter = normalize_tags(frontmatter.tags(), lowercase);
    if from_frontmatter.is_empty() {
        normalize_tags(fallback, lowercase)
    } else {
        from_frontmatter
    }
}

/// Complete a stat. Missing times become "now" and are recorded as
/// `MISSING_STAT`; a missing ctime falls back to mtime and a missing size
/// to `size_hint`.
pub fn complete_stat(path: &str, raw: RawStat, size_hint: u64, diagnostics: &DiagnosticsLog) -> NoteStat {
    let mut missing = Vec::new();
    let mtime = raw.mtime.unwrap_or_else(|| {
        missing.push("mtime");
        notebridge_core::now_ms()
    });
    let ctime = match raw.ctime {
        Some(ctime) => ctime,
        None if raw.mtime.is_some() => mtime,
        None => {
            missing.push("ctime");
            mtime
        }
    };
    if !missing.is_empty() {
        diagnostics.record(
            path,
            IssueKind::MissingStat,
            Some(format!("missing {}", missing.join(", "))),
        );
    }
    NoteStat {
        mtime,
        ctime,
        size: raw.size.unwrap_or(size_hint),
    }
}

fn frontmatter_object(path: &str, value: &Value, diagnostics: &DiagnosticsLog) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            diagnostics.record(
                path,
                IssueKind::InvalidFrontmatter,
                Some(format!("expected an object, got {}", type_name(other))),
            );
            Map::new()
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a canonical structured note.
///
/// `fallback_stat` backfills fields the note's own stat omits; callers
/// pass the fresh remote stat merged over the previously cached one.
pub fn from_structured(
    path: &str,
    note: &StructuredNote,
    fallback_stat: RawStat,
    lowercase: bool,
    diagnostics: &DiagnosticsLog,
) -> NoteMetadata {
    let frontmatter = frontmatter_object(path, &note.frontmatter, diagnostics);

    let fm_tags = frontmatter_tags(&frontmatter);
    if fm_tags.is_not_array() {
        diagnostics.record(
            path,
            IssueKind::TagsNotArray,
            Some("frontmatter tags is not an array".to_string()),
        );
    }
    let note_tags = tags_from_value(&note.tags);
    if note_tags.is_not_array() {
        diagnostics.record(
            path,
            IssueKind::TagsNotArray,
            Some(format!("note tags is {}", type_name(&note.tags))),
        );
    }
    let tags = choose_tags(&fm_tags, note_tags.tags(), lowercase);

    let raw = note.stat.unwrap_or_default().or(fallback_stat);
    let size_hint = note.content.as_ref().map_or(0, |c| c.len() as u64);
    let stat = complete_stat(path, raw, size_hint, diagnostics);

    NoteMetadata::new(path.to_string(), frontmatter, tags, stat)
}
