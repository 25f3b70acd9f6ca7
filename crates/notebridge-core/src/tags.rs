//! Tag extraction and normalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

// `#tag` at line start or after whitespace; allows nested `a/b` and dashes.
static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([\p{L}\p{N}_/\-]+)").expect("valid regex"));

/// Shape of a `tags` value found in frontmatter or a structured note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagField {
    /// No `tags` value at all (or `null`).
    Absent,
    /// A proper array of tags.
    List(Vec<String>),
    /// A single string such as `"a, b"`, split into tags.
    Text(Vec<String>),
    /// Some other type that cannot be read as tags.
    Invalid,
}

impl TagField {
    /// Tags carried by the field, empty for `Absent` and `Invalid`.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        match self {
            Self::List(tags) | Self::Text(tags) => tags,
            Self::Absent | Self::Invalid => &[],
        }
    }

    /// Present, but not an array.
    #[must_use]
    pub fn is_not_array(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Invalid)
    }
}

/// Read a `tags` value.
#[must_use]
pub fn tags_from_value(value: &Value) -> TagField {
    match value {
        Value::Null => TagField::Absent,
        Value::Array(items) => TagField::List(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) => TagField::Text(
            s.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => TagField::Invalid,
    }
}

/// Read the `tags` key of a frontmatter mapping.
#[must_use]
pub fn frontmatter_tags(frontmatter: &Map<String, Value>) -> TagField {
    frontmatter
        .get("tags")
        .map_or(TagField::Absent, tags_from_value)
}

/// Extract inline `#tag` tokens from a note body.
///
/// Fenced code blocks are skipped and purely numeric tokens (`#123`) are
/// not tags.
#[must_use]
pub fn extract_inline_tags(body: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for cap in INLINE_TAG_RE.captures_iter(line) {
            let tag = cap[1].trim_end_matches(['/', '-']);
            if !tag.is_empty() && !tag.chars().all(|c| c.is_ascii_digit()) {
                tags.push(tag.to_string());
            }
        }
    }

    tags
}

/// Trim, strip a leading `#`, drop empties and deduplicate while keeping
/// first-seen order. Lowercases first when `lowercase` is set, so
/// `["A", "a"]` collapses to `["a"]`.
#[must_use]
pub fn normalize_tags<I, S>(tags: I, lowercase: bool) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().trim_start_matches('#').trim();
        if tag.is_empty() {
            continue;
        }
        let tag = if lowercase {
            tag.to_lowercase()
        } else {
            tag.to_string()
        };
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    out
}
