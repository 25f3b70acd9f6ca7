//! Repair planning for malformed frontmatter.
//!
//! Planning is pure. Applying a plan needs the source's write
//! capabilities and lives on the cache service.

use serde::Serialize;
use serde_json::{Map, Value};

use notebridge_core::frontmatter::render_frontmatter;
use notebridge_core::tags::{frontmatter_tags, TagField};
use notebridge_core::ParsedFrontmatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairActionKind {
    AddFrontmatter,
    ReplaceInvalidFrontmatter,
    ConvertTagsToArray,
    NormalizeTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairAction {
    #[serde(rename = "type")]
    pub kind: RepairActionKind,
    pub description: String,
}

impl RepairAction {
    fn new(kind: RepairActionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }
}

/// A proposed rewrite of one file. Built and consumed within one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairPlan {
    pub file_path: String,
    pub actions: Vec<RepairAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_frontmatter: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_frontmatter: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

impl RepairPlan {
    /// Action descriptions joined for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        self.actions
            .iter()
            .map(|a| a.description.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Decide whether a file needs repair.
///
/// Triggers: no frontmatter block, a block that failed to parse, a `tags`
/// value that is not an array, or a `tags` array that differs from
/// `chosen_tags` (the normalized set the index holds). When triggered the
/// plan carries the whole rewritten file: a regenerated frontmatter block
/// followed by the original body.
///
/// A frontmatter without any `tags` key only gains one when the block is
/// being rewritten anyway.
#[must_use]
pub fn plan_repair(
    file_path: &str,
    parsed: &ParsedFrontmatter,
    chosen_tags: &[String],
) -> Option<RepairPlan> {
    let mut actions = Vec::new();

    let (original, mut frontmatter) = match parsed {
        ParsedFrontmatter::Missing { .. } => {
            actions.push(RepairAction::new(
                RepairActionKind::AddFrontmatter,
                "add missing frontmatter block",
            ));
            (None, Map::new())
        }
        ParsedFrontmatter::Failed { reason, .. } => {
            actions.push(RepairAction::new(
                RepairActionKind::ReplaceInvalidFrontmatter,
                format!("replace unparsable frontmatter ({reason})"),
            ));
            (None, Map::new())
        }
        ParsedFrontmatter::Parsed { frontmatter, .. } => {
            (Some(frontmatter.clone()), frontmatter.clone())
        }
    };

    let chosen: Vec<Value> = chosen_tags.iter().cloned().map(Value::String).collect();
    match frontmatter_tags(&frontmatter) {
        TagField::Absent => {
            if !actions.is_empty() && !chosen.is_empty() {
                frontmatter.insert("tags".to_string(), Value::Array(chosen));
            }
        }
        TagField::Text(_) | TagField::Invalid => {
            actions.push(RepairAction::new(
                RepairActionKind::ConvertTagsToArray,
                "convert tags to an array",
            ));
            frontmatter.insert("tags".to_string(), Value::Array(chosen));
        }
        TagField::List(current) => {
            // Items that were dropped while reading (objects, nulls) also count as drift.
            let all_read = frontmatter
                .get("tags")
                .and_then(Value::as_array)
                .is_some_and(|raw| raw.len() == current.len());
            if current.as_slice() != chosen_tags || !all_read {
                actions.push(RepairAction::new(
                    RepairActionKind::NormalizeTags,
                    format!("normalize tags {current:?} -> {chosen_tags:?}"),
                ));
                frontmatter.insert("tags".to_string(), Value::Array(chosen));
            }
        }
    }

    if actions.is_empty() {
        return None;
    }

    let new_content = render_frontmatter(&frontmatter, parsed.body()).ok();
    Some(RepairPlan {
        file_path: file_path.to_string(),
        actions,
        original_frontmatter: original,
        new_frontmatter: Some(frontmatter),
        new_content,
    })
}
