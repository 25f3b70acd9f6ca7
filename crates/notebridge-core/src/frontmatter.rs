//! YAML frontmatter parsing and writing.
//!
//! Handles the `---` delimited YAML block at the very top of a note:
//! ```markdown
//! ---
//! title: Alpha
//! tags: [project, rust]
//! ---
//!
//! Body content here #inline-tag
//! ```
//!
//! Parsing never fails with an error. A missing or malformed block is a
//! common, locally handled case, so [`parse_frontmatter`] reports it as a
//! variant of [`ParsedFrontmatter`] instead.

use serde_json::{Map, Value};

use crate::error::BridgeError;

/// Outcome of splitting and parsing a note's frontmatter block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFrontmatter {
    /// A block was present and parsed into a mapping (possibly empty).
    Parsed {
        frontmatter: Map<String, Value>,
        body: String,
    },
    /// The note does not start with a frontmatter block.
    Missing { body: String },
    /// A block was present but could not be used.
    Failed { body: String, reason: String },
}

impl ParsedFrontmatter {
    /// The note body, without the frontmatter block when one was split off.
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Parsed { body, .. } | Self::Missing { body } | Self::Failed { body, .. } => body,
        }
    }

    /// Parsed fields, or an empty mapping when parsing did not succeed.
    #[must_use]
    pub fn frontmatter(&self) -> Map<String, Value> {
        match self {
            Self::Parsed { frontmatter, .. } => frontmatter.clone(),
            _ => Map::new(),
        }
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }
}

enum Split<'a> {
    Absent,
    Block { yaml: &'a str, body: &'a str },
    Unclosed,
}

fn split_block(content: &str) -> Split<'_> {
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    if first.trim_end() != "---" {
        return Split::Absent;
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            return Split::Block {
                yaml: &rest[..offset],
                body: &rest[offset + line.len()..],
            };
        }
        offset += line.len();
    }
    Split::Unclosed
}

/// Split a note into frontmatter fields and body.
#[must_use]
pub fn parse_frontmatter(content: &str) -> ParsedFrontmatter {
    let (yaml, body) = match split_block(content) {
        Split::Absent => {
            return ParsedFrontmatter::Missing {
                body: content.to_string(),
            }
        }
        Split::Unclosed => {
            return ParsedFrontmatter::Failed {
                body: content.to_string(),
                reason: "no closing '---' frontmatter delimiter found".to_string(),
            }
        }
        Split::Block { yaml, body } => (yaml, body),
    };

    let failed = |reason: String| ParsedFrontmatter::Failed {
        body: body.to_string(),
        reason,
    };

    if yaml.trim().is_empty() {
        return ParsedFrontmatter::Parsed {
            frontmatter: Map::new(),
            body: body.to_string(),
        };
    }

    let value: serde_yaml::Value = match serde_yaml::from_str(yaml) {
        Ok(v) => v,
        Err(e) => return failed(format!("invalid YAML: {e}")),
    };

    match value {
        serde_yaml::Value::Null => ParsedFrontmatter::Parsed {
            frontmatter: Map::new(),
            body: body.to_string(),
        },
        serde_yaml::Value::Mapping(_) => match serde_json::to_value(&value) {
            Ok(Value::Object(frontmatter)) => ParsedFrontmatter::Parsed {
                frontmatter,
                body: body.to_string(),
            },
            Ok(_) => failed("frontmatter is not a mapping".to_string()),
            Err(e) => failed(format!("unsupported frontmatter value: {e}")),
        },
        _ => failed("frontmatter is not a mapping".to_string()),
    }
}

/// Write frontmatter fields and a body back into a note.
///
/// # Errors
///
/// Returns [`BridgeError::Serialization`] if the fields cannot be written as YAML.
pub fn render_frontmatter(frontmatter: &Map<String, Value>, body: &str) -> Result<String, BridgeError> {
    let yaml = if frontmatter.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(frontmatter).map_err(|e| BridgeError::Serialization(e.to_string()))?
    };

    let mut output = String::with_capacity(yaml.len() + body.len() + 8);
    output.push_str("---\n");
    output.push_str(&yaml);
    output.push_str("---\n");
    output.push_str(body);
    Ok(output)
}
