//! Vault path helpers.
//!
//! Normalized paths use forward slashes, carry no leading or trailing
//! slash and contain no empty or `.` segments.

/// Normalize a vault-relative path.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a directory listing entry onto its directory.
///
/// Entries that already carry the directory prefix are accepted as-is; an
/// entry naming the directory itself (or nothing) yields the directory.
#[must_use]
pub fn join_path(dir: &str, entry: &str) -> String {
    let dir = normalize_path(dir);
    let entry = normalize_path(entry);
    if dir.is_empty() || entry == dir || entry.starts_with(&format!("{dir}/")) {
        return entry;
    }
    if entry.is_empty() {
        return dir;
    }
    format!("{dir}/{entry}")
}

/// File name without directory or extension.
#[must_use]
pub fn basename(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Whether the path names a markdown file.
#[must_use]
pub fn is_markdown(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".md")
}
