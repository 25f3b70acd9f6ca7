//! File system watcher that feeds vault changes into the cache.
//!
//! Uses the `notify` crate for cross-platform file system events
//! (FSEvents on macOS, inotify on Linux, ReadDirectoryChanges on Windows).

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use notebridge_core::path::{is_markdown, normalize_path};
use notebridge_core::BridgeError;

/// Events emitted by the vault watcher, keyed by vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// A markdown file was created or modified.
    Changed(String),
    /// A markdown file was deleted or renamed away.
    Removed(String),
}

impl VaultEvent {
    pub fn path(&self) -> &str {
        match self {
            Self::Changed(path) | Self::Removed(path) => path,
        }
    }
}

/// Watches a vault directory and emits [`VaultEvent`]s on an async channel.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<VaultEvent>,
}

impl VaultWatcher {
    /// Start watching a vault directory for changes.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the watcher cannot be created.
    pub fn start(vault_root: &Path) -> Result<Self, BridgeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let roots = watch_roots(vault_root);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "vault watcher error");
                    return;
                }
            };
            for path in &event.paths {
                let Some(relative) = roots.iter().find_map(|root| note_path(root, path)) else {
                    continue;
                };
                let vault_event = match event.kind {
                    EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
                        VaultEvent::Removed(relative)
                    }
                    EventKind::Create(_) | EventKind::Modify(_) => VaultEvent::Changed(relative),
                    _ => continue,
                };
                let _ = tx.send(vault_event);
            }
        })
        .map_err(|e| BridgeError::Io(std::io::Error::other(e)))?;

        watcher
            .watch(vault_root, RecursiveMode::Recursive)
            .map_err(|e| BridgeError::Io(std::io::Error::other(e)))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Wait for the next event. Returns `None` once the watcher is gone.
    pub async fn recv(&mut self) -> Option<VaultEvent> {
        self.receiver.recv().await
    }

    /// Try to receive the next event without waiting.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<VaultEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Event paths may arrive canonicalized (e.g. `/private/var` on macOS), so
/// both spellings of the root are matched.
fn watch_roots(vault_root: &Path) -> Vec<PathBuf> {
    let mut roots = vec![vault_root.to_path_buf()];
    if let Ok(canonical) = vault_root.canonicalize() {
        if canonical != vault_root {
            roots.push(canonical);
        }
    }
    roots
}

/// Vault-relative path for a markdown file outside hidden directories.
fn note_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let hidden = relative
        .components()
        .any(|c| c.as_os_str().to_str().is_some_and(|s| s.starts_with('.')));
    if hidden {
        return None;
    }
    let relative = normalize_path(relative.to_str()?);
    is_markdown(&relative).then_some(relative)
}
