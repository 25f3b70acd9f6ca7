//! Unbounded metadata index.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use notebridge_core::NoteMetadata;

/// Normalized path → [`NoteMetadata`].
///
/// Values are shared as `Arc` so snapshots handed to callers are cheap and
/// can never mutate the index.
#[derive(Default)]
pub struct MetadataIndex {
    entries: RwLock<HashMap<String, Arc<NoteMetadata>>>,
}

impl MetadataIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<NoteMetadata>> {
        self.read(|entries| entries.get(path).cloned())
    }

    /// Read-only copy of the whole index.
    pub fn snapshot(&self) -> HashMap<String, Arc<NoteMetadata>> {
        self.read(HashMap::clone)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read(|entries| entries.keys().cloned().collect())
    }

    /// Insert or replace the entry keyed by `metadata.path`, returning the
    /// previous entry.
    pub fn set(&self, metadata: NoteMetadata) -> Option<Arc<NoteMetadata>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(metadata.path.clone(), Arc::new(metadata))
    }

    pub fn remove(&self, path: &str) -> Option<Arc<NoteMetadata>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(path)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, Arc<NoteMetadata>>) -> T) -> T {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f(&entries)
    }
}
