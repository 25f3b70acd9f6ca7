//! # notebridge-vault
//!
//! Local vault access for notebridge.
//!
//! [`FsNoteSource`] serves a directory of markdown files through the same
//! [`NoteSource`](notebridge_core::NoteSource) contract the remote API
//! implements, including both write capabilities. [`VaultWatcher`] turns
//! filesystem events into vault-relative change notifications.

pub mod fs_source;
pub mod watcher;

pub use fs_source::FsNoteSource;
pub use watcher::{VaultEvent, VaultWatcher};
