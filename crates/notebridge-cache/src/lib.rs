//! # notebridge-cache
//!
//! Self-healing vault cache in front of a remote [`NoteSource`].
//!
//! Two tiers:
//! - [`MetadataIndex`] — unbounded path → [`NoteMetadata`] map, rebuilt by
//!   every refresh pass
//! - [`ContentCache`] — bounded LRU of raw note text with sliding TTL
//!
//! [`VaultCache`] drives refreshes through the [`limiter`], falls back to a
//! markdown recovery path when the canonical fetch fails, records data
//! quality [`Issue`]s in the [`DiagnosticsLog`] and can repair malformed
//! frontmatter through optional write capabilities.
//!
//! [`NoteSource`]: notebridge_core::NoteSource
//! [`NoteMetadata`]: notebridge_core::NoteMetadata

pub mod content;
pub mod diagnostics;
pub mod index;
pub mod limiter;
pub mod normalize;
mod recovery;
pub mod repair;
pub mod retry;
pub mod search;
pub mod service;
pub mod walk;

pub use content::ContentCache;
pub use diagnostics::{DiagnosticsLog, Issue, IssueKind};
pub use index::MetadataIndex;
pub use repair::{plan_repair, RepairAction, RepairActionKind, RepairPlan};
pub use retry::RetryPolicy;
pub use search::{SearchError, SearchHit, SearchOptions};
pub use service::{CacheState, CacheStatus, FileUpdate, RefreshOutcome, RefreshStats, VaultCache};
