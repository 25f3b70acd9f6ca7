//! # notebridge-core
//!
//! Core types and pure helpers shared by the notebridge crates.
//!
//! This crate defines:
//! - [`NoteMetadata`] and [`NoteStat`] — the normalized per-note record
//! - [`StructuredNote`] and [`RawStat`] — loosely typed data as the source returns it
//! - [`NoteSource`] — the remote note API seen as a black box
//! - [`WriteCapabilities`] — optional write slots used to apply repairs
//! - [`CacheConfig`] — explicit cache configuration with environment loading
//! - Error hierarchy ([`BridgeError`], [`SourceError`])
//! - Markdown analysis ([`frontmatter`], [`tags`]) and path helpers ([`path`])

pub mod config;
pub mod error;
pub mod frontmatter;
pub mod note;
pub mod path;
pub mod source;
pub mod tags;

pub use config::CacheConfig;
pub use error::{BridgeError, Result, SourceError};
pub use frontmatter::ParsedFrontmatter;
pub use note::{now_ms, NoteMetadata, NoteStat, RawStat, StructuredNote};
pub use source::{ContentRewriter, FrontmatterUpserter, NoteSource, WriteCapabilities};
