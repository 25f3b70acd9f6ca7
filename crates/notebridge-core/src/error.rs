//! Error types for notebridge.

use thiserror::Error;

/// Top-level result type for notebridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Top-level error type for notebridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Failures reported by a [`NoteSource`](crate::source::NoteSource).
///
/// Each failure class is distinguishable so the cache can decide between
/// tombstoning, retrying, and recording an issue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid data: {0}")]
    Validation(String),

    #[error("source failure: {0}")]
    Other(String),
}

impl SourceError {
    /// Whether a retry has a reasonable chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Timeout(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_and_timeout_are_transient() {
        assert!(SourceError::ServiceUnavailable("503".into()).is_transient());
        assert!(SourceError::Timeout("10s".into()).is_transient());
        assert!(!SourceError::NotFound("a.md".into()).is_transient());
        assert!(!SourceError::Validation("bad json".into()).is_transient());
        assert!(!SourceError::Other("boom".into()).is_transient());
    }

    #[test]
    fn errors_display_human_readable_messages() {
        let err = BridgeError::from(SourceError::NotFound("notes/a.md".to_string()));
        let msg = err.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("notes/a.md"));

        let err = BridgeError::Config("NOTEBRIDGE_CACHE_MAX_ITEMS must be > 0".to_string());
        assert!(err.to_string().contains("NOTEBRIDGE_CACHE_MAX_ITEMS"));
    }
}
