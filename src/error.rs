// ⚠️ Error Types - Typed failures for the filter core and the loader
//
// Two very different failure classes:
// - FilterError: data-integrity defects surfaced to the caller of the engine
// - LoadError: fetch failures, recovered locally by the loader (log + one retry)

use thiserror::Error;

/// Errors raised while computing the visible set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// An active criterion references a field the person record does not have
    #[error("person '{person}' has no field '{field}' referenced by an active filter")]
    FieldMissing { person: String, field: String },
}

/// Errors raised while fetching a raw collection.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result of populating a store.
///
/// `Empty` is the non-fatal "nothing to load" condition: the store keeps
/// whatever it held before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    Empty,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}
