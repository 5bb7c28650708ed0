// People Filter - Core Library
// Exposes the stores, the filter engine and the loader for the TUI, the HTTP server and tests

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod loader;
pub mod person;
pub mod session;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use engine::{criterion_matches, passes, visible_persons};
pub use error::{FilterError, LoadError, LoadOutcome};
pub use filter::{Filter, FilterCriterion, FilterId, FilterStore, RawFilter};
pub use loader::{Collection, DataLoader, FileSource, HttpSource, RecordSource};
pub use person::{Person, PersonField, PersonStore, PERSON_FIELDS};
pub use session::{fetch_all, Fetched, LoadReport, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
