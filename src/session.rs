// 🧭 Session - explicit load -> view pipeline
//
// Stage 1 (async): fetch both collections independently.
// Stage 2 (sync):  apply results to the stores, then compute the view.
// Every mutation runs to completion before the next read, so a toggle is
// always observed by the following `visible()`.

use crate::engine::visible_persons;
use crate::error::{FilterError, LoadError, LoadOutcome};
use crate::filter::{FilterId, FilterStore, RawFilter};
use crate::loader::{DataLoader, RecordSource};
use crate::person::{Person, PersonStore};
use tracing::info;

// ============================================================================
// LOAD STAGE
// ============================================================================

/// Raw results of fetching both collections
#[derive(Debug)]
pub struct Fetched {
    pub persons: Result<Vec<Person>, LoadError>,
    pub filters: Result<Vec<RawFilter>, LoadError>,
}

/// Fetch persons and filters concurrently. One failing does not affect the other.
pub async fn fetch_all<S: RecordSource>(loader: &DataLoader<S>, retry: bool) -> Fetched {
    let (persons, filters) = tokio::join!(
        loader.fetch_persons(retry),
        loader.fetch_filters(retry)
    );
    Fetched { persons, filters }
}

/// What `apply` did to each store. `None` means the fetch failed and the
/// store was not touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub persons: Option<LoadOutcome>,
    pub filters: Option<LoadOutcome>,
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Default)]
pub struct Session {
    persons: PersonStore,
    filters: FilterStore,
}

impl Session {
    pub fn new() -> Self {
        Session::with_stores(PersonStore::new(), FilterStore::new())
    }

    pub fn with_stores(persons: PersonStore, filters: FilterStore) -> Self {
        Session { persons, filters }
    }

    /// Populate the stores from fetched results
    pub fn apply(&mut self, fetched: Fetched) -> LoadReport {
        let report = LoadReport {
            persons: fetched.persons.ok().map(|records| self.persons.load(records)),
            filters: fetched.filters.ok().map(|raw| self.filters.load(raw)),
        };

        info!(
            "Session holds {} persons, {} filters",
            self.persons.len(),
            self.filters.len()
        );
        report
    }

    /// Fetch and apply in one go
    pub async fn load<S: RecordSource>(
        &mut self,
        loader: &DataLoader<S>,
        retry: bool,
    ) -> LoadReport {
        let fetched = fetch_all(loader, retry).await;
        self.apply(fetched)
    }

    /// Persons to render for the current active set
    pub fn visible(&self) -> Result<Vec<Person>, FilterError> {
        visible_persons(
            self.persons.sorted(),
            self.filters.all_filters(),
            self.filters.active_ids(),
        )
    }

    /// Control activation handler: flip `id`, then recompute the view
    pub fn toggle(&mut self, id: FilterId) -> Result<Vec<Person>, FilterError> {
        self.filters.toggle(id);
        self.visible()
    }

    pub fn clear_filters(&mut self) -> Result<Vec<Person>, FilterError> {
        self.filters.clear();
        self.visible()
    }

    pub fn persons(&self) -> &PersonStore {
        &self.persons
    }

    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    /// Hand the populated stores to a long-lived owner (e.g. the HTTP server)
    pub fn into_stores(self) -> (PersonStore, FilterStore) {
        (self.persons, self.filters)
    }
}

// ============================================================================
// TESTS
// ============================================================================
