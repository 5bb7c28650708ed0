// 🔘 Filter Definitions + FilterStore
//
// Filters are data: a description plus field -> substring criteria.
// Identity is the position in the loaded sequence (FilterId), never the
// description, since descriptions are not guaranteed unique.

use crate::error::LoadOutcome;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// FILTER IDENTITY
// ============================================================================

/// Stable identifier assigned at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(pub usize);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// FILTER DEFINITION
// ============================================================================

/// Filter record as it appears in the source data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFilter {
    #[serde(default)]
    pub description: String,

    /// Person field key -> required substring
    #[serde(default)]
    pub criteria: BTreeMap<String, String>,
}

/// One field/substring requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriterion {
    /// Person record key, e.g. "city"
    pub field: String,

    /// Required substring (case-insensitive, empty always matches)
    pub value: String,
}

impl FilterCriterion {
    pub fn new(field: &str, value: &str) -> Self {
        FilterCriterion {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// A loaded filter: immutable for the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    #[serde(rename = "index")]
    pub id: FilterId,
    pub description: String,
    pub criteria: Vec<FilterCriterion>,
}

impl Filter {
    pub fn new(id: FilterId, description: &str, criteria: Vec<FilterCriterion>) -> Self {
        Filter {
            id,
            description: description.to_string(),
            criteria,
        }
    }

    fn from_raw(id: FilterId, raw: RawFilter) -> Self {
        let criteria = raw
            .criteria
            .into_iter()
            .map(|(field, value)| FilterCriterion { field, value })
            .collect();

        Filter {
            id,
            description: raw.description,
            criteria,
        }
    }
}

// ============================================================================
// FILTER STORE
// ============================================================================

/// Available filters (load order) plus the set of active identifiers
#[derive(Debug, Default)]
pub struct FilterStore {
    filters: Vec<Filter>,
    active: BTreeSet<FilterId>,
}

impl FilterStore {
    pub fn new() -> Self {
        FilterStore {
            filters: Vec::new(),
            active: BTreeSet::new(),
        }
    }

    /// Create a store already holding `raw` (all inactive)
    pub fn with_filters(raw: Vec<RawFilter>) -> Self {
        let mut store = FilterStore::new();
        store.load(raw);
        store
    }

    /// Replace the filter definitions, assigning ids by position.
    ///
    /// An empty input leaves definitions and active set untouched. A
    /// successful load starts with nothing active, since ids are reassigned.
    pub fn load(&mut self, raw: Vec<RawFilter>) -> LoadOutcome {
        if raw.is_empty() {
            warn!("No filters to load, keeping {} existing", self.filters.len());
            return LoadOutcome::Empty;
        }

        self.filters = raw
            .into_iter()
            .enumerate()
            .map(|(i, r)| Filter::from_raw(FilterId(i), r))
            .collect();
        self.active.clear();

        info!("Loaded {} filters", self.filters.len());
        LoadOutcome::Loaded(self.filters.len())
    }

    /// Flip the active flag for `id`. Unknown ids are ignored.
    pub fn toggle(&mut self, id: FilterId) {
        if self.get(id).is_none() {
            debug!("Ignoring toggle of unknown filter {}", id);
            return;
        }

        if !self.active.remove(&id) {
            self.active.insert(id);
        }
        debug!("Filter {} active: {}", id, self.is_active(id));
    }

    /// Deactivate every filter
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Currently active ids (empty = no filtering)
    pub fn active_ids(&self) -> &BTreeSet<FilterId> {
        &self.active
    }

    pub fn is_active(&self, id: FilterId) -> bool {
        self.active.contains(&id)
    }

    /// All filters in load order
    pub fn all_filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn get(&self, id: FilterId) -> Option<&Filter> {
        self.filters.get(id.0)
    }

    /// Active filters in load order
    pub fn active_filters(&self) -> impl Iterator<Item = &Filter> + '_ {
        self.filters.iter().filter(move |f| self.active.contains(&f.id))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
