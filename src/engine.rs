// 🔎 Filter Engine - Which persons are visible for the active filter set
//
// OR across active filters, AND across one filter's criteria.
// A criterion matches when lowercase(person[field]) contains lowercase(value).
// Pure: never mutates persons or filters, output keeps input order.

use crate::error::FilterError;
use crate::filter::{Filter, FilterCriterion, FilterId};
use crate::person::Person;
use std::collections::BTreeSet;

// ============================================================================
// MATCHING
// ============================================================================

/// Check one criterion against a person.
///
/// Fails with `FieldMissing` when the person record does not carry the
/// criterion's field: either the raw record lacked it or the key is not part
/// of the person schema.
pub fn criterion_matches(
    person: &Person,
    criterion: &FilterCriterion,
) -> Result<bool, FilterError> {
    let value = person
        .field(&criterion.field)
        .ok_or_else(|| FilterError::FieldMissing {
            person: person.display_name(),
            field: criterion.field.clone(),
        })?;

    Ok(value.to_lowercase().contains(&criterion.value.to_lowercase()))
}

/// A person passes a filter when every criterion matches.
/// Stops at the first failing criterion.
pub fn passes(person: &Person, filter: &Filter) -> Result<bool, FilterError> {
    for criterion in &filter.criteria {
        if !criterion_matches(person, criterion)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// VISIBLE SET
// ============================================================================

/// Compute the visible persons for `active`.
///
/// With nothing active every person is visible, in the given order.
/// Otherwise a person is visible when it passes at least one active filter;
/// filters are tried in load order and evaluation stops at the first pass.
/// Active ids with no matching filter are ignored, so a set holding only
/// unknown ids behaves like an empty one.
pub fn visible_persons(
    all_persons: &[Person],
    filters: &[Filter],
    active: &BTreeSet<FilterId>,
) -> Result<Vec<Person>, FilterError> {
    let active_filters: Vec<&Filter> = filters
        .iter()
        .filter(|f| active.contains(&f.id))
        .collect();

    if active_filters.is_empty() {
        return Ok(all_persons.to_vec());
    }

    let mut visible = Vec::new();
    for person in all_persons {
        if passes_any(person, &active_filters)? {
            visible.push(person.clone());
        }
    }

    Ok(visible)
}

fn passes_any(person: &Person, filters: &[&Filter]) -> Result<bool, FilterError> {
    for filter in filters {
        if passes(person, filter)? {
            return Ok(true);
        }
    }
    Ok(false)
}

// ============================================================================
// TESTS
// ============================================================================
