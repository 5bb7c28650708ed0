// 👤 Person Records + PersonStore
//
// Person is a plain immutable value. The store owns the canonical list and
// keeps it in name order: lowercase(lastName) + lowercase(firstName), stable.

use crate::error::LoadOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// PERSON FIELDS
// ============================================================================

/// The fixed person schema, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonField {
    FirstName,
    LastName,
    StreetAddress,
    City,
    State,
    Zip,
}

/// Display column order for person rows
pub const PERSON_FIELDS: [PersonField; 6] = [
    PersonField::FirstName,
    PersonField::LastName,
    PersonField::StreetAddress,
    PersonField::City,
    PersonField::State,
    PersonField::Zip,
];

impl PersonField {
    /// Resolve a record key ("firstName", "city", ...) to a field.
    /// Keys are matched exactly, as they appear in the raw data.
    pub fn from_key(key: &str) -> Option<Self> {
        PERSON_FIELDS.iter().copied().find(|f| f.key() == key)
    }

    /// Key used in the raw records and in filter criteria
    pub fn key(&self) -> &'static str {
        match self {
            PersonField::FirstName => "firstName",
            PersonField::LastName => "lastName",
            PersonField::StreetAddress => "streetAddress",
            PersonField::City => "city",
            PersonField::State => "state",
            PersonField::Zip => "zip",
        }
    }

    /// Column header label
    pub fn label(&self) -> &'static str {
        match self {
            PersonField::FirstName => "First Name",
            PersonField::LastName => "Last Name",
            PersonField::StreetAddress => "Street Address",
            PersonField::City => "City",
            PersonField::State => "State",
            PersonField::Zip => "Zip",
        }
    }
}

// ============================================================================
// PERSON
// ============================================================================

/// A person record.
///
/// Fields absent from the raw data stay `None`, so a criterion on such a
/// field can be reported instead of silently failing to match. Display and
/// sorting read absent fields as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl Person {
    /// Person with the given names and every other field present but empty
    pub fn new(first_name: &str, last_name: &str) -> Self {
        let empty = || Some(String::new());
        Person {
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            street_address: empty(),
            city: empty(),
            state: empty(),
            zip: empty(),
        }
    }

    /// Field value, `None` if the record did not carry it
    pub fn get(&self, field: PersonField) -> Option<&str> {
        let value = match field {
            PersonField::FirstName => &self.first_name,
            PersonField::LastName => &self.last_name,
            PersonField::StreetAddress => &self.street_address,
            PersonField::City => &self.city,
            PersonField::State => &self.state,
            PersonField::Zip => &self.zip,
        };
        value.as_deref()
    }

    /// Field value for display; absent reads as ""
    pub fn value(&self, field: PersonField) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Look up a field by its record key. `None` if the key is not part of
    /// the person schema or the record did not carry it.
    pub fn field(&self, key: &str) -> Option<&str> {
        PersonField::from_key(key).and_then(|f| self.get(f))
    }

    /// Values in display column order
    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        PERSON_FIELDS.iter().map(move |f| self.value(*f))
    }

    /// "First Last", used in logs and error messages
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.value(PersonField::FirstName),
            self.value(PersonField::LastName)
        )
    }

    /// Sort key: lowercase(lastName) + lowercase(firstName)
    pub fn sort_key(&self) -> String {
        let mut key = self.value(PersonField::LastName).to_lowercase();
        key.push_str(&self.value(PersonField::FirstName).to_lowercase());
        key
    }
}

// ============================================================================
// PERSON STORE
// ============================================================================

/// Canonical list of persons for the session, kept in name order
#[derive(Debug, Default)]
pub struct PersonStore {
    persons: Vec<Person>,
}

impl PersonStore {
    pub fn new() -> Self {
        PersonStore {
            persons: Vec::new(),
        }
    }

    /// Create a store already holding `records` (sorted)
    pub fn with_persons(records: Vec<Person>) -> Self {
        let mut store = PersonStore::new();
        store.load(records);
        store
    }

    /// Replace the stored persons with `records`, re-sorting them.
    ///
    /// An empty input leaves the store untouched and reports `Empty`.
    pub fn load(&mut self, mut records: Vec<Person>) -> LoadOutcome {
        if records.is_empty() {
            warn!("No persons to load, keeping {} existing", self.persons.len());
            return LoadOutcome::Empty;
        }

        // sort_by_cached_key is stable: equal keys keep input order
        records.sort_by_cached_key(Person::sort_key);
        self.persons = records;

        info!("Loaded {} persons", self.persons.len());
        LoadOutcome::Loaded(self.persons.len())
    }

    /// Persons in name order
    pub fn sorted(&self) -> &[Person] {
        &self.persons
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
