//! In-memory [`LookupStore`].

use std::collections::HashMap;

use serde_json::Value;

use super::{Collection, LookupStore, Record};

/// Store backed by records held in memory.
///
/// ```
/// use tasksync::store::{Collection, LookupStore, MemoryStore};
///
/// let store = MemoryStore::new().with_project("99", "Errands");
/// let found = store.find(Collection::Projects, "name", "Errands");
/// assert_eq!(found.and_then(|r| r.id()).as_deref(), Some("99"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<Collection, Vec<Record>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record to a collection.
    ///
    /// Non-object values are ignored.
    #[must_use]
    pub fn with_record(mut self, collection: Collection, value: Value) -> Self {
        if let Value::Object(fields) = value {
            self.collections
                .entry(collection)
                .or_default()
                .push(Record::new(fields));
        }
        self
    }

    /// Adds a project with the given id and name.
    #[must_use]
    pub fn with_project(self, id: &str, name: &str) -> Self {
        self.with_record(
            Collection::Projects,
            serde_json::json!({ "id": id, "name": name }),
        )
    }
}

impl LookupStore for MemoryStore {
    fn records(&self, collection: Collection) -> &[Record] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
