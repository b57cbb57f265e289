//! Read-only lookups over cached remote collections.
//!
//! The remote service's objects (projects, sections, labels, items) are
//! mirrored into JSON files by [`CacheStore::apply`] after each pull.
//! Translation only ever reads them, through [`LookupStore::find`].

mod cache;
mod memory;

pub use cache::CacheStore;
pub use memory::MemoryStore;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while loading or saving cached collections.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A cache file exists but cannot be read.
    #[error("failed to read cache file {path}: {source}")]
    Read {
        /// File that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A cache file is not a JSON array of objects.
    #[error("failed to parse cache file {path}: {source}")]
    Parse {
        /// File that was attempted.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// A cache file cannot be written.
    #[error("failed to write cache file {path}: {source}")]
    Write {
        /// File that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A cached remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Projects.
    Projects,
    /// Sections within projects.
    Sections,
    /// Labels.
    Labels,
    /// Items (tasks).
    Items,
}

impl Collection {
    /// Every collection, in load order.
    pub const ALL: [Self; 4] = [Self::Items, Self::Labels, Self::Projects, Self::Sections];

    /// Name of the collection on the remote service.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Sections => "sections",
            Self::Labels => "labels",
            Self::Items => "items",
        }
    }

    /// Cache file name.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cached remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wraps a JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns a raw attribute.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the record's remote id as a string.
    ///
    /// Older API versions used numeric ids, newer ones strings.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Returns `true` if the service reported the object as removed.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.matches("is_deleted", "true")
    }

    /// Overwrites this record's attributes with those of a newer copy.
    pub fn merge(&mut self, newer: Self) {
        self.0.extend(newer.0);
    }

    /// Returns `true` if `field` holds `value` (strings compare exactly,
    /// numbers by their decimal form, booleans as `true`/`false`).
    #[must_use]
    pub fn matches(&self, field: &str, value: &str) -> bool {
        match self.0.get(field) {
            Some(Value::String(s)) => s == value,
            Some(Value::Number(n)) => n.to_string() == value,
            Some(Value::Bool(b)) => value == if *b { "true" } else { "false" },
            _ => false,
        }
    }
}

/// Query contract the translation engine depends on.
///
/// Implementations must be safe for concurrent reads.
pub trait LookupStore: Send + Sync {
    /// Returns all records of a collection.
    fn records(&self, collection: Collection) -> &[Record];

    /// Returns the first record whose `field` equals `value`.
    fn find(&self, collection: Collection, field: &str, value: &str) -> Option<&Record> {
        self.records(collection)
            .iter()
            .find(|record| record.matches(field, value))
    }

    /// Returns every record whose `field` equals `value`.
    fn find_all(&self, collection: Collection, field: &str, value: &str) -> Vec<&Record> {
        self.records(collection)
            .iter()
            .filter(|record| record.matches(field, value))
            .collect()
    }
}
