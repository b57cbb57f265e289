//! On-disk cache of remote collections.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tasksync_proto::sync::{FULL_SYNC_TOKEN, PullResponse};

use super::{Collection, LookupStore, Record, StoreError};

/// File holding the token for the next incremental pull.
const TOKEN_FILE: &str = "sync_token.json";

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    sync_token: String,
}

/// Store backed by `<dir>/{items,labels,projects,sections}.json`.
///
/// Each file holds a JSON array of remote objects. A missing file is an
/// empty collection, since a fresh install has not pulled anything yet.
/// `<dir>/sync_token.json` remembers where the last pull left off.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    collections: HashMap<Collection, Vec<Record>>,
    sync_token: String,
}

impl CacheStore {
    /// Loads every collection from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a present file cannot be read or parsed.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self {
            dir: dir.into(),
            collections: HashMap::new(),
            sync_token: FULL_SYNC_TOKEN.to_string(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-reads every collection and the sync token from disk.
    ///
    /// On error the previously loaded data is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a present file cannot be read or parsed.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            let path = self.dir.join(collection.file_name());
            let records: Vec<Record> = read_json(&path)?.unwrap_or_default();
            tracing::debug!(
                collection = %collection,
                count = records.len(),
                path = %path.display(),
                "loaded cached collection"
            );
            collections.insert(collection, records);
        }
        let token: Option<TokenFile> = read_json(&self.dir.join(TOKEN_FILE))?;
        self.collections = collections;
        self.sync_token = token.map_or_else(|| FULL_SYNC_TOKEN.to_string(), |t| t.sync_token);
        Ok(())
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Token to send with the next pull.
    #[must_use]
    pub fn sync_token(&self) -> &str {
        &self.sync_token
    }

    /// Makes the next pull fetch every object again.
    pub fn reset_token(&mut self) {
        self.sync_token = FULL_SYNC_TOKEN.to_string();
    }

    /// Folds a pull response into the cache and saves it.
    ///
    /// A full sync replaces each collection. An incremental one merges each
    /// object into the cached copy with the same id, or appends it, and
    /// drops objects marked `is_deleted`. Only collections that changed are
    /// rewritten; the token is saved last so an interrupted save repeats the
    /// same pull.
    ///
    /// Returns the number of objects added, changed or removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if a file cannot be saved. Collections
    /// already saved keep their new contents.
    pub fn apply(&mut self, response: &PullResponse) -> Result<usize, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let mut changed = 0;
        for collection in Collection::ALL {
            let incoming = response.resource(collection.name());
            if incoming.is_empty() && !response.full_sync {
                continue;
            }
            let records = self.collections.entry(collection).or_default();
            if response.full_sync {
                *records = incoming
                    .iter()
                    .filter_map(to_record)
                    .filter(|record| !record.is_deleted())
                    .collect();
                changed += records.len();
            } else {
                for record in incoming.iter().filter_map(to_record) {
                    changed += usize::from(merge(records, record));
                }
            }
            write_json(&self.dir.join(collection.file_name()), &*records)?;
            tracing::debug!(
                collection = %collection,
                count = records.len(),
                "saved cached collection"
            );
        }

        write_json(
            &self.dir.join(TOKEN_FILE),
            &TokenFile {
                sync_token: response.sync_token.clone(),
            },
        )?;
        self.sync_token.clone_from(&response.sync_token);
        Ok(changed)
    }
}

impl LookupStore for CacheStore {
    fn records(&self, collection: Collection) -> &[Record] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn to_record(value: &serde_json::Value) -> Option<Record> {
    let record = value.as_object().cloned().map(Record::new);
    if record.as_ref().and_then(Record::id).is_none() {
        tracing::warn!(object = %value, "ignoring pulled object without id");
        return None;
    }
    record
}

/// Merges one pulled object into `records`; returns whether anything changed.
fn merge(records: &mut Vec<Record>, record: Record) -> bool {
    let id = record.id();
    let position = records.iter().position(|existing| existing.id() == id);
    match (position, record.is_deleted()) {
        (Some(index), true) => {
            records.remove(index);
            true
        }
        (None, true) => false,
        (Some(index), false) => {
            records[index].merge(record);
            true
        }
        (None, false) => {
            records.push(record);
            true
        }
    }
}

/// Reads a JSON file, or `None` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Writes a JSON file through a temp file and a rename.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let contents = serde_json::to_vec_pretty(value).map_err(|e| write_err(e.into()))?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)
}
