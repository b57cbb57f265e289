//! Translation of local task edits into remote Sync API commands.
//!
//! A [`Translator`] compares a before/after pair of [`TaskSnapshot`]s and
//! returns the commands that reproduce the change remotely. It performs no
//! I/O: project and section names are resolved through a read-only
//! [`LookupStore`], then through the [`CreatedObjects`] that earlier commands
//! made, and the zone used to render due dates is passed in explicitly.
//!
//! [`TaskSnapshot`]: crate::model::TaskSnapshot

pub mod batch;
mod builders;
mod created;
pub mod diff;
pub mod due;

pub use batch::{Action, Batch, Created};
pub use builders::{NewProject, NewSection, create_project, create_section};
pub use created::CreatedObjects;

use chrono_tz::Tz;
use tasksync_proto::command::ItemRef;
use thiserror::Error;

use crate::model::TaskSnapshot;
use crate::store::{Collection, LookupStore, Record};

/// Project that items fall back to when their project is removed.
pub const DEFAULT_PROJECT: &str = "Inbox";

/// Errors raised while building commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// The fallback project is not in the lookup store.
    #[error("default project '{name}' not found in cache")]
    DefaultProjectMissing {
        /// Project name that was looked up.
        name: String,
    },
    /// A command that targets an existing item was needed, but the task
    /// has no remote id.
    #[error("cannot build {command}: task has no remote id")]
    MissingTarget {
        /// Wire name of the command.
        command: &'static str,
    },
    /// The configured zone name is not a known IANA zone.
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
    /// A remote due string could not be interpreted.
    #[error("invalid due date '{0}'")]
    InvalidDue(String),
}

/// Builds commands for one task change.
///
/// Borrowing the store keeps a `Translator` cheap to create per event.
#[derive(Debug)]
pub struct Translator<'a, S: ?Sized> {
    store: &'a S,
    created: Option<&'a CreatedObjects>,
    zone: Tz,
    default_project: String,
}

impl<'a, S: LookupStore + ?Sized> Translator<'a, S> {
    /// Creates a translator that falls back to `zone` for tasks that do not
    /// record their own.
    #[must_use]
    pub fn new(store: &'a S, zone: Tz) -> Self {
        Self {
            store,
            created: None,
            zone,
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }

    /// Like [`Translator::new`], parsing the fallback zone from its IANA name.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::InvalidTimezone`] if `zone` is unknown.
    pub fn with_zone_name(store: &'a S, zone: &str) -> Result<Self, TranslateError> {
        let zone = zone
            .parse::<Tz>()
            .map_err(|_| TranslateError::InvalidTimezone(zone.to_string()))?;
        Ok(Self::new(store, zone))
    }

    /// Overrides the project used when a task's project is removed.
    #[must_use]
    pub fn with_default_project(mut self, name: impl Into<String>) -> Self {
        self.default_project = name.into();
        self
    }

    /// Also resolves names against objects created by earlier commands.
    #[must_use]
    pub const fn with_created(mut self, created: &'a CreatedObjects) -> Self {
        self.created = Some(created);
        self
    }

    /// Zone a task's due date is interpreted in: its own, else the fallback.
    #[must_use]
    pub fn zone_for(&self, task: &TaskSnapshot) -> Tz {
        task.timezone().unwrap_or(self.zone)
    }

    /// Fallback zone.
    #[must_use]
    pub const fn zone(&self) -> Tz {
        self.zone
    }

    /// Name of the fallback project.
    #[must_use]
    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    fn resolve_project(&self, name: &str) -> Option<String> {
        self.store
            .find(Collection::Projects, "name", name)
            .and_then(Record::id)
    }

    /// Project by name: from the cache, else one created earlier.
    fn project_ref(&self, name: &str) -> Option<ItemRef> {
        self.resolve_project(name)
            .map(ItemRef::Resolved)
            .or_else(|| self.created?.project(name).cloned())
    }

    /// Section by name within `project`: from the cache, else one created
    /// earlier.
    fn section_ref(&self, project: &ItemRef, name: &str) -> Option<ItemRef> {
        let cached = match project {
            ItemRef::Resolved(project_id) => self
                .store
                .find_all(Collection::Sections, "name", name)
                .into_iter()
                .find(|record| record.matches("project_id", project_id))
                .and_then(Record::id),
            ItemRef::Pending(_) => None,
        };
        cached
            .map(ItemRef::Resolved)
            .or_else(|| self.created?.section(project, name).cloned())
    }
}
