//! Projects and sections created by our own commands that the lookup cache
//! does not list yet.
//!
//! Between a push and the next pull, and while commands sit in a buffer,
//! the cache is behind what has been sent. Translation consults these
//! entries after the cache so the same project or section is never created
//! twice.

use std::collections::HashMap;

use tasksync_proto::command::{Command, CommandKind, ItemRef};
use tasksync_proto::sync::SyncResponse;

/// Objects created by buffered or pushed commands, by name.
///
/// An entry is [`ItemRef::Pending`] while its creation command is buffered
/// and [`ItemRef::Resolved`] once a push assigned the real id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedObjects {
    projects: HashMap<String, ItemRef>,
    sections: HashMap<(ItemRef, String), ItemRef>,
}

impl CreatedObjects {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes the project or section a creation command makes.
    ///
    /// Other commands are ignored, and an existing entry wins over a later
    /// one with the same name.
    pub fn record(&mut self, command: &Command) {
        let Some(temp_id) = &command.temp_id else {
            return;
        };
        let created = ItemRef::Pending(temp_id.clone());
        match &command.kind {
            CommandKind::ProjectAdd(args) => {
                self.projects.entry(args.name.clone()).or_insert(created);
            }
            CommandKind::SectionAdd(args) => {
                self.sections
                    .entry((args.project_id.clone(), args.name.clone()))
                    .or_insert(created);
            }
            _ => {}
        }
    }

    /// Reference to a created project.
    #[must_use]
    pub fn project(&self, name: &str) -> Option<&ItemRef> {
        self.projects.get(name)
    }

    /// Reference to a created section of `project`.
    #[must_use]
    pub fn section(&self, project: &ItemRef, name: &str) -> Option<&ItemRef> {
        self.sections.get(&(project.clone(), name.to_string()))
    }

    /// Replaces temp ids with the ids a push assigned.
    ///
    /// Entries whose creation the service did not confirm are dropped, so a
    /// later move creates them again.
    pub fn settle(&mut self, response: &SyncResponse) {
        let settle = |reference: ItemRef| match reference {
            ItemRef::Pending(temp_id) => response.resolve(&temp_id).map(ItemRef::resolved),
            resolved @ ItemRef::Resolved(_) => Some(resolved),
        };
        self.projects = std::mem::take(&mut self.projects)
            .into_iter()
            .filter_map(|(name, reference)| Some((name, settle(reference)?)))
            .collect();
        self.sections = std::mem::take(&mut self.sections)
            .into_iter()
            .filter_map(|((project, name), reference)| {
                Some(((settle(project)?, name), settle(reference)?))
            })
            .collect();
    }

    /// Drops every entry a push has settled, once the cache lists them.
    ///
    /// Entries still waiting in the buffer are kept.
    pub fn forget_settled(&mut self) {
        self.projects.retain(|_, reference| reference.pending().is_some());
        self.sections.retain(|_, reference| reference.pending().is_some());
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.sections.is_empty()
    }
}
