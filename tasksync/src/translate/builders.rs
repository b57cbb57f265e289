//! One builder per remote action.
//!
//! Builders are pure: the same inputs and store contents always give
//! commands with the same shape (only the random `uuid`/`temp_id` values
//! differ). Each returns nothing when its change does not apply, so callers
//! may invoke any of them unconditionally.

use tasksync_proto::command::{
    Command, CommandKind, ItemAddArgs, ItemCompleteArgs, ItemMoveArgs, ItemRef, ItemTargetArgs,
    ItemUpdateArgs, Patch, ProjectAddArgs, RemotePriority, SectionAddArgs, TempId,
};

use super::diff::{self, Change};
use super::{TranslateError, Translator, due};
use crate::model::{Status, TaskSnapshot};
use crate::store::LookupStore;

/// Attributes of a project to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Temp id to assign; a fresh one is generated when unset.
    pub temp_id: Option<TempId>,
    /// Display color name.
    pub color: Option<String>,
    /// Parent project.
    pub parent_id: Option<ItemRef>,
    /// Sort order among siblings.
    pub child_order: Option<i64>,
    /// Favorite flag.
    pub is_favorite: Option<bool>,
    /// View style.
    pub view_style: Option<String>,
}

impl NewProject {
    /// A project with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Builds a `project_add` command.
///
/// Only the attributes that are set become `args` keys.
#[must_use]
pub fn create_project(project: NewProject) -> Command {
    let temp_id = project.temp_id.unwrap_or_default();
    let args = ProjectAddArgs {
        name: project.name,
        color: project.color,
        parent_id: project.parent_id,
        child_order: project.child_order,
        is_favorite: project.is_favorite,
        view_style: project.view_style,
    };
    Command::creating(CommandKind::ProjectAdd(args), temp_id)
}

/// Attributes of a section to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    /// Section name.
    pub name: String,
    /// Owning project.
    pub project_id: ItemRef,
    /// Temp id to assign; a fresh one is generated when unset.
    pub temp_id: Option<TempId>,
    /// Sort order within the project.
    pub section_order: Option<i64>,
}

impl NewSection {
    /// A section with just a name and its project.
    pub fn new(name: impl Into<String>, project_id: ItemRef) -> Self {
        Self {
            name: name.into(),
            project_id,
            temp_id: None,
            section_order: None,
        }
    }
}

/// Builds a `section_add` command.
#[must_use]
pub fn create_section(section: NewSection) -> Command {
    let temp_id = section.temp_id.unwrap_or_default();
    let args = SectionAddArgs {
        name: section.name,
        project_id: section.project_id,
        section_order: section.section_order,
    };
    Command::creating(CommandKind::SectionAdd(args), temp_id)
}

fn target(task: &TaskSnapshot, command: &'static str) -> Result<ItemRef, TranslateError> {
    task.remote_id()
        .cloned()
        .ok_or(TranslateError::MissingTarget { command })
}

impl<S: LookupStore + ?Sized> Translator<'_, S> {
    /// Builds the `item_add` for a task that does not exist remotely yet.
    ///
    /// A project that is neither in the store nor created earlier is left
    /// out rather than created; a later move creates it.
    #[must_use]
    pub fn add_item(&self, task: &TaskSnapshot) -> Command {
        let mut args = ItemAddArgs::new(task.description());
        args.project_id = task.project().and_then(|name| self.project_ref(name));
        args.due = task
            .due()
            .map(|due| due::to_remote(*due, self.zone_for(task)));
        args.priority = task.priority().map(|p| p.to_remote());
        if !task.tags().is_empty() {
            args.labels = Some(task.tags().to_vec());
        }
        Command::creating(CommandKind::ItemAdd(args), TempId::new())
    }

    /// Builds the `item_update` for changed content, due date, priority or
    /// labels, if any changed.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::MissingTarget`] if an update is needed and
    /// `new` has no remote id.
    pub fn update_item(
        &self,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
    ) -> Result<Option<Command>, TranslateError> {
        let content = match diff::change(old, new, |t| Some(t.description())) {
            Change::Updated(text) => Some(text.to_string()),
            Change::Unchanged | Change::Removed => None,
        };
        let due = match diff::change(old, new, TaskSnapshot::due) {
            Change::Updated(due) => Patch::Set(due::to_remote(*due, self.zone_for(new))),
            Change::Removed => Patch::Cleared,
            Change::Unchanged => Patch::Unchanged,
        };
        let priority = match diff::change(old, new, TaskSnapshot::priority) {
            Change::Updated(p) => Some(p.to_remote()),
            Change::Removed => Some(RemotePriority::NONE),
            Change::Unchanged => None,
        };
        let labels = match diff::change(old, new, |t| Some(t.tags())) {
            Change::Updated(tags) => Some(tags.to_vec()),
            Change::Removed => Some(Vec::new()),
            Change::Unchanged => None,
        };

        if content.is_none() && due.is_unchanged() && priority.is_none() && labels.is_none() {
            return Ok(None);
        }

        let args = ItemUpdateArgs {
            id: target(new, "item_update")?,
            content,
            due,
            priority,
            labels,
        };
        Ok(Some(Command::new(CommandKind::ItemUpdate(args))))
    }

    /// Builds the commands that move a task to its new project or section.
    ///
    /// A project or section that is not known yet is created in the same
    /// batch, ahead of the move that references its temp id. A removed
    /// project sends the task to the default project. A task with a section
    /// moves into that section of its project; a task whose section was
    /// removed moves to the top level of its project.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::DefaultProjectMissing`] if the task has no
    /// project and the default project is not in the store, or
    /// [`TranslateError::MissingTarget`] if a move is needed and `new` has
    /// no remote id.
    pub fn move_item(
        &self,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
    ) -> Result<Vec<Command>, TranslateError> {
        let project = diff::change(old, new, TaskSnapshot::project);
        let section = diff::change(old, new, TaskSnapshot::section);
        if matches!(project, Change::Unchanged) && matches!(section, Change::Unchanged) {
            return Ok(Vec::new());
        }
        let id = target(new, "item_move")?;

        let mut commands = Vec::new();
        let project_id = match new.project() {
            Some(name) => self.project_ref(name).unwrap_or_else(|| {
                let temp_id = TempId::new();
                tracing::debug!(project = name, %temp_id, "creating missing project");
                commands.push(create_project(NewProject {
                    temp_id: Some(temp_id.clone()),
                    ..NewProject::named(name)
                }));
                ItemRef::Pending(temp_id)
            }),
            None => self
                .resolve_project(&self.default_project)
                .map(ItemRef::Resolved)
                .ok_or_else(|| TranslateError::DefaultProjectMissing {
                    name: self.default_project.clone(),
                })?,
        };

        let args = match new.section() {
            Some(name) => {
                let section_id = self.section_ref(&project_id, name).unwrap_or_else(|| {
                    let temp_id = TempId::new();
                    tracing::debug!(section = name, %temp_id, "creating missing section");
                    commands.push(create_section(NewSection {
                        temp_id: Some(temp_id.clone()),
                        ..NewSection::new(name, project_id.clone())
                    }));
                    ItemRef::Pending(temp_id)
                });
                ItemMoveArgs::to_section(id, section_id)
            }
            None => ItemMoveArgs::to_project(id, project_id),
        };
        commands.push(Command::new(CommandKind::ItemMove(args)));
        Ok(commands)
    }

    /// Builds an `item_delete` if the task just became deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::MissingTarget`] if the transition applies
    /// and `new` has no remote id.
    pub fn delete_item(
        &self,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
    ) -> Result<Option<Command>, TranslateError> {
        if old.status() == Status::Deleted || new.status() != Status::Deleted {
            return Ok(None);
        }
        let args = ItemTargetArgs {
            id: target(new, "item_delete")?,
        };
        Ok(Some(Command::new(CommandKind::ItemDelete(args))))
    }

    /// Builds an `item_complete` if the task just became completed.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::MissingTarget`] if the transition applies
    /// and `new` has no remote id.
    pub fn complete_item(
        &self,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
    ) -> Result<Option<Command>, TranslateError> {
        if old.status() == Status::Completed || new.status() != Status::Completed {
            return Ok(None);
        }
        Ok(Some(complete_command(target(new, "item_complete")?, new)))
    }

    /// Builds an `item_uncomplete` if the task was reopened.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::MissingTarget`] if the transition applies
    /// and `new` has no remote id.
    pub fn uncomplete_item(
        &self,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
    ) -> Result<Option<Command>, TranslateError> {
        if old.status() != Status::Completed || new.status() == Status::Completed {
            return Ok(None);
        }
        let args = ItemTargetArgs {
            id: target(new, "item_uncomplete")?,
        };
        Ok(Some(Command::new(CommandKind::ItemUncomplete(args))))
    }
}

pub(super) fn complete_command(id: ItemRef, task: &TaskSnapshot) -> Command {
    let args = ItemCompleteArgs {
        id,
        date_completed: task.completed_at().map(|end| due::format_timestamp(*end)),
    };
    Command::new(CommandKind::ItemComplete(args))
}
