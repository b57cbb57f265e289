//! Assembly of builder output into the batch sent for one host event.

use std::fmt;

use tasksync_proto::command::{Command, ItemRef, TempId};
use uuid::Uuid;

use super::builders::complete_command;
use super::{TranslateError, Translator};
use crate::model::{Status, TaskSnapshot};
use crate::store::LookupStore;

/// What a batch does to the task, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `item_add`
    Created,
    /// `item_update`
    Updated,
    /// `item_move` (with any `project_add` or `section_add` it needs)
    Moved,
    /// `item_delete`
    Deleted,
    /// `item_complete`
    Completed,
    /// `item_uncomplete`
    Uncompleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Moved => "moved",
            Self::Deleted => "deleted",
            Self::Completed => "completed",
            Self::Uncompleted => "uncompleted",
        })
    }
}

/// A task created by a batch, whose real id must be written back to the
/// host once the remote service assigns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Host task uuid.
    pub task: Uuid,
    /// Temp id of the `item_add`.
    pub temp_id: TempId,
}

/// Ordered commands for one host event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Commands in execution order.
    pub commands: Vec<Command>,
    /// Actions taken, for feedback.
    pub actions: Vec<Action>,
    /// Set when the batch creates the task.
    pub created: Option<Created>,
}

impl Batch {
    /// Returns `true` if there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Human-readable summary for the host's feedback line.
    ///
    /// `Todoist: item updated`, `Todoist: item updated and moved`,
    /// `Todoist: item updated, moved, and completed`, or
    /// `Todoist: update not required` for an empty batch.
    #[must_use]
    pub fn feedback(&self) -> String {
        let words: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        match words.as_slice() {
            [] => "Todoist: update not required".to_string(),
            [one] => format!("Todoist: item {one}"),
            [first, second] => format!("Todoist: item {first} and {second}"),
            [rest @ .., last] => format!("Todoist: item {}, and {last}", rest.join(", ")),
        }
    }

    fn push(&mut self, action: Action, commands: impl IntoIterator<Item = Command>) {
        let before = self.commands.len();
        self.commands.extend(commands);
        if self.commands.len() > before {
            self.actions.push(action);
        }
    }
}

impl<S: LookupStore + ?Sized> Translator<'_, S> {
    /// Batch for a newly added task: create it, then complete it if it was
    /// logged as already done. Recurring templates need nothing.
    #[must_use]
    pub fn on_add(&self, task: &TaskSnapshot) -> Batch {
        let mut batch = Batch::default();
        if task.status() == Status::Recurring {
            tracing::debug!(task = %task.uuid(), "recurring template is not synchronized");
            return batch;
        }
        let add = self.add_item(task);
        let Some(temp_id) = add.temp_id.clone() else {
            return batch;
        };
        batch.push(Action::Created, [add]);
        if task.status() == Status::Completed {
            let command = complete_command(ItemRef::Pending(temp_id.clone()), task);
            batch.push(Action::Completed, [command]);
        }
        batch.created = Some(Created {
            task: task.uuid(),
            temp_id,
        });
        batch
    }

    /// Batch for a modified task.
    ///
    /// Recurring templates need nothing. A task without a remote id is
    /// created first (unless it is being deleted, which needs nothing).
    /// Otherwise the batch holds the update, then the move, then the first
    /// status transition that applies.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError`] from the builders; no partial batch is
    /// returned.
    pub fn on_modify(&self, old: &TaskSnapshot, new: &TaskSnapshot) -> Result<Batch, TranslateError> {
        if new.status() == Status::Recurring {
            tracing::debug!(task = %new.uuid(), "recurring template is not synchronized");
            return Ok(Batch::default());
        }
        if new.remote_id().is_none() {
            if new.status() == Status::Deleted {
                tracing::debug!(task = %new.uuid(), "deleted task never reached remote");
                return Ok(Batch::default());
            }
            tracing::debug!(task = %new.uuid(), "modified task has no remote id, creating");
            return Ok(self.on_add(new));
        }

        let mut batch = Batch::default();
        batch.push(Action::Updated, self.update_item(old, new)?);
        batch.push(Action::Moved, self.move_item(old, new)?);
        if let Some(command) = self.delete_item(old, new)? {
            batch.push(Action::Deleted, [command]);
        } else if let Some(command) = self.complete_item(old, new)? {
            batch.push(Action::Completed, [command]);
        } else if let Some(command) = self.uncomplete_item(old, new)? {
            batch.push(Action::Uncompleted, [command]);
        }
        Ok(batch)
    }
}
