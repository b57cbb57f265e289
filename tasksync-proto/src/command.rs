//! Remote Sync API command records.
//!
//! A [`Command`] is one write request in a sync batch, serialized as
//! `{"type": ..., "args": {...}, "uuid": ..., "temp_id"?: ...}`. Arguments are
//! typed per command kind. Optional arguments that are unset are omitted from
//! the wire entirely: the remote service reads absence as "no change" for
//! updates and "use default" for creates.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Client-generated identifier of a single command (UUID v4).
///
/// The remote service keys its per-command status on this value, which also
/// makes replaying a batch idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Creates a fresh random command identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `CommandId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Placeholder identifier for an object created by an earlier command in the
/// same batch.
///
/// The remote service maps each temp id to the real id it assigns, and
/// substitutes it wherever later commands in the batch reference it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// Creates a fresh random temp id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing temp id string (e.g. the host task's uuid).
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the string form sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a remote object.
///
/// Either the id the server already assigned, or the temp id of a creation
/// command that precedes the referencing command in the same batch. Both
/// serialize as a bare string; the distinction only matters for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemRef {
    /// Server-assigned identifier.
    Resolved(String),
    /// Temp id of an object created earlier in the batch.
    Pending(TempId),
}

impl ItemRef {
    /// Wraps a server-assigned id.
    pub fn resolved(id: impl Into<String>) -> Self {
        Self::Resolved(id.into())
    }

    /// Returns the string sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(id) => id,
            Self::Pending(temp_id) => temp_id.as_str(),
        }
    }

    /// Returns the temp id if this reference is still pending.
    #[must_use]
    pub const fn pending(&self) -> Option<&TempId> {
        match self {
            Self::Resolved(_) => None,
            Self::Pending(temp_id) => Some(temp_id),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Priority on the remote service's own 1..=4 scale, where 4 is most urgent
/// and 1 means "no priority".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePriority(u8);

impl RemotePriority {
    /// Lowest ordinal; also the value that clears a priority.
    pub const NONE: Self = Self(1);
    /// Ordinal 2.
    pub const LOW: Self = Self(2);
    /// Ordinal 3.
    pub const MEDIUM: Self = Self(3);
    /// Highest ordinal.
    pub const URGENT: Self = Self(4);

    /// Validates a raw ordinal.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value >= 1 && value <= 4 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the raw ordinal.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Due date in the remote format.
///
/// `date` is either a calendar date (`YYYY-MM-DD`, an all-day due date) or a
/// UTC timestamp with microseconds and a `Z` suffix. Timed values carry the
/// owning zone name so the service can render them in local time.
///
/// All-day values never carry `timezone`. The calendar date was already taken
/// in the owning zone, and the service treats a zoned all-day date as
/// floating anyway, so sending the name would only suggest a conversion that
/// does not happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Due {
    /// Date or UTC date-time string.
    pub date: String,
    /// IANA zone name; present for timed due dates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Always sent; recurrence is never produced by translation.
    #[serde(default)]
    pub is_recurring: bool,
}

impl Due {
    /// Returns `true` if this is an all-day (date-only) value.
    #[must_use]
    pub fn is_date_only(&self) -> bool {
        !self.date.contains('T')
    }
}

/// A field of an update command that may be left alone, explicitly
/// cleared, or set.
///
/// `Unchanged` is omitted from the wire; `Cleared` is sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Field is not part of this update.
    Unchanged,
    /// Field is removed on the remote object.
    Cleared,
    /// Field takes a new value.
    Set(T),
}

impl<T> Patch<T> {
    /// Returns `true` if the field is not part of the update.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unchanged | Self::Cleared => serializer.serialize_none(),
            Self::Set(value) => value.serialize(serializer),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-command arguments
// ---------------------------------------------------------------------------

/// Arguments of `item_add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAddArgs {
    /// Task text.
    pub content: String,
    /// Project to create the item in; the service default otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ItemRef>,
    /// Due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Due>,
    /// Priority on the remote scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<RemotePriority>,
    /// Label names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl ItemAddArgs {
    /// Creates arguments with only the required content set.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            project_id: None,
            due: None,
            priority: None,
            labels: None,
        }
    }
}

/// Arguments of `item_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemUpdateArgs {
    /// Item being updated.
    pub id: ItemRef,
    /// New task text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New or cleared due date.
    #[serde(skip_serializing_if = "Patch::is_unchanged")]
    pub due: Patch<Due>,
    /// New priority; [`RemotePriority::NONE`] clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<RemotePriority>,
    /// Full replacement label list (possibly empty).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Arguments of `item_move`.
///
/// Exactly one destination is set: a section (which implies its project) or
/// a project, which also takes the item out of any section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemMoveArgs {
    /// Item being moved.
    pub id: ItemRef,
    /// Destination project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ItemRef>,
    /// Destination section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<ItemRef>,
}

impl ItemMoveArgs {
    /// Moves `id` to the top level of a project.
    #[must_use]
    pub const fn to_project(id: ItemRef, project_id: ItemRef) -> Self {
        Self {
            id,
            project_id: Some(project_id),
            section_id: None,
        }
    }

    /// Moves `id` into a section.
    #[must_use]
    pub const fn to_section(id: ItemRef, section_id: ItemRef) -> Self {
        Self {
            id,
            project_id: None,
            section_id: Some(section_id),
        }
    }
}

/// Arguments of commands that only name their target (`item_delete`,
/// `item_uncomplete`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemTargetArgs {
    /// Target item.
    pub id: ItemRef,
}

/// Arguments of `item_complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemCompleteArgs {
    /// Item being completed.
    pub id: ItemRef,
    /// Completion time as a UTC timestamp string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_completed: Option<String>,
}

/// Arguments of `project_add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectAddArgs {
    /// Project name.
    pub name: String,
    /// Display color name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Parent project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemRef>,
    /// Sort order among siblings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order: Option<i64>,
    /// Favorite flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    /// View style (`list`, `board`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_style: Option<String>,
}

/// Arguments of `section_add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionAddArgs {
    /// Section name.
    pub name: String,
    /// Project the section belongs to.
    pub project_id: ItemRef,
    /// Sort order within the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_order: Option<i64>,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The kind of a command together with its typed arguments.
///
/// Serialized adjacently as `"type": "<snake_case>", "args": {...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum CommandKind {
    /// Create a task.
    ItemAdd(ItemAddArgs),
    /// Change fields of a task.
    ItemUpdate(ItemUpdateArgs),
    /// Move a task to another project.
    ItemMove(ItemMoveArgs),
    /// Delete a task.
    ItemDelete(ItemTargetArgs),
    /// Complete a task.
    ItemComplete(ItemCompleteArgs),
    /// Reopen a completed task.
    ItemUncomplete(ItemTargetArgs),
    /// Create a project.
    ProjectAdd(ProjectAddArgs),
    /// Create a section within a project.
    SectionAdd(SectionAddArgs),
}

impl CommandKind {
    /// Returns the wire name of this command type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ItemAdd(_) => "item_add",
            Self::ItemUpdate(_) => "item_update",
            Self::ItemMove(_) => "item_move",
            Self::ItemDelete(_) => "item_delete",
            Self::ItemComplete(_) => "item_complete",
            Self::ItemUncomplete(_) => "item_uncomplete",
            Self::ProjectAdd(_) => "project_add",
            Self::SectionAdd(_) => "section_add",
        }
    }

    /// Returns `true` for kinds that create a new remote object.
    #[must_use]
    pub const fn is_creation(&self) -> bool {
        matches!(
            self,
            Self::ItemAdd(_) | Self::ProjectAdd(_) | Self::SectionAdd(_)
        )
    }

    /// Returns every object reference carried in the arguments.
    #[must_use]
    pub fn references(&self) -> Vec<&ItemRef> {
        match self {
            Self::ItemAdd(args) => args.project_id.iter().collect(),
            Self::ItemUpdate(args) => vec![&args.id],
            Self::ItemMove(args) => std::iter::once(&args.id)
                .chain(args.project_id.as_ref())
                .chain(args.section_id.as_ref())
                .collect(),
            Self::ItemDelete(args) | Self::ItemUncomplete(args) => vec![&args.id],
            Self::ItemComplete(args) => vec![&args.id],
            Self::ProjectAdd(args) => args.parent_id.iter().collect(),
            Self::SectionAdd(args) => vec![&args.project_id],
        }
    }
}

/// One remote write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Command type and arguments.
    #[serde(flatten)]
    pub kind: CommandKind,
    /// Client-generated command id.
    pub uuid: CommandId,
    /// Placeholder id for the object this command creates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<TempId>,
}

impl Command {
    /// Creates a command that targets existing objects.
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            uuid: CommandId::new(),
            temp_id: None,
        }
    }

    /// Creates a creation command carrying the given temp id.
    #[must_use]
    pub fn creating(kind: CommandKind, temp_id: TempId) -> Self {
        Self {
            kind,
            uuid: CommandId::new(),
            temp_id: Some(temp_id),
        }
    }

    /// Returns the wire name of this command's type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Error returned by [`check_order`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// A command references a temp id that no earlier command creates.
    #[error("command {index} ({name}) references temp id {temp_id} before it is created")]
    ForwardReference {
        /// Position of the offending command in the batch.
        index: usize,
        /// Wire name of the offending command.
        name: &'static str,
        /// The unresolved temp id.
        temp_id: TempId,
    },
    /// Two creation commands share a temp id.
    #[error("temp id {0} is assigned twice")]
    DuplicateTempId(TempId),
}

/// Verifies that every pending reference in `commands` points at a temp id
/// created by an earlier command.
///
/// # Errors
///
/// Returns [`OrderError`] describing the first violation found.
pub fn check_order(commands: &[Command]) -> Result<(), OrderError> {
    let mut created: HashSet<&TempId> = HashSet::new();
    for (index, command) in commands.iter().enumerate() {
        for reference in command.kind.references() {
            if let Some(temp_id) = reference.pending()
                && !created.contains(temp_id)
            {
                return Err(OrderError::ForwardReference {
                    index,
                    name: command.name(),
                    temp_id: temp_id.clone(),
                });
            }
        }
        if let Some(temp_id) = &command.temp_id
            && !created.insert(temp_id)
        {
            return Err(OrderError::DuplicateTempId(temp_id.clone()));
        }
    }
    Ok(())
}
