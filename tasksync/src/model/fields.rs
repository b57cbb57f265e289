//! Typed task attributes and their host-format spellings.

use std::fmt;

use tasksync_proto::command::RemotePriority;

use super::ModelError;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Open (includes the host's `waiting` state).
    Pending,
    /// Done.
    Completed,
    /// Removed.
    Deleted,
    /// Template that spawns the instances of a recurring task. Templates
    /// are never synchronized; their instances are.
    Recurring,
}

impl Status {
    /// Parses a host status string.
    ///
    /// `waiting` tasks are open tasks with a deferred start and map to
    /// [`Status::Pending`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownStatus`] for anything unrecognized.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "pending" | "waiting" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "deleted" => Ok(Self::Deleted),
            "recurring" => Ok(Self::Recurring),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }

    /// Returns the host spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
            Self::Recurring => "recurring",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// `L`
    Low,
    /// `M`
    Medium,
    /// `H`
    High,
}

impl Priority {
    /// Parses the host's single-letter priority.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidPriority`] for anything but `H`, `M`, `L`.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "H" => Ok(Self::High),
            "M" => Ok(Self::Medium),
            "L" => Ok(Self::Low),
            other => Err(ModelError::InvalidPriority(other.to_string())),
        }
    }

    /// Returns the host letter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "H",
            Self::Medium => "M",
            Self::Low => "L",
        }
    }

    /// Converts to the remote 1..=4 scale. Ordinal 1 is reserved for
    /// "no priority" and is never produced here.
    #[must_use]
    pub const fn to_remote(self) -> RemotePriority {
        match self {
            Self::Low => RemotePriority::LOW,
            Self::Medium => RemotePriority::MEDIUM,
            Self::High => RemotePriority::URGENT,
        }
    }

    /// Inverse of [`Priority::to_remote`]; the cleared ordinal maps to `None`.
    #[must_use]
    pub const fn from_remote(priority: RemotePriority) -> Option<Self> {
        match priority.value() {
            2 => Some(Self::Low),
            3 => Some(Self::Medium),
            4 => Some(Self::High),
            _ => None,
        }
    }
}

/// Label set of a task.
///
/// Equality ignores order and duplicates; iteration keeps the order the
/// host listed them in, which is the order sent to the remote service.
#[derive(Debug, Clone, Default, Eq)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Builds a tag list, dropping repeated names.
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        Self(out)
    }

    /// Returns `true` if there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if `tag` is present.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Iterates in host order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns an owned copy in host order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|tag| other.contains(tag))
    }
}
