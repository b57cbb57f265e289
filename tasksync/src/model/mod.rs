//! Field model for host task records.
//!
//! A [`TaskSnapshot`] is one immutable view of a task as the host task
//! manager prints it on a hook's stdin: a single JSON object per line. Only
//! the attributes that are synchronized are typed; every other key is kept
//! verbatim so that writing the record back never drops host data.

mod fields;

pub use fields::{Priority, Status, Tags};

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tasksync_proto::command::ItemRef;
use thiserror::Error;
use uuid::Uuid;

/// Host date format (always UTC).
pub const HOST_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Host attribute holding the remote item id.
pub const REMOTE_ID_KEY: &str = "todoist";

/// Host attribute holding the task's IANA zone name.
pub const TIMEZONE_KEY: &str = "timezone";

/// Host attribute holding the name of the section within the project.
pub const SECTION_KEY: &str = "section";

const TYPED_KEYS: &[&str] = &[
    "uuid",
    "description",
    "status",
    "due",
    "end",
    "priority",
    "tags",
    "project",
    REMOTE_ID_KEY,
    TIMEZONE_KEY,
    SECTION_KEY,
];

/// Errors raised while reading a host task record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Input is not valid JSON.
    #[error("invalid task JSON: {0}")]
    InvalidJson(String),
    /// Input is JSON but not an object.
    #[error("task record is not a JSON object")]
    NotAnObject,
    /// A required attribute is absent.
    #[error("task record is missing required field '{0}'")]
    MissingField(&'static str),
    /// The status is not one that can be synchronized.
    #[error("unsupported task status '{0}'")]
    UnknownStatus(String),
    /// The priority letter is not `H`, `M` or `L`.
    #[error("invalid priority '{0}'")]
    InvalidPriority(String),
    /// A date attribute does not use the host date format.
    #[error("invalid date in field '{field}': {value}")]
    InvalidDate {
        /// Attribute name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// The zone name is not a known IANA zone.
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
    /// An attribute has the wrong JSON type or shape.
    #[error("invalid value for field '{field}': {reason}")]
    InvalidField {
        /// Attribute name.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// Parses a host-format date (`YYYYMMDDTHHMMSSZ`).
#[must_use]
pub fn parse_host_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, HOST_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Formats an instant in the host date format.
#[must_use]
pub fn format_host_date(value: DateTime<Utc>) -> String {
    value.format(HOST_DATE_FORMAT).to_string()
}

/// One point-in-time view of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    uuid: Uuid,
    description: String,
    status: Status,
    due: Option<DateTime<Utc>>,
    priority: Option<Priority>,
    tags: Tags,
    project: Option<String>,
    section: Option<String>,
    remote_id: Option<ItemRef>,
    completed_at: Option<DateTime<Utc>>,
    timezone: Option<Tz>,
    extra: Map<String, Value>,
}

impl TaskSnapshot {
    /// Creates a snapshot with only the required attributes.
    pub fn new(uuid: Uuid, description: impl Into<String>, status: Status) -> Self {
        Self {
            uuid,
            description: description.into(),
            status,
            due: None,
            priority: None,
            tags: Tags::default(),
            project: None,
            section: None,
            remote_id: None,
            completed_at: None,
            timezone: None,
            extra: Map::new(),
        }
    }

    /// Parses one host JSON line.
    ///
    /// Empty strings in optional attributes are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the line is not a JSON object, a required
    /// attribute (`uuid`, `description`, `status`) is missing, or a typed
    /// attribute cannot be parsed.
    pub fn from_json(line: &str) -> Result<Self, ModelError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| ModelError::InvalidJson(e.to_string()))?;
        let Value::Object(mut map) = value else {
            return Err(ModelError::NotAnObject);
        };

        let uuid_text = required_str(&map, "uuid")?;
        let uuid = Uuid::parse_str(uuid_text).map_err(|e| ModelError::InvalidField {
            field: "uuid",
            reason: e.to_string(),
        })?;
        let description = required_str(&map, "description")?.to_string();
        let status = Status::parse(required_str(&map, "status")?)?;

        let due = optional_str(&map, "due")?
            .map(|v| parse_date_field("due", v))
            .transpose()?;
        let completed_at = optional_str(&map, "end")?
            .map(|v| parse_date_field("end", v))
            .transpose()?;
        let priority = optional_str(&map, "priority")?
            .map(Priority::parse)
            .transpose()?;
        let project = optional_str(&map, "project")?.map(str::to_string);
        let section = optional_str(&map, SECTION_KEY)?.map(str::to_string);
        let timezone = optional_str(&map, TIMEZONE_KEY)?
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| ModelError::InvalidTimezone(name.to_string()))
            })
            .transpose()?;
        let remote_id = remote_id_field(&map)?.map(ItemRef::Resolved);
        let tags = tags_field(&map)?;

        map.retain(|key, _| !TYPED_KEYS.contains(&key.as_str()));

        Ok(Self {
            uuid,
            description,
            status,
            due,
            priority,
            tags,
            project,
            section,
            remote_id,
            completed_at,
            timezone,
            extra: map,
        })
    }

    /// Serializes back to one host JSON line.
    ///
    /// A pending remote id is not written: it only becomes a host attribute
    /// once the remote service has assigned the real id.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.to_map()).to_string()
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("uuid".into(), Value::String(self.uuid.to_string()));
        map.insert("description".into(), Value::String(self.description.clone()));
        map.insert("status".into(), Value::String(self.status.as_str().into()));
        if let Some(due) = self.due {
            map.insert("due".into(), Value::String(format_host_date(due)));
        }
        if let Some(end) = self.completed_at {
            map.insert("end".into(), Value::String(format_host_date(end)));
        }
        if let Some(priority) = self.priority {
            map.insert("priority".into(), Value::String(priority.as_str().into()));
        }
        if !self.tags.is_empty() {
            let tags = self.tags.iter().map(|t| Value::String(t.into())).collect();
            map.insert("tags".into(), Value::Array(tags));
        }
        if let Some(project) = &self.project {
            map.insert("project".into(), Value::String(project.clone()));
        }
        if let Some(section) = &self.section {
            map.insert(SECTION_KEY.into(), Value::String(section.clone()));
        }
        if let Some(ItemRef::Resolved(id)) = &self.remote_id {
            map.insert(REMOTE_ID_KEY.into(), Value::String(id.clone()));
        }
        if let Some(zone) = self.timezone {
            map.insert(TIMEZONE_KEY.into(), Value::String(zone.name().into()));
        }
        map
    }

    // -- accessors --

    /// Host task uuid.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Task text.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Due instant.
    #[must_use]
    pub const fn due(&self) -> Option<&DateTime<Utc>> {
        self.due.as_ref()
    }

    /// Priority tier.
    #[must_use]
    pub const fn priority(&self) -> Option<&Priority> {
        self.priority.as_ref()
    }

    /// Labels.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Project name.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Section name within the project.
    #[must_use]
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// Remote item id, resolved or pending.
    #[must_use]
    pub const fn remote_id(&self) -> Option<&ItemRef> {
        self.remote_id.as_ref()
    }

    /// Completion instant.
    #[must_use]
    pub const fn completed_at(&self) -> Option<&DateTime<Utc>> {
        self.completed_at.as_ref()
    }

    /// Zone the task's due date is interpreted in, if recorded.
    #[must_use]
    pub const fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    /// Returns a host attribute that is not one of the typed fields.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    // -- builders --

    /// Sets the due instant.
    #[must_use]
    pub const fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the project name.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the section name.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Sets the remote id.
    #[must_use]
    pub fn with_remote_id(mut self, remote_id: ItemRef) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    /// Sets the completion instant.
    #[must_use]
    pub const fn with_completed_at(mut self, end: DateTime<Utc>) -> Self {
        self.completed_at = Some(end);
        self
    }

    /// Sets the zone.
    #[must_use]
    pub const fn with_timezone(mut self, zone: Tz) -> Self {
        self.timezone = Some(zone);
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn required_str<'m>(map: &'m Map<String, Value>, field: &'static str) -> Result<&'m str, ModelError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(ModelError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ModelError::InvalidField {
            field,
            reason: "expected a string".into(),
        }),
    }
}

fn optional_str<'m>(
    map: &'m Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'m str>, ModelError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ModelError::InvalidField {
            field,
            reason: "expected a string".into(),
        }),
    }
}

fn parse_date_field(field: &'static str, value: &str) -> Result<DateTime<Utc>, ModelError> {
    parse_host_date(value).ok_or_else(|| ModelError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// The host stores UDAs as strings, but older records may carry a number.
fn remote_id_field(map: &Map<String, Value>) -> Result<Option<String>, ModelError> {
    match map.get(REMOTE_ID_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ModelError::InvalidField {
            field: REMOTE_ID_KEY,
            reason: "expected a string or number".into(),
        }),
    }
}

fn tags_field(map: &Map<String, Value>) -> Result<Tags, ModelError> {
    let invalid = || ModelError::InvalidField {
        field: "tags",
        reason: "expected an array of strings".into(),
    };
    match map.get("tags") {
        None | Some(Value::Null) => Ok(Tags::default()),
        Some(Value::Array(items)) => {
            let names = items
                .iter()
                .map(|item| item.as_str().ok_or_else(invalid))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Tags::new(names))
        }
        Some(_) => Err(invalid()),
    }
}
