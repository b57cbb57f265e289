//! Envelopes for the remote Sync API.
//!
//! A push sends a command batch and reads back per-command status. A pull
//! sends the last sync token and reads back every object changed since.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::command::{Command, TempId};

/// Request body: `{"commands": [...]}`.
#[derive(Debug, Serialize)]
pub struct SyncRequest<'a> {
    /// Commands in execution order.
    pub commands: &'a [Command],
}

/// Response body of a sync call.
///
/// `sync_status` maps each command uuid to either the string `"ok"` or an
/// error object. `temp_id_mapping` maps temp ids to the ids the service
/// assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Per-command outcome keyed by command uuid.
    #[serde(default)]
    pub sync_status: HashMap<String, serde_json::Value>,
    /// Temp id to real id.
    #[serde(default)]
    pub temp_id_mapping: HashMap<String, String>,
}

impl SyncResponse {
    /// Returns the real id assigned for a temp id, if any.
    #[must_use]
    pub fn resolve(&self, temp_id: &TempId) -> Option<&str> {
        self.temp_id_mapping.get(temp_id.as_str()).map(String::as_str)
    }

    /// Returns the commands the service did not accept, with their error
    /// payloads, sorted by command uuid.
    #[must_use]
    pub fn failures(&self) -> Vec<(&str, &serde_json::Value)> {
        let mut failed: Vec<_> = self
            .sync_status
            .iter()
            .filter(|(_, status)| status.as_str() != Some("ok"))
            .map(|(uuid, status)| (uuid.as_str(), status))
            .collect();
        failed.sort_by_key(|(uuid, _)| *uuid);
        failed
    }
}

/// Sync token that requests every object rather than a delta.
pub const FULL_SYNC_TOKEN: &str = "*";

/// Pull request body: `{"sync_token": ..., "resource_types": [...]}`.
#[derive(Debug, Serialize)]
pub struct PullRequest<'a> {
    /// Token from the previous pull, or [`FULL_SYNC_TOKEN`].
    pub sync_token: &'a str,
    /// Collections to return.
    pub resource_types: &'a [&'a str],
}

/// Pull response body.
///
/// With `full_sync` set each array is the complete collection. Otherwise it
/// holds only the objects changed since the request's token; removed
/// objects come back with `"is_deleted": true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Token to send with the next pull.
    pub sync_token: String,
    /// Whether the arrays replace the cached collections.
    #[serde(default)]
    pub full_sync: bool,
    /// Changed items.
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    /// Changed labels.
    #[serde(default)]
    pub labels: Vec<serde_json::Value>,
    /// Changed projects.
    #[serde(default)]
    pub projects: Vec<serde_json::Value>,
    /// Changed sections.
    #[serde(default)]
    pub sections: Vec<serde_json::Value>,
}

impl PullResponse {
    /// Returns the objects of a collection by its remote name.
    #[must_use]
    pub fn resource(&self, name: &str) -> &[serde_json::Value] {
        match name {
            "items" => &self.items,
            "labels" => &self.labels,
            "projects" => &self.projects,
            "sections" => &self.sections,
            _ => &[],
        }
    }
}
