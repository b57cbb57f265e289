//! Messages exchanged between hook processes and the background daemon.
//!
//! A hook connects, sends one [`DaemonRequest`], reads one
//! [`DaemonResponse`], and disconnects. Task snapshots travel as the raw
//! JSON text the host task manager produced, so the daemon sees exactly what
//! the hook saw.

use serde::{Deserialize, Serialize};

/// Request from a hook (or the control CLI) to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonRequest {
    /// A task was created locally.
    OnAdd {
        /// Task JSON as emitted by the host.
        task: String,
    },
    /// A task was modified locally.
    OnModify {
        /// Task JSON before the edit.
        old: String,
        /// Task JSON after the edit.
        new: String,
    },
    /// Push anything buffered, then refresh the lookup cache.
    Sync {
        /// Discard the sync token and fetch every object.
        full: bool,
    },
    /// Ask for process status.
    Status,
    /// Flush pending commands and exit.
    Stop,
}

impl DaemonRequest {
    /// Returns a short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OnAdd { .. } => "on-add",
            Self::OnModify { .. } => "on-modify",
            Self::Sync { .. } => "sync",
            Self::Status => "status",
            Self::Stop => "stop",
        }
    }
}

/// Reply from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonResponse {
    /// Result of an `OnAdd`/`OnModify` request.
    Feedback {
        /// Task JSON the hook should hand back to the host.
        task: String,
        /// One-line human-readable summary.
        message: String,
    },
    /// Reply to `Sync`.
    Synced {
        /// Number of cached objects added, changed or removed.
        changed: u32,
    },
    /// Reply to `Status`.
    Status {
        /// Daemon process id.
        pid: u32,
        /// Number of buffered commands not yet pushed.
        pending: u32,
    },
    /// Reply to `Stop`; the daemon exits after sending it.
    Stopping,
    /// The request could not be handled.
    Error {
        /// Human-readable reason.
        reason: String,
    },
}
