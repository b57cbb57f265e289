//! Recording assigned remote ids on host tasks.
//!
//! By the time the daemon pushes, the hook that created a task has long
//! returned, so the new id is written with a separate host invocation
//! (with hooks disabled, so the write does not loop back to the daemon).

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tasksync::model::REMOTE_ID_KEY;
use tasksync::provider::Writeback;

/// Errors raised while applying a writeback.
#[derive(Debug, thiserror::Error)]
pub enum WritebackError {
    /// The host executable could not be run.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Executable that was attempted.
        program: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The host exited unsuccessfully.
    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        /// Executable that was run.
        program: PathBuf,
        /// Exit code, if any.
        code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
}

/// Destination for remote ids assigned by a push.
pub trait WritebackSink: Send + Sync {
    /// Records `writeback.remote_id` on the host task `writeback.task`.
    fn apply(
        &self,
        writeback: &Writeback,
    ) -> impl Future<Output = Result<(), WritebackError>> + Send;
}

/// Runs `<task> rc.hooks=off <uuid> modify todoist=<id>`.
#[derive(Debug, Clone)]
pub struct TaskCommand {
    program: PathBuf,
}

impl TaskCommand {
    /// Uses `program` as the host executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed for one writeback.
    #[must_use]
    pub fn args(writeback: &Writeback) -> [String; 4] {
        [
            "rc.hooks=off".to_string(),
            writeback.task.to_string(),
            "modify".to_string(),
            format!("{REMOTE_ID_KEY}={}", writeback.remote_id),
        ]
    }
}

impl WritebackSink for TaskCommand {
    async fn apply(&self, writeback: &Writeback) -> Result<(), WritebackError> {
        let output = tokio::process::Command::new(&self.program)
            .args(Self::args(writeback))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| WritebackError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(WritebackError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::info!(task = %writeback.task, remote_id = %writeback.remote_id, "wrote back remote id");
        Ok(())
    }
}
