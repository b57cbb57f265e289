//! Host hook orchestration.
//!
//! The host task manager runs `on-add` with one JSON line on stdin and
//! `on-modify` with two (before, after). A hook must print the task line the
//! host should persist, followed by an optional feedback line, and exit 0 to
//! accept the change.

use std::io::BufRead;

use crate::model::{ModelError, TaskSnapshot};
use crate::provider::{Provider, ProviderError, Writeback};
use crate::store::LookupStore;
use crate::transport::SyncTransport;
use tasksync_proto::command::ItemRef;

/// Errors raised while running a hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A task line could not be parsed.
    #[error("invalid task: {0}")]
    Model(#[from] ModelError),

    /// Translation or push failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Stdin ended before the expected number of lines.
    #[error("expected {expected} task line(s) on stdin, got {got}")]
    MissingInput {
        /// Lines the hook needs.
        expected: usize,
        /// Lines actually read.
        got: usize,
    },

    /// Reading stdin failed.
    #[error("failed to read hook input: {0}")]
    Io(#[from] std::io::Error),
}

/// What a hook hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HookOutput {
    /// Task to persist.
    pub task: TaskSnapshot,
    /// One-line summary for the user.
    pub feedback: String,
}

impl HookOutput {
    /// Task line to print.
    #[must_use]
    pub fn task_json(&self) -> String {
        self.task.to_json()
    }

    /// Records remote ids assigned by a push on the output task.
    pub fn apply_writebacks(&mut self, writebacks: &[Writeback]) {
        if let Some(writeback) = writebacks.iter().find(|w| w.task == self.task.uuid()) {
            self.task = self
                .task
                .clone()
                .with_remote_id(ItemRef::resolved(writeback.remote_id.clone()));
        }
    }
}

/// Reads exactly `count` non-empty lines from the hook's stdin.
///
/// # Errors
///
/// Returns [`HookError::MissingInput`] if fewer lines are available, or
/// [`HookError::Io`] if reading fails.
pub fn read_lines(reader: impl BufRead, count: usize) -> Result<Vec<String>, HookError> {
    let mut lines = Vec::with_capacity(count);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push(line);
        if lines.len() == count {
            return Ok(lines);
        }
    }
    Err(HookError::MissingInput {
        expected: count,
        got: lines.len(),
    })
}

/// Handles an added task: buffers its creation and stamps the zone its due
/// date was rendered in. Tasks that are not synchronized, such as recurring
/// templates, pass through unchanged.
///
/// # Errors
///
/// Returns [`HookError::Model`] if the line is not a valid task.
pub fn on_add<S, T>(provider: &mut Provider<S, T>, line: &str) -> Result<HookOutput, HookError>
where
    S: LookupStore,
    T: SyncTransport,
{
    let task = TaskSnapshot::from_json(line)?;
    let zone = provider.translator().zone_for(&task);
    let batch = provider.on_add(&task);
    tracing::info!(task = %task.uuid(), commands = batch.commands.len(), "on-add");
    let task = if batch.created.is_some() {
        task.with_timezone(zone)
    } else {
        task
    };
    Ok(HookOutput {
        task,
        feedback: batch.feedback(),
    })
}

/// Handles a modified task.
///
/// # Errors
///
/// Returns [`HookError::Model`] if either line is not a valid task, or
/// [`HookError::Provider`] if no batch can be built for the change.
pub fn on_modify<S, T>(
    provider: &mut Provider<S, T>,
    old_line: &str,
    new_line: &str,
) -> Result<HookOutput, HookError>
where
    S: LookupStore,
    T: SyncTransport,
{
    let old = TaskSnapshot::from_json(old_line)?;
    let new = TaskSnapshot::from_json(new_line)?;
    let zone = provider.translator().zone_for(&new);
    let batch = provider.on_modify(&old, &new)?;
    tracing::info!(
        task = %new.uuid(),
        commands = batch.commands.len(),
        actions = ?batch.actions,
        "on-modify"
    );
    let task = if batch.created.is_some() {
        new.with_timezone(zone)
    } else {
        new
    };
    Ok(HookOutput {
        task,
        feedback: batch.feedback(),
    })
}
