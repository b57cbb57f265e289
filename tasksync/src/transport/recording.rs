//! Recording transport for testing and dry runs.
//!
//! Keeps every pushed batch in memory and answers like the remote service
//! would: every command `ok`, every temp id mapped to a fresh sequential id.
//! Pulls return queued responses, or an empty delta when none is queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tasksync_proto::command::Command;
use tasksync_proto::sync::{PullRequest, PullResponse, SyncResponse};

use super::{SyncTransport, TransportError};

/// In-process [`SyncTransport`] that records batches.
#[derive(Debug)]
pub struct RecordingTransport {
    batches: Mutex<Vec<Vec<Command>>>,
    next_id: AtomicU64,
    fail_status: Mutex<Option<u16>>,
    pull_responses: Mutex<VecDeque<PullResponse>>,
    pull_tokens: Mutex<Vec<String>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Creates a transport whose assigned ids start at 1000.
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            fail_status: Mutex::new(None),
            pull_responses: Mutex::new(VecDeque::new()),
            pull_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Makes subsequent pushes and pulls fail with the given HTTP status, or
    /// succeed again with `None`. Failed requests are not recorded.
    pub fn fail_with(&self, status: Option<u16>) {
        *self.fail_status.lock() = status;
    }

    /// Returns a copy of every batch pushed so far.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<Command>> {
        self.batches.lock().clone()
    }

    /// Queues the response for a later pull.
    pub fn queue_pull(&self, response: PullResponse) {
        self.pull_responses.lock().push_back(response);
    }

    /// Returns the sync token of every pull so far.
    #[must_use]
    pub fn pull_tokens(&self) -> Vec<String> {
        self.pull_tokens.lock().clone()
    }

    /// Returns every pushed command, flattened in push order.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    fn check_failure(&self) -> Result<(), TransportError> {
        match *self.fail_status.lock() {
            Some(status) => Err(TransportError::Status {
                status,
                body: "simulated failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl SyncTransport for RecordingTransport {
    async fn push(&self, commands: &[Command]) -> Result<SyncResponse, TransportError> {
        self.check_failure()?;

        let mut response = SyncResponse::default();
        for command in commands {
            response
                .sync_status
                .insert(command.uuid.to_string(), Value::from("ok"));
            if let Some(temp_id) = &command.temp_id {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                response
                    .temp_id_mapping
                    .insert(temp_id.to_string(), id.to_string());
            }
        }
        self.batches.lock().push(commands.to_vec());
        tracing::debug!(count = commands.len(), "recorded sync batch");
        Ok(response)
    }

    async fn pull(&self, request: &PullRequest<'_>) -> Result<PullResponse, TransportError> {
        self.check_failure()?;
        self.pull_tokens.lock().push(request.sync_token.to_string());
        let response = self
            .pull_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| PullResponse {
                sync_token: request.sync_token.to_string(),
                ..PullResponse::default()
            });
        tracing::debug!(token = %response.sync_token, "recorded pull");
        Ok(response)
    }
}
