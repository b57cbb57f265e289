//! Delivery of command batches to, and changes from, the remote Sync API.
//!
//! Defines the [`SyncTransport`] trait. Implementations:
//! - [`http::HttpTransport`]: posts batches to the Sync endpoint
//! - [`recording::RecordingTransport`]: in-process stand-in for tests and dry runs
//!
//! Transports send exactly what they are given, once. Retrying and
//! folding pulled changes into the local cache are left to the caller.

pub mod http;
pub mod recording;

pub use http::HttpTransport;
pub use recording::RecordingTransport;

use std::future::Future;
use std::sync::Arc;

use tasksync_proto::command::Command;
use tasksync_proto::sync::{PullRequest, PullResponse, SyncResponse};

/// Errors that can occur while talking to the Sync endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("sync endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The endpoint URL is not usable.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// No API token is configured.
    #[error("no API token configured")]
    MissingToken,
}

/// Async transport for command batches.
pub trait SyncTransport: Send + Sync {
    /// Sends `commands` as one batch, in order, and returns the service's
    /// per-command status and temp id mapping.
    fn push(
        &self,
        commands: &[Command],
    ) -> impl Future<Output = Result<SyncResponse, TransportError>> + Send;

    /// Fetches the objects changed since `request.sync_token`.
    fn pull(
        &self,
        request: &PullRequest<'_>,
    ) -> impl Future<Output = Result<PullResponse, TransportError>> + Send;
}

impl<T: SyncTransport> SyncTransport for Arc<T> {
    fn push(
        &self,
        commands: &[Command],
    ) -> impl Future<Output = Result<SyncResponse, TransportError>> + Send {
        (**self).push(commands)
    }

    fn pull(
        &self,
        request: &PullRequest<'_>,
    ) -> impl Future<Output = Result<PullResponse, TransportError>> + Send {
        (**self).pull(request)
    }
}
