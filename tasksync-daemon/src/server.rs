//! Unix-socket server that buffers hook commands and pushes them when idle.
//!
//! Each connection carries one [`DaemonRequest`] and gets one
//! [`DaemonResponse`]. Hook requests are translated immediately, so the hook
//! can print feedback, but their commands are only pushed once no
//! connection has arrived for the flush interval, once the oldest buffered
//! command reaches the maximum batch age, or on `Sync` and `Stop`. Every
//! successful push is followed by a pull that refreshes the lookup cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tasksync::client::{ClientError, read_frame, write_frame};
use tasksync::hooks::{self, HookError};
use tasksync::provider::{Provider, ProviderError};
use tasksync::store::{CacheStore, StoreError};
use tasksync::transport::SyncTransport;
use tasksync_proto::daemon::{DaemonRequest, DaemonResponse};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::Instant;

use crate::writeback::WritebackSink;

/// Errors that stop the daemon or fail one connection.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// The socket could not be created.
    #[error("failed to create socket at {path}: {source}")]
    Socket {
        /// Socket path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Another daemon answers on the socket.
    #[error("a daemon is already listening on {0}")]
    AlreadyRunning(PathBuf),

    /// The lookup cache could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A connection failed.
    #[error(transparent)]
    Connection(#[from] ClientError),
}

/// Timing parameters of the accept loop.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Idle time after which buffered commands are pushed.
    pub flush_interval: Duration,
    /// Age of the oldest buffered command after which it is pushed even
    /// though requests keep arriving.
    pub max_batch_age: Duration,
    /// Bound on reading one request and on writing one response.
    pub connection_timeout: Duration,
}

/// Whether the accept loop continues after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Continue,
    Stop,
}

/// The daemon's accept loop and its state.
pub struct Server<T, W> {
    listener: UnixListener,
    socket_path: PathBuf,
    provider: Provider<CacheStore, T>,
    sink: W,
    timing: Timing,
    /// When the buffer last went from empty to non-empty, or when the last
    /// failed push gave up.
    oldest: Option<Instant>,
}

impl<T: SyncTransport, W: WritebackSink> Server<T, W> {
    /// Binds the daemon socket.
    ///
    /// - Creates the parent directory (with mode 0o700) if it does not exist.
    /// - Removes a stale socket file, unless a live daemon still answers on it.
    /// - Restricts the socket file to its owner.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::AlreadyRunning`] if another daemon is live, or
    /// [`DaemonError::Socket`] if the socket cannot be created.
    pub async fn bind(
        socket_path: &Path,
        provider: Provider<CacheStore, T>,
        sink: W,
        timing: Timing,
    ) -> Result<Self, DaemonError> {
        let socket_err = |source| DaemonError::Socket {
            path: socket_path.to_path_buf(),
            source,
        };

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(socket_err)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                std::fs::set_permissions(parent, perms).map_err(socket_err)?;
            }
        }

        if socket_path.exists() {
            if UnixStream::connect(socket_path).await.is_ok() {
                return Err(DaemonError::AlreadyRunning(socket_path.to_path_buf()));
            }
            tracing::debug!(path = %socket_path.display(), "removing stale socket");
            std::fs::remove_file(socket_path).map_err(socket_err)?;
        }

        let listener = UnixListener::bind(socket_path).map_err(socket_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(socket_path, perms).map_err(socket_err)?;
        }

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            provider,
            sink,
            timing,
            oldest: None,
        })
    }

    /// Path of the bound socket.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs until a `Stop` request arrives, then flushes and returns.
    ///
    /// Pulls remote changes once before accepting connections.
    pub async fn run(mut self) {
        tracing::info!(
            path = %self.socket_path.display(),
            flush_interval = ?self.timing.flush_interval,
            max_batch_age = ?self.timing.max_batch_age,
            "daemon listening"
        );
        if let Err(e) = self.provider.pull(false).await {
            tracing::warn!(error = %e, "initial cache refresh failed");
        }
        loop {
            let accepted = tokio::time::timeout(self.wait(), self.listener.accept()).await;
            let stream = match accepted {
                Err(_elapsed) => {
                    self.flush().await;
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
                Ok(Ok((stream, _addr))) => stream,
            };

            let control = match self.handle(stream).await {
                Ok(control) => control,
                Err(e) => {
                    tracing::warn!(error = %e, "connection failed");
                    Control::Continue
                }
            };
            if control == Control::Stop {
                break;
            }
            self.track_batch_age();
            if self.batch_expired() {
                tracing::debug!(max_batch_age = ?self.timing.max_batch_age, "batch reached max age");
                self.flush().await;
            }
        }
        self.flush().await;
        tracing::info!("daemon stopped");
    }

    /// How long to wait for the next connection before flushing.
    fn wait(&self) -> Duration {
        self.oldest.map_or(self.timing.flush_interval, |since| {
            let remaining = self.timing.max_batch_age.saturating_sub(since.elapsed());
            self.timing.flush_interval.min(remaining)
        })
    }

    fn track_batch_age(&mut self) {
        if self.provider.pending() == 0 {
            self.oldest = None;
        } else if self.oldest.is_none() {
            self.oldest = Some(Instant::now());
        }
    }

    fn batch_expired(&self) -> bool {
        self.oldest
            .is_some_and(|since| since.elapsed() >= self.timing.max_batch_age)
    }

    async fn handle(&mut self, mut stream: UnixStream) -> Result<Control, DaemonError> {
        let timeout = self.timing.connection_timeout;
        let request: DaemonRequest = tokio::time::timeout(timeout, read_frame(&mut stream))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;
        tracing::debug!(request = request.name(), "received request");

        let (response, control) = match request {
            DaemonRequest::OnAdd { task } => (
                feedback(hooks::on_add(&mut self.provider, &task)),
                Control::Continue,
            ),
            DaemonRequest::OnModify { old, new } => (
                feedback(hooks::on_modify(&mut self.provider, &old, &new)),
                Control::Continue,
            ),
            DaemonRequest::Sync { full } => (self.sync(full).await, Control::Continue),
            DaemonRequest::Status => (
                DaemonResponse::Status {
                    pid: std::process::id(),
                    pending: u32::try_from(self.provider.pending()).unwrap_or(u32::MAX),
                },
                Control::Continue,
            ),
            DaemonRequest::Stop => (DaemonResponse::Stopping, Control::Stop),
        };

        tokio::time::timeout(timeout, write_frame(&mut stream, &response))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;
        Ok(control)
    }

    /// Pushes buffered commands, then refreshes the cache.
    ///
    /// A failed push keeps the buffer and restarts its age, so the next
    /// attempt waits a full interval.
    async fn flush(&mut self) {
        if self.provider.pending() == 0 {
            self.oldest = None;
            return;
        }
        if self.push().await.is_err() {
            return;
        }
        if let Err(e) = self.provider.pull(false).await {
            tracing::warn!(error = %e, "cache refresh after push failed");
        }
    }

    /// Pushes buffered commands and applies the writebacks.
    async fn push(&mut self) -> Result<(), ProviderError> {
        match self.provider.push().await {
            Ok(outcome) => {
                self.oldest = None;
                for writeback in &outcome.writebacks {
                    if let Err(e) = self.sink.apply(writeback).await {
                        tracing::error!(task = %writeback.task, error = %e, "writeback failed");
                    }
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, pending = self.provider.pending(), "flush failed");
                self.oldest = Some(Instant::now());
                Err(e)
            }
        }
    }

    /// Pushes anything buffered, then pulls.
    async fn sync(&mut self, full: bool) -> DaemonResponse {
        if self.provider.pending() > 0
            && let Err(e) = self.push().await
        {
            return DaemonResponse::Error {
                reason: e.to_string(),
            };
        }
        match self.provider.pull(full).await {
            Ok(changed) => DaemonResponse::Synced {
                changed: u32::try_from(changed).unwrap_or(u32::MAX),
            },
            Err(e) => {
                tracing::warn!(error = %e, "cache refresh failed");
                DaemonResponse::Error {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Buffered provider, for inspection.
    #[must_use]
    pub const fn provider(&self) -> &Provider<CacheStore, T> {
        &self.provider
    }
}

impl<T, W> Drop for Server<T, W> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn feedback(result: Result<hooks::HookOutput, HookError>) -> DaemonResponse {
    match result {
        Ok(output) => DaemonResponse::Feedback {
            task: output.task_json(),
            message: output.feedback,
        },
        Err(e) => {
            tracing::warn!(error = %e, "hook request failed");
            DaemonResponse::Error {
                reason: e.to_string(),
            }
        }
    }
}
