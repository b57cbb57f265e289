//! Daemon socket client and frame I/O.
//!
//! Each connection carries exactly one request frame and one response
//! frame, both length-prefixed postcard (see [`tasksync_proto::codec`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tasksync_proto::codec::{self, CodecError, PREFIX_LEN};
use tasksync_proto::daemon::{DaemonRequest, DaemonResponse};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

/// Errors that can occur while talking to the daemon.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No daemon is listening on the socket.
    #[error("no daemon listening on {0}")]
    Unavailable(PathBuf),

    /// The exchange did not finish in time.
    #[error("daemon did not answer within {0:?}")]
    Timeout(Duration),

    /// The peer closed the connection before a full frame arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Socket I/O failed.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Writes one length-prefixed frame and flushes.
///
/// # Errors
///
/// Returns [`ClientError::Codec`] if encoding fails, or
/// [`ClientError::Io`] if writing fails.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = codec::encode_framed(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame.
///
/// # Errors
///
/// Returns [`ClientError::ConnectionClosed`] on EOF, [`ClientError::Codec`]
/// for an oversized or undecodable frame, or [`ClientError::Io`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ClientError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; PREFIX_LEN];
    read_exact_or_closed(reader, &mut prefix).await?;
    let len = codec::frame_len(prefix)?;
    let mut payload = vec![0u8; len];
    read_exact_or_closed(reader, &mut payload).await?;
    Ok(codec::decode(&payload)?)
}

async fn read_exact_or_closed<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), ClientError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ClientError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

/// Client for the `tasksyncd` socket.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Creates a client for the daemon at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Socket this client connects to.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends one request and waits for the response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unavailable`] if nothing listens on the socket,
    /// [`ClientError::Timeout`] if the exchange takes longer than the
    /// configured timeout, or another [`ClientError`] for I/O and framing
    /// failures.
    pub async fn request(&self, request: &DaemonRequest) -> Result<DaemonResponse, ClientError> {
        tracing::debug!(path = %self.socket_path.display(), request = request.name(), "daemon request");
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    async fn exchange(&self, request: &DaemonRequest) -> Result<DaemonResponse, ClientError> {
        let mut stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
                ) =>
            {
                return Err(ClientError::Unavailable(self.socket_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        write_frame(&mut stream, request).await?;
        read_frame(&mut stream).await
    }
}
