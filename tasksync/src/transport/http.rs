//! HTTP transport for the remote Sync API.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tasksync_proto::command::Command;
use tasksync_proto::sync::{FULL_SYNC_TOKEN, PullRequest, PullResponse, SyncRequest, SyncResponse};
use url::Url;

use super::{SyncTransport, TransportError};

/// Default Sync endpoint.
pub const DEFAULT_API_URL: &str = "https://api.todoist.com/sync/v9/sync";

/// Posts command batches and pull requests to the Sync endpoint with a
/// bearer token.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    token: String,
}

impl HttpTransport {
    /// Creates a transport for `url` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] for a URL that is not
    /// `http`/`https`, [`TransportError::MissingToken`] for an empty token,
    /// or [`TransportError::Http`] if the client cannot be built.
    pub fn new(url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(format!(
                "{url}: unsupported scheme '{}'",
                url.scheme()
            )));
        }
        let token = token.into();
        if token.is_empty() {
            return Err(TransportError::MissingToken);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, token })
    }

    /// Endpoint this transport posts to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "sync endpoint rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<R>().await?)
    }
}

impl SyncTransport for HttpTransport {
    async fn push(&self, commands: &[Command]) -> Result<SyncResponse, TransportError> {
        tracing::debug!(url = %self.url, count = commands.len(), "pushing sync batch");
        self.post(&SyncRequest { commands }).await
    }

    async fn pull(&self, request: &PullRequest<'_>) -> Result<PullResponse, TransportError> {
        tracing::debug!(
            url = %self.url,
            full = request.sync_token == FULL_SYNC_TOKEN,
            resources = ?request.resource_types,
            "pulling changes"
        );
        self.post(request).await
    }
}
