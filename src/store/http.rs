//! # HTTP Document Store
//!
//! [`DocumentStore`] over a REST API, with pushed windows delivered as
//! server-sent events.
//!
//! ## Endpoints
//!
//! - `GET    {base}/collections/{c}/documents?owner={o}`
//! - `POST   {base}/collections/{c}/documents` with `{owner, fields}`
//! - `PATCH  {base}/collections/{c}/documents/{ref}` with the merge patch
//! - `DELETE {base}/collections/{c}/documents/{ref}`
//! - `POST   {base}/batch` with `{writes: [...]}`
//! - `GET    {base}/collections/{c}/watch?owner={o}&limit={n}` as `text/event-stream`
//!
//! Each event of the watch stream carries one window as a JSON array of
//! documents, possibly split over several `data:` lines. A blank line ends
//! the event. Lines starting with `:` are keep-alives.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{BatchWrite, Document, DocumentStore, Fields, SnapshotStream};
use crate::shared::config::{ConfigError, SyncConfig};
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::models::{OwnerId, RemoteRef};

/// REST + SSE document store client
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    owner: &'a OwnerId,
    fields: Fields,
}

#[derive(Serialize)]
struct BatchRequest {
    writes: Vec<BatchWrite>,
}

/// Error body returned with 4xx responses
#[derive(Debug, Default, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpStore {
    /// Build a client from `config`; `store_url` is required.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let base_url = config
            .store_url
            .clone()
            .ok_or(ConfigError::MissingValue("store_url"))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::unavailable(format!("cannot build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn documents_url(&self, collection: &str) -> String {
        self.url(&format!("/collections/{}/documents", collection))
    }

    fn document_url(&self, collection: &str, remote_ref: &RemoteRef) -> String {
        self.url(&format!("/collections/{}/documents/{}", collection, remote_ref))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SyncError::unavailable(format!("network: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(rejection(status, response).await)
    }
}

/// Map a non-success response onto the error taxonomy
async fn rejection(status: StatusCode, response: Response) -> SyncError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            let body: RejectionBody = response.json().await.unwrap_or_default();
            SyncError::validation(
                body.field.unwrap_or_else(|| "*".to_string()),
                body.message.unwrap_or_else(|| status.to_string()),
            )
        }
        _ => SyncError::unavailable(format!("http: {}", status)),
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn list(&self, collection: &str, owner: &OwnerId) -> SyncResult<Vec<Document>> {
        let request = self
            .client
            .get(self.documents_url(collection))
            .query(&[("owner", owner.as_str())]);
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::serialization(format!("list {}: {}", collection, e)))
    }

    async fn create(&self, collection: &str, owner: &OwnerId, fields: Fields) -> SyncResult<Document> {
        let request = self
            .client
            .post(self.documents_url(collection))
            .json(&CreateRequest { owner, fields });
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::serialization(format!("create {}: {}", collection, e)))
    }

    async fn update(&self, collection: &str, remote_ref: &RemoteRef, fields: Fields) -> SyncResult<()> {
        let request = self
            .client
            .patch(self.document_url(collection, remote_ref))
            .json(&fields);
        self.send(request).await.map(|_| ())
    }

    async fn delete(&self, collection: &str, remote_ref: &RemoteRef) -> SyncResult<()> {
        let request = self.client.delete(self.document_url(collection, remote_ref));
        self.send(request).await.map(|_| ())
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> SyncResult<()> {
        let request = self
            .client
            .post(self.url("/batch"))
            .json(&BatchRequest { writes });
        self.send(request).await.map(|_| ())
    }

    async fn watch_window(
        &self,
        collection: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> SyncResult<SnapshotStream> {
        let limit = limit.to_string();
        // The stream outlives the request timeout, so it gets its own client.
        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::subscription(format!("cannot build http client: {}", e)))?;
        let request = client
            .get(self.url(&format!("/collections/{}/watch", collection)))
            .query(&[("owner", owner.as_str()), ("limit", limit.as_str())])
            .header("Accept", "text/event-stream");

        let response = self.send(request).await.map_err(|e| match e {
            SyncError::RemoteUnavailable { message } => SyncError::subscription(message),
            other => other,
        })?;

        tracing::info!("[STORE] Watching {} for {}", collection, owner);
        Ok(event_stream(response))
    }
}

struct EventReader {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    /// `data:` lines of the event being read
    data: Vec<String>,
    done: bool,
}

/// Turn an event-stream body into a stream of windows
fn event_stream(response: Response) -> SnapshotStream {
    let reader = EventReader {
        body: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        buffer: Vec::new(),
        data: Vec::new(),
        done: false,
    };

    futures_util::stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(snapshot) = next_event(&mut reader.buffer, &mut reader.data) {
                return Some((snapshot, reader));
            }
            if reader.done {
                return None;
            }
            match reader.body.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    tracing::error!("[STORE] Event stream failed: {}", e);
                    reader.done = true;
                    reader.buffer.clear();
                    reader.data.clear();
                    return Some((Err(SyncError::subscription(format!("stream: {}", e))), reader));
                }
                // Terminate a trailing line and event the server left open.
                None => {
                    reader.done = true;
                    reader.buffer.extend_from_slice(b"\n\n");
                }
            }
        }
    })
    .boxed()
}

/// Pop complete lines off `buffer` until an event completes.
///
/// `data:` lines accumulate in `data` and are joined with newlines when a
/// blank line ends the event. Returns `None` once the buffer holds no
/// complete line.
fn next_event(buffer: &mut Vec<u8>, data: &mut Vec<String>) -> Option<SyncResult<Vec<Document>>> {
    while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=newline).collect();
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            Err(e) => return Some(Err(SyncError::subscription(format!("invalid utf-8: {}", e)))),
        };

        if line.is_empty() {
            if data.is_empty() {
                continue;
            }
            let payload = data.join("\n");
            data.clear();
            match serde_json::from_str::<Vec<Document>>(&payload) {
                Ok(window) => return Some(Ok(window)),
                Err(e) => tracing::warn!("[STORE] Skipping malformed event: {}", e),
            }
            continue;
        }

        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // comments and other fields carry nothing we use
    }
    None
}
