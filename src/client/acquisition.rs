use crate::api::error::ErrorBody;
use crate::api::handlers::health::HealthResponse;
use crate::api::handlers::upload::{FILE_FIELD, UploadResponse};
use crate::client::progress::{DOWNLOADING, ProgressState, ProgressTracker, UPLOADING};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::{Url, multipart};
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::io::ReaderStream;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Drives the viewer backend: fetch a remote IFC through the proxy, or upload
/// a local one and read it back. Progress is published on a shared signal.
///
/// One acquisition at a time is expected; concurrent calls share the same
/// progress slot.
#[derive(Clone)]
pub struct AcquisitionClient {
    http: reqwest::Client,
    base_url: Url,
    progress: ProgressTracker,
}

impl AcquisitionClient {
    pub fn new(base_url: &str) -> Result<Self, AcquisitionError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, AcquisitionError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            progress: ProgressTracker::new(),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> ProgressState {
        self.progress.current()
    }

    fn url(&self, path: &str) -> Result<Url, AcquisitionError> {
        Ok(self.base_url.join(path)?)
    }

    /// Downloads `remote_url` through the backend proxy.
    pub async fn fetch_by_url(&self, remote_url: &str) -> Result<Bytes, AcquisitionError> {
        self.progress.begin(DOWNLOADING);
        let result = self.download_proxied(remote_url).await;
        self.settle(result)
    }

    /// Uploads the file at `path`, then fetches the stored copy back.
    pub async fn upload_then_fetch(&self, path: &Path) -> Result<Bytes, AcquisitionError> {
        self.progress.begin(UPLOADING);
        let result: Result<Bytes, AcquisitionError> = async {
            let file = tokio::fs::File::open(path).await?;
            let total = file.metadata().await?.len();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.upload_and_retrieve(file_name, total, ReaderStream::new(file))
                .await
        }
        .await;
        self.settle(result)
    }

    /// Same as [`upload_then_fetch`](Self::upload_then_fetch) for an in-memory file.
    pub async fn upload_bytes_then_fetch(
        &self,
        file_name: &str,
        data: Bytes,
    ) -> Result<Bytes, AcquisitionError> {
        self.progress.begin(UPLOADING);
        let total = data.len() as u64;
        let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len()))))
            .collect();
        let result = self
            .upload_and_retrieve(file_name.to_string(), total, futures::stream::iter(chunks))
            .await;
        self.settle(result)
    }

    pub async fn check_health(&self) -> Result<HealthResponse, AcquisitionError> {
        let response = self.http.get(self.url("/api/health")?).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    fn settle(&self, result: Result<Bytes, AcquisitionError>) -> Result<Bytes, AcquisitionError> {
        match &result {
            Ok(bytes) => {
                tracing::info!("✅ Acquired {} bytes", bytes.len());
                self.progress.complete();
            }
            Err(e) => {
                tracing::error!("❌ Acquisition failed: {}", e);
                self.progress.fail(e.to_string());
            }
        }
        result
    }

    async fn download_proxied(&self, remote_url: &str) -> Result<Bytes, AcquisitionError> {
        let mut url = self.url("/api/proxy")?;
        url.query_pairs_mut().append_pair("url", remote_url);

        let response = self.http.get(url).send().await?;
        let response = ensure_success(response).await?;
        self.read_body(response, Some(DOWNLOADING)).await
    }

    async fn upload_and_retrieve<S>(
        &self,
        file_name: String,
        total: u64,
        chunks: S,
    ) -> Result<Bytes, AcquisitionError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
    {
        let tracker = self.progress.clone();
        let mut sent: u64 = 0;
        let counted = chunks.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                tracker.advance(UPLOADING, sent, total);
            }
            chunk
        });

        let part = multipart::Part::stream_with_length(reqwest::Body::wrap_stream(counted), total)
            .file_name(file_name)
            .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())?;
        let form = multipart::Form::new().part(FILE_FIELD, part);

        let response = self
            .http
            .post(self.url("/api/upload")?)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let receipt: UploadResponse = response.json().await?;

        if !receipt.success {
            return Err(AcquisitionError::InvalidResponse(receipt.message));
        }

        tracing::info!(
            "📦 Uploaded {} as {}, fetching it back",
            receipt.file.original_name,
            receipt.file.filename
        );

        let response = self.http.get(self.url(&receipt.file.url)?).send().await?;
        let response = ensure_success(response).await?;
        self.read_body(response, None).await
    }

    /// Buffers the whole body, reporting progress under `label` when the length is known.
    async fn read_body(
        &self,
        response: reqwest::Response,
        label: Option<&str>,
    ) -> Result<Bytes, AcquisitionError> {
        let total = response.content_length();
        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            if let (Some(label), Some(total)) = (label, total) {
                self.progress.advance(label, buffer.len() as u64, total);
            }
        }

        Ok(buffer.freeze())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AcquisitionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{}: {}", error, details),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };

    Err(AcquisitionError::Status {
        status: status.as_u16(),
        message,
    })
}
