use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote file exceeds the {limit} byte proxy limit")]
    TooLarge { limit: u64 },
}

/// Upstream response whose body has not been read yet
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, ProxyError>>,
}

/// Server-side relay for remote files the browser cannot fetch cross-origin.
///
/// Holds no per-request state; the inner client is a shared connection pool.
pub struct ProxyService {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ProxyService {
    pub fn new(timeout: Duration, max_bytes: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ifc-viewer-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, max_bytes })
    }

    /// Issues a single GET against `raw_url` and hands back the unread body stream.
    ///
    /// The body stream fails with [`ProxyError::TooLarge`] once it has yielded more
    /// than `max_bytes`, and with a transport error once the timeout elapses.
    pub async fn fetch(&self, raw_url: &str) -> Result<UpstreamResponse, ProxyError> {
        let url = Url::parse(raw_url).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ProxyError::UnsupportedScheme(other.to_string())),
        }

        tracing::info!("🌐 Proxying remote file: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content_length = response.content_length();

        if content_length.is_some_and(|len| len > self.max_bytes) {
            return Err(ProxyError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let limit = self.max_bytes;
        let mut relayed: u64 = 0;
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                let chunk = chunk?;
                relayed += chunk.len() as u64;
                if relayed > limit {
                    tracing::error!("Aborting proxied download past {} bytes", limit);
                    return Err(ProxyError::TooLarge { limit });
                }
                Ok(chunk)
            })
            .boxed();

        Ok(UpstreamResponse {
            status,
            content_type,
            content_length,
            body,
        })
    }
}
