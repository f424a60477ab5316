//! HTTP transport for WebDAV requests
//!
//! The adapter and the mutation facade build [`DavRequest`] values and hand
//! them to a [`DavTransport`]. Status codes are returned untouched; mapping
//! them to errors is the caller's job. Only failures to get any response at
//! all (network, timeout, local I/O) are errors at this level.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Method};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use super::{DavError, WebDavConfig};

/// Timeout for PROPFIND/MKCOL/DELETE/MOVE
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for uploads and downloads
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);
/// In-memory bodies with a progress listener are streamed in pieces of this size
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// WebDAV request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavMethod {
    Propfind,
    Mkcol,
    Put,
    Get,
    Delete,
    Move,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DavMethod::Propfind => "PROPFIND",
            DavMethod::Mkcol => "MKCOL",
            DavMethod::Put => "PUT",
            DavMethod::Get => "GET",
            DavMethod::Delete => "DELETE",
            DavMethod::Move => "MOVE",
        }
    }

    fn to_reqwest(self) -> Result<Method, DavError> {
        Method::from_bytes(self.as_str().as_bytes())
            .map_err(|e| DavError::NetworkError(format!("invalid method {}: {}", self.as_str(), e)))
    }
}

impl std::fmt::Display for DavMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body
#[derive(Debug, Clone, Default)]
pub enum DavBody {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    /// Streamed from a local file
    File(PathBuf),
}

/// Bytes sent so far out of the total body size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferTick {
    pub loaded: u64,
    pub total: u64,
}

impl TransferTick {
    /// Integer percentage, rounded; an empty body counts as complete
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.loaded as f64 * 100.0 / self.total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

pub type ProgressSender = UnboundedSender<TransferTick>;

#[derive(Debug)]
pub struct DavRequest {
    pub method: DavMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: DavBody,
    pub timeout: Duration,
    /// Receives upload progress ticks while the body is sent
    pub progress: Option<ProgressSender>,
}

impl DavRequest {
    pub fn new(method: DavMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: DavBody::Empty,
            timeout: METADATA_TIMEOUT,
            progress: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: DavBody) -> Self {
        self.body = body;
        self
    }

    pub fn xml(self, xml: &str) -> Self {
        self.header("Content-Type", "application/xml; charset=utf-8")
            .body(DavBody::Bytes(xml.as_bytes().to_vec()))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DavResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl DavResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one WebDAV request
#[async_trait]
pub trait DavTransport: Send + Sync {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, DavError>;
}

/// reqwest-backed transport authenticating every request with Basic auth
pub struct HttpTransport {
    config: WebDavConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: WebDavConfig) -> Result<Self, DavError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DavError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    /// Use an already configured reqwest client
    pub fn with_client(config: WebDavConfig, client: Client) -> Self {
        Self { config, client }
    }

    async fn build_body(
        body: DavBody,
        progress: Option<ProgressSender>,
    ) -> Result<(Option<reqwest::Body>, Option<u64>), DavError> {
        match body {
            DavBody::Empty => Ok((None, None)),
            DavBody::Bytes(bytes) => {
                let Some(tx) = progress else {
                    return Ok((Some(reqwest::Body::from(bytes)), None));
                };
                // Ticks fire as hyper pulls each piece, not before
                let total = bytes.len() as u64;
                let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
                let mut loaded = 0u64;
                let stream = futures_util::stream::iter(chunks).map(move |chunk| {
                    loaded += chunk.len() as u64;
                    let _ = tx.send(TransferTick { loaded, total });
                    Ok::<_, std::io::Error>(chunk)
                });
                Ok((Some(reqwest::Body::wrap_stream(stream)), Some(total)))
            }
            DavBody::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let total = file.metadata().await?.len();
                let mut loaded = 0u64;
                let stream = tokio_util::io::ReaderStream::new(file).map(move |chunk| {
                    if let (Ok(bytes), Some(tx)) = (&chunk, &progress) {
                        loaded += bytes.len() as u64;
                        let _ = tx.send(TransferTick { loaded, total });
                    }
                    chunk
                });
                Ok((Some(reqwest::Body::wrap_stream(stream)), Some(total)))
            }
        }
    }
}

#[async_trait]
impl DavTransport for HttpTransport {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, DavError> {
        let DavRequest {
            method,
            url,
            headers,
            body,
            timeout,
            progress,
        } = request;

        tracing::debug!("[WebDAV] {} {}", method, url);

        let (body, length) = Self::build_body(body, progress).await?;
        let mut builder = self
            .client
            .request(method.to_reqwest()?, url.clone())
            .basic_auth(&self.config.username, Some(self.config.password.expose_secret()))
            .timeout(timeout);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(length) = length {
            builder = builder.header(reqwest::header::CONTENT_LENGTH, length);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("[WebDAV] {} {} failed: {}", method, url, e);
            DavError::from(e)
        })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        tracing::debug!("[WebDAV] {} {} -> {} ({} bytes)", method, url, status, bytes.len());

        Ok(DavResponse {
            status,
            body: bytes.to_vec(),
        })
    }
}
