// Delivery transport: uploads one sealed archive to the collector.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport config: {0}")]
    Config(String),
}

/// Single-call upload. `Ok` only on unambiguous success; anything else is a failure to retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<(), TransportError>;
}

/// `POST {endpoint}/upload/{room}/` as multipart field `file`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(
        endpoint: &str,
        room: u32,
        connect_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .user_agent(crate::version::user_agent())
            .build()?;
        Ok(Self {
            http,
            url: format!("{}/upload/{}/", endpoint.trim_end_matches('/'), room),
        })
    }

    /// Builds the transport from `[upload]` and `[timing.timeouts]`; the room is mandatory.
    pub fn from_config(config: &AppConfig) -> Result<Self, TransportError> {
        let room = config.upload.room.ok_or_else(|| {
            TransportError::Config("no room specified (upload.room or env ROOM)".into())
        })?;
        Self::new(
            &config.upload.endpoint,
            room,
            Duration::from_secs(config.timing.timeouts.connect_secs),
            Duration::from_secs(config.timing.timeouts.upload_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let size_kb = bytes.len() / 1024;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(archive = name, size_kb, url = %self.url, "uploading");
        let resp = self.http.post(&self.url).multipart(form).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::OK {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::Status { status, body })
    }
}
