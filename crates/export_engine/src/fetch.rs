use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use export_core::{cookie_header, SessionCredential};
use export_logging::{export_debug, export_info};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use tokio::io::AsyncWriteExt;

use crate::persist::{commit, stage_next_to};
use crate::{ExportError, FailureKind};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Cap for in-memory page fetches. Streamed resources are not capped.
    pub max_page_bytes: u64,
    /// Skip TLS certificate validation. Off unless explicitly configured.
    pub accept_invalid_certs: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            redirect_limit: 5,
            max_page_bytes: 5 * 1024 * 1024,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub final_url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Streams a remote resource to a local file.
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Returns the number of bytes written. The file at `output_path` only
    /// appears once the whole body has been written.
    async fn fetch_to_file(
        &self,
        url: &str,
        output_path: &Path,
        credentials: &[SessionCredential],
    ) -> Result<u64, ExportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> Result<reqwest::Client, ExportError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .danger_accept_invalid_certs(self.settings.accept_invalid_certs)
            .build()
            .map_err(|err| ExportError::new(FailureKind::Network, err.to_string()))
    }

    async fn send(
        &self,
        url: &str,
        credentials: &[SessionCredential],
    ) -> Result<(reqwest::Response, Arc<AtomicUsize>), ExportError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| ExportError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let mut request = client.get(parsed);
        if let Some(cookies) = cookie_header(credentials) {
            request = request.header(COOKIE, cookies);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok((response, redirect_counter))
    }

    /// Fetches a whole page into memory, for parsing without a browser.
    pub async fn fetch_page(
        &self,
        url: &str,
        credentials: &[SessionCredential],
    ) -> Result<FetchedPage, ExportError> {
        let (response, _) = self.send(url, credentials).await?;
        let max_bytes = self.settings.max_page_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ExportError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ExportError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            final_url,
            content_type,
            bytes,
        })
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for ReqwestFetcher {
    async fn fetch_to_file(
        &self,
        url: &str,
        output_path: &Path,
        credentials: &[SessionCredential],
    ) -> Result<u64, ExportError> {
        export_info!("Attempting to download {}", url);
        let (response, redirects) = self.send(url, credentials).await?;
        export_debug!(
            "Received response for {} after {} redirect(s)",
            response.url(),
            redirects.load(Ordering::Relaxed)
        );

        let staged = stage_next_to(output_path).map_err(ExportError::io)?;
        let mut file = tokio::fs::File::from_std(staged.reopen().map_err(ExportError::io)?);

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await.map_err(ExportError::io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(ExportError::io)?;
        file.sync_all().await.map_err(ExportError::io)?;
        drop(file);

        commit(staged, output_path).map_err(ExportError::io)?;
        Ok(written)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ExportError {
    if err.is_timeout() {
        return ExportError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return ExportError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    ExportError::new(FailureKind::Network, err.to_string())
}
