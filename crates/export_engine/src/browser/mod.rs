//! Browser capability consumed by extraction and PDF export.
//!
//! The pipeline only talks to [`Renderer`] and [`RenderPage`]; the Chromium
//! implementation lives in [`chromium`].

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use export_core::{SessionCredential, WaitUntil};

use crate::ExportError;

/// A4 in inches, as the DevTools print API expects.
pub const A4_WIDTH_IN: f64 = 8.27;
pub const A4_HEIGHT_IN: f64 = 11.69;

/// Cookie injected into the browsing context before the first navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieSpec {
    pub credential: SessionCredential,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Expiry in seconds since the Unix epoch.
    pub expires: i64,
}

impl CookieSpec {
    /// Secure, script-visible cookie on `/` for `domain`.
    pub fn session(credential: SessionCredential, domain: impl Into<String>, expires: i64) -> Self {
        Self {
            credential,
            domain: domain.into(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            expires,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub print_background: bool,
}

impl PdfOptions {
    pub fn a4(print_background: bool) -> Self {
        Self {
            paper_width_in: A4_WIDTH_IN,
            paper_height_in: A4_HEIGHT_IN,
            print_background,
        }
    }
}

/// A browser engine that hands out isolated pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn RenderPage>, ExportError>;
}

/// One browser page (tab). Closed explicitly after use.
#[async_trait]
pub trait RenderPage: Send + Sync {
    async fn set_cookies(&self, cookies: &[CookieSpec]) -> Result<(), ExportError>;
    /// Cookies the browser would send for the current URL.
    async fn cookies(&self) -> Result<Vec<SessionCredential>, ExportError>;
    /// Navigate and wait for `wait`, failing with a timeout after `timeout`.
    async fn navigate(&self, url: &str, wait: WaitUntil, timeout: Duration)
        -> Result<(), ExportError>;
    async fn reload(&self, wait: WaitUntil, timeout: Duration) -> Result<(), ExportError>;
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ExportError>;
    /// Replace the document with `html` and wait for its resources.
    async fn set_content(&self, html: &str, wait: WaitUntil, timeout: Duration)
        -> Result<(), ExportError>;
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ExportError>;
    /// Serialized markup of the first element matching `selector`.
    async fn outer_html(&self, selector: &str) -> Result<Option<String>, ExportError>;
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExportError>;
    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, ExportError>;
    async fn close(self: Box<Self>) -> Result<(), ExportError>;
}
