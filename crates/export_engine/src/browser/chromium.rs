//! Chromium-backed renderer using chromiumoxide.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, CookieSameSite, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use export_core::{SessionCredential, WaitUntil};
use export_logging::{export_debug, export_trace};
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::{CookieSpec, PdfOptions, RenderPage, Renderer};
use crate::{ExportError, FailureKind};

/// Network must stay quiet this long to count as idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);
const SELECTOR_POLL: Duration = Duration::from_millis(100);
const CHROMIUM_PATH_ENV: &str = "PAGE_EXPORT_CHROMIUM_PATH";

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    /// Pass `--no-sandbox --disable-setuid-sandbox`, needed in most containers.
    pub no_sandbox: bool,
}

/// Find the Chromium binary: explicit path, then `PAGE_EXPORT_CHROMIUM_PATH`,
/// then the usual names on `PATH`.
pub fn find_chromium(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.exists()) {
        return Some(path);
    }
    if let Ok(raw) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(raw);
        if path.exists() {
            return Some(path);
        }
    }
    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, ExportError> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if options.no_sandbox {
            builder = builder.arg("--no-sandbox").arg("--disable-setuid-sandbox");
        }
        if let Some(path) = find_chromium(options.executable.clone()) {
            export_debug!("Using Chromium at {:?}", path);
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| browser_error(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    export_trace!("Browser handler event error: {}", err);
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Close the browser and stop its event handler.
    pub async fn close(mut self) -> Result<(), ExportError> {
        let closed = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| browser_error(format!("failed to close browser: {e}")));
        if let Err(err) = self.browser.wait().await {
            export_debug!("Waiting for the browser process failed: {}", err);
        }
        self.handler.abort();
        closed
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_page(&self) -> Result<Box<dyn RenderPage>, ExportError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_error(format!("failed to create page: {e}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }
}

pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl RenderPage for ChromiumPage {
    async fn set_cookies(&self, cookies: &[CookieSpec]) -> Result<(), ExportError> {
        let params = cookies
            .iter()
            .map(to_cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| browser_error(format!("failed to set cookies: {e}")))?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<SessionCredential>, ExportError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| browser_error(format!("failed to read cookies: {e}")))?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCredential::new(c.name, c.value))
            .collect())
    }

    async fn navigate(
        &self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), ExportError> {
        let idle = IdleWatch::subscribe(&self.page, wait).await?;
        bounded(timeout, "navigation", async {
            self.page
                .goto(url)
                .await
                .map_err(|e| ExportError::new(FailureKind::Navigation, e.to_string()))?;
            if let Some(idle) = idle {
                idle.settle().await;
            }
            Ok(())
        })
        .await
    }

    async fn reload(&self, wait: WaitUntil, timeout: Duration) -> Result<(), ExportError> {
        let idle = IdleWatch::subscribe(&self.page, wait).await?;
        bounded(timeout, "reload", async {
            self.page
                .reload()
                .await
                .map_err(|e| ExportError::new(FailureKind::Navigation, e.to_string()))?;
            if let Some(idle) = idle {
                idle.settle().await;
            }
            Ok(())
        })
        .await
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ExportError> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page
            .execute(params)
            .await
            .map_err(|e| browser_error(format!("failed to set viewport: {e}")))?;
        Ok(())
    }

    async fn set_content(
        &self,
        html: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), ExportError> {
        let idle = IdleWatch::subscribe(&self.page, wait).await?;
        bounded(timeout, "content load", async {
            self.page
                .set_content(html)
                .await
                .map_err(|e| ExportError::new(FailureKind::Navigation, e.to_string()))?;
            if let Some(idle) = idle {
                idle.settle().await;
            }
            Ok(())
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ExportError> {
        let found = tokio::time::timeout(timeout, async {
            while self.page.find_element(selector).await.is_err() {
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        })
        .await;
        found.map_err(|_| {
            ExportError::new(
                FailureKind::SelectorMissing {
                    selector: selector.to_string(),
                },
                format!("not present after {}ms", timeout.as_millis()),
            )
        })
    }

    async fn outer_html(&self, selector: &str) -> Result<Option<String>, ExportError> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(None);
        };
        element
            .outer_html()
            .await
            .map_err(|e| ExportError::new(FailureKind::Script, e.to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExportError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|e| ExportError::new(FailureKind::Script, e))?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| ExportError::new(FailureKind::Script, e.to_string()))?;
        result
            .into_value()
            .map_err(|e| ExportError::new(FailureKind::Script, format!("{e:?}")))
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, ExportError> {
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            paper_width: Some(options.paper_width_in),
            paper_height: Some(options.paper_height_in),
            ..Default::default()
        };
        self.page
            .pdf(params)
            .await
            .map_err(|e| ExportError::new(FailureKind::Render, e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), ExportError> {
        self.page
            .close()
            .await
            .map_err(|e| browser_error(format!("failed to close page: {e}")))
    }
}

/// In-flight request tracker used for the network-idle wait conditions.
///
/// Subscribed before the navigation starts so no request is missed.
struct IdleWatch {
    max_inflight: usize,
    sent: EventStream<EventRequestWillBeSent>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

impl IdleWatch {
    async fn subscribe(page: &Page, wait: WaitUntil) -> Result<Option<Self>, ExportError> {
        let Some(max_inflight) = wait.max_inflight() else {
            return Ok(None);
        };
        let listen_error = |e: chromiumoxide::error::CdpError| {
            browser_error(format!("failed to listen for network events: {e}"))
        };
        Ok(Some(Self {
            max_inflight,
            sent: page.event_listener::<EventRequestWillBeSent>().await.map_err(listen_error)?,
            finished: page.event_listener::<EventLoadingFinished>().await.map_err(listen_error)?,
            failed: page.event_listener::<EventLoadingFailed>().await.map_err(listen_error)?,
        }))
    }

    /// Resolves once at most `max_inflight` requests have been pending for a
    /// full quiet window. Never resolves on a permanently busy page; callers
    /// bound it with a timeout.
    async fn settle(mut self) {
        let mut inflight: HashSet<String> = HashSet::new();
        loop {
            tokio::select! {
                Some(event) = self.sent.next() => {
                    inflight.insert(event.request_id.inner().clone());
                }
                Some(event) = self.finished.next() => {
                    inflight.remove(event.request_id.inner());
                }
                Some(event) = self.failed.next() => {
                    inflight.remove(event.request_id.inner());
                }
                _ = tokio::time::sleep(NETWORK_QUIET) => {
                    if inflight.len() <= self.max_inflight {
                        return;
                    }
                }
            }
        }
    }
}

async fn bounded<F>(timeout: Duration, what: &str, work: F) -> Result<(), ExportError>
where
    F: Future<Output = Result<(), ExportError>>,
{
    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| ExportError::timeout(what, timeout))?
}

fn to_cookie_param(spec: &CookieSpec) -> Result<CookieParam, ExportError> {
    CookieParam::builder()
        .name(spec.credential.name.clone())
        .value(spec.credential.value.clone())
        .domain(spec.domain.clone())
        .path(spec.path.clone())
        .secure(spec.secure)
        .http_only(spec.http_only)
        .same_site(CookieSameSite::None)
        .expires(TimeSinceEpoch::new(spec.expires as f64))
        .build()
        .map_err(|e| browser_error(format!("invalid cookie {}: {e}", spec.credential.name)))
}

fn browser_error(message: String) -> ExportError {
    ExportError::new(FailureKind::Browser, message)
}
