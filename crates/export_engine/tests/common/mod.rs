#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use export_core::{SessionCredential, WaitUntil};
use export_engine::{CookieSpec, ExportError, FailureKind, PdfOptions, RenderPage, Renderer};
use scraper::{Html, Selector};

/// Shared record of what the fake browser was asked to do.
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub opened: usize,
    pub closed: usize,
    pub navigations: Vec<String>,
    pub contents: Vec<String>,
    pub viewports: Vec<(u32, u32)>,
    pub cookies: Vec<CookieSpec>,
    pub printed: Vec<PdfOptions>,
    pub reloads: usize,
    pub scripts: Vec<String>,
}

/// In-memory browser serving canned HTML per URL.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    pages: Arc<HashMap<String, String>>,
    script_result: Option<Arc<serde_json::Value>>,
    pub log: Arc<Mutex<BrowserLog>>,
}

impl FakeRenderer {
    pub fn with_pages(pages: &[(&str, &str)]) -> Self {
        let pages = pages
            .iter()
            .map(|(url, html)| (url.to_string(), html.to_string()))
            .collect();
        Self {
            pages: Arc::new(pages),
            script_result: None,
            log: Arc::default(),
        }
    }

    /// Value every `evaluate` call on this renderer's pages returns.
    pub fn with_script_result(mut self, value: serde_json::Value) -> Self {
        self.script_result = Some(Arc::new(value));
        self
    }

    pub fn page(&self) -> FakePage {
        FakePage {
            pages: self.pages.clone(),
            script_result: self.script_result.clone(),
            log: self.log.clone(),
            current: Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_page(&self) -> Result<Box<dyn RenderPage>, ExportError> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(self.page()))
    }
}

pub struct FakePage {
    pages: Arc<HashMap<String, String>>,
    script_result: Option<Arc<serde_json::Value>>,
    log: Arc<Mutex<BrowserLog>>,
    current: Mutex<String>,
}

impl FakePage {
    fn first_match(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        let doc = Html::parse_document(&self.current.lock().unwrap());
        let html = doc.select(&selector).next().map(|el| el.html());
        html
    }
}

#[async_trait]
impl RenderPage for FakePage {
    async fn set_cookies(&self, cookies: &[CookieSpec]) -> Result<(), ExportError> {
        self.log.lock().unwrap().cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<SessionCredential>, ExportError> {
        Ok(self
            .log
            .lock()
            .unwrap()
            .cookies
            .iter()
            .map(|c| c.credential.clone())
            .collect())
    }

    async fn navigate(
        &self,
        url: &str,
        _wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), ExportError> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        if url.contains("slow") {
            return Err(ExportError::new(
                FailureKind::Timeout,
                format!("navigation timed out after {}ms", timeout.as_millis()),
            ));
        }
        match self.pages.get(url) {
            Some(html) => {
                *self.current.lock().unwrap() = html.clone();
                Ok(())
            }
            None => Err(ExportError::new(FailureKind::Navigation, "net::ERR_NAME_NOT_RESOLVED")),
        }
    }

    async fn reload(&self, _wait: WaitUntil, _timeout: Duration) -> Result<(), ExportError> {
        self.log.lock().unwrap().reloads += 1;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ExportError> {
        self.log.lock().unwrap().viewports.push((width, height));
        Ok(())
    }

    async fn set_content(
        &self,
        html: &str,
        _wait: WaitUntil,
        _timeout: Duration,
    ) -> Result<(), ExportError> {
        self.log.lock().unwrap().contents.push(html.to_string());
        *self.current.lock().unwrap() = html.to_string();
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), ExportError> {
        match self.first_match(selector) {
            Some(_) => Ok(()),
            None => Err(ExportError::new(
                FailureKind::SelectorMissing {
                    selector: selector.to_string(),
                },
                "not present",
            )),
        }
    }

    async fn outer_html(&self, selector: &str) -> Result<Option<String>, ExportError> {
        Ok(self.first_match(selector))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExportError> {
        self.log.lock().unwrap().scripts.push(script.to_string());
        match &self.script_result {
            Some(value) => Ok(value.as_ref().clone()),
            None => Err(ExportError::new(FailureKind::Script, "no script result configured")),
        }
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, ExportError> {
        self.log.lock().unwrap().printed.push(options.clone());
        let mut bytes = b"%PDF-fake\n".to_vec();
        bytes.extend_from_slice(self.current.lock().unwrap().as_bytes());
        Ok(bytes)
    }

    async fn close(self: Box<Self>) -> Result<(), ExportError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}
