use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use export_core::{page_origin, WaitUntil};
use export_logging::{export_debug, export_info, export_warn};
use url::Url;

use crate::browser::{PdfOptions, RenderPage, Renderer};
use crate::persist::write_atomically;
use crate::{ExportError, FailureKind};

/// Renders a navigated page, or a subtree of it, to a PDF file.
#[async_trait]
pub trait PageExporter: Send + Sync {
    /// Returns the number of bytes written to `output_path`.
    async fn export_pdf(&self, url: &str, output_path: &Path) -> Result<u64, ExportError>;
}

#[derive(Debug, Clone)]
pub struct PdfExportOptions {
    pub wait_until: WaitUntil,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    /// Render only the first element matching this selector.
    pub target_element: Option<String>,
    /// `<base>` for the synthesized subtree document. Defaults to the origin
    /// of the navigated page.
    pub asset_base_url: Option<Url>,
    pub viewport: (u32, u32),
}

impl Default for PdfExportOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::NetworkIdle0,
            navigation_timeout: Duration::from_secs(120),
            selector_timeout: Duration::from_secs(30),
            target_element: None,
            asset_base_url: None,
            viewport: (1280, 800),
        }
    }
}

pub struct PdfExporter {
    renderer: Arc<dyn Renderer>,
    options: PdfExportOptions,
}

impl PdfExporter {
    pub fn new(renderer: Arc<dyn Renderer>, options: PdfExportOptions) -> Self {
        Self { renderer, options }
    }

    async fn render(&self, page: &dyn RenderPage, url: &str) -> Result<Vec<u8>, ExportError> {
        export_info!("Navigating to HTML page: {}", url);
        page.navigate(url, self.options.wait_until, self.options.navigation_timeout)
            .await?;

        let Some(selector) = self.options.target_element.as_deref() else {
            return page.print_pdf(&PdfOptions::a4(false)).await;
        };

        export_debug!("Looking for target element: {}", selector);
        page.wait_for_selector(selector, self.options.selector_timeout)
            .await?;
        let markup = page
            .outer_html(selector)
            .await?
            .filter(|html| !html.trim().is_empty())
            .ok_or_else(|| {
                ExportError::new(
                    FailureKind::SelectorMissing {
                        selector: selector.to_string(),
                    },
                    "element has no markup",
                )
            })?;

        let base = self.base_for(url);
        let document = standalone_document(&markup, base.as_ref());

        let content_page = self.renderer.new_page().await?;
        let result = self.render_content(content_page.as_ref(), &document).await;
        if let Err(err) = content_page.close().await {
            export_warn!("Failed to close content page: {}", err);
        }
        result
    }

    async fn render_content(
        &self,
        page: &dyn RenderPage,
        document: &str,
    ) -> Result<Vec<u8>, ExportError> {
        let (width, height) = self.options.viewport;
        page.set_viewport(width, height).await?;
        page.set_content(document, self.options.wait_until, self.options.navigation_timeout)
            .await?;
        page.print_pdf(&PdfOptions::a4(true)).await
    }

    fn base_for(&self, url: &str) -> Option<Url> {
        self.options
            .asset_base_url
            .clone()
            .or_else(|| Url::parse(url).ok().and_then(|u| page_origin(&u)))
    }
}

#[async_trait]
impl PageExporter for PdfExporter {
    async fn export_pdf(&self, url: &str, output_path: &Path) -> Result<u64, ExportError> {
        let page = self.renderer.new_page().await?;
        let rendered = self.render(page.as_ref(), url).await;
        if let Err(err) = page.close().await {
            export_warn!("Failed to close page for {}: {}", url, err);
        }
        let bytes = rendered?;

        write_atomically(output_path, &bytes)
            .map_err(|err| ExportError::new(FailureKind::Io, err.to_string()))?;
        Ok(bytes.len() as u64)
    }
}

/// Minimal page embedding `markup`, with relative URLs resolved against `base`.
pub fn standalone_document(markup: &str, base: Option<&Url>) -> String {
    let base_tag = base
        .map(|b| format!("<base href=\"{}\">\n    ", escape_attr(b.as_str())))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    {base_tag}<meta charset=\"utf-8\">\n    \
         <style>\n      body {{ font-family: sans-serif; padding: 20px; margin: 0; }}\n    \
         </style>\n  </head>\n  <body>\n{markup}\n  </body>\n</html>\n"
    )
}

fn escape_attr(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
