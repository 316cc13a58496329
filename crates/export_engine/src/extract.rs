use async_trait::async_trait;
use export_core::{Candidate, MatchPattern};
use scraper::{ElementRef, Html, Selector};

use crate::browser::RenderPage;
use crate::{ExportError, FailureKind};

/// Candidate extraction over some rendered document.
#[async_trait]
pub trait DocumentQuery: Send + Sync {
    /// Elements matching `selector` whose label passes `pattern`, in document
    /// order. Images are labelled by their `title`, everything else by its
    /// text content. An empty result is not an error.
    async fn extract(
        &self,
        selector: &str,
        pattern: &MatchPattern,
    ) -> Result<Vec<Candidate>, ExportError>;
}

/// Extraction over static HTML, parsed with `scraper`.
#[derive(Debug, Clone)]
pub struct StaticDocument {
    html: String,
    include_unlabeled: bool,
}

impl StaticDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            include_unlabeled: false,
        }
    }

    /// Keep elements whose label is empty (their names fall back to the URL).
    pub fn include_unlabeled(mut self, include: bool) -> Self {
        self.include_unlabeled = include;
        self
    }

    pub fn extract_sync(
        &self,
        selector: &str,
        pattern: &MatchPattern,
    ) -> Result<Vec<Candidate>, ExportError> {
        let selector = Selector::parse(selector).map_err(|err| {
            ExportError::new(FailureKind::InvalidSelector, format!("{selector}: {err}"))
        })?;
        let doc = Html::parse_document(&self.html);
        let candidates = doc
            .select(&selector)
            .filter_map(|element| {
                let (source_ref, raw_label) = element_parts(element)?;
                keep(&raw_label, pattern, self.include_unlabeled)
                    .then(|| Candidate::new(source_ref, raw_label.trim()))
            })
            .collect();
        Ok(candidates)
    }
}

#[async_trait]
impl DocumentQuery for StaticDocument {
    async fn extract(
        &self,
        selector: &str,
        pattern: &MatchPattern,
    ) -> Result<Vec<Candidate>, ExportError> {
        self.extract_sync(selector, pattern)
    }
}

fn element_parts(element: ElementRef) -> Option<(String, String)> {
    let value = element.value();
    if value.name().eq_ignore_ascii_case("img") {
        let src = value.attr("src")?.trim();
        let title = value.attr("title").unwrap_or_default();
        (!src.is_empty()).then(|| (src.to_string(), title.to_string()))
    } else {
        let href = value.attr("href")?.trim();
        let text = element.text().collect::<String>();
        (!href.is_empty()).then(|| (href.to_string(), text))
    }
}

fn keep(raw_label: &str, pattern: &MatchPattern, include_unlabeled: bool) -> bool {
    (include_unlabeled || !raw_label.trim().is_empty()) && pattern.is_match(raw_label)
}

/// Extraction inside a live browser page.
///
/// The pattern crosses into the page as its source string and is rebuilt
/// there with `new RegExp`, so engine-specific regex features follow the
/// browser's dialect.
pub struct BrowserDocument<'a> {
    page: &'a dyn RenderPage,
    include_unlabeled: bool,
}

impl<'a> BrowserDocument<'a> {
    pub fn new(page: &'a dyn RenderPage) -> Self {
        Self {
            page,
            include_unlabeled: false,
        }
    }

    pub fn include_unlabeled(mut self, include: bool) -> Self {
        self.include_unlabeled = include;
        self
    }
}

#[async_trait]
impl DocumentQuery for BrowserDocument<'_> {
    async fn extract(
        &self,
        selector: &str,
        pattern: &MatchPattern,
    ) -> Result<Vec<Candidate>, ExportError> {
        let script = extraction_script(selector, pattern.source(), self.include_unlabeled);
        let value = self.page.evaluate(&script).await?;
        serde_json::from_value(value)
            .map_err(|err| ExportError::new(FailureKind::Script, err.to_string()))
    }
}

/// Self-contained expression returning `[{source_ref, label}]`.
///
/// Selector and pattern are embedded as JSON string literals, which are
/// valid JavaScript string literals.
pub fn extraction_script(selector: &str, pattern_source: &str, include_unlabeled: bool) -> String {
    let selector = serde_json::Value::from(selector).to_string();
    let pattern = serde_json::Value::from(pattern_source).to_string();
    format!(
        r#"(() => {{
  const pattern = new RegExp({pattern});
  const includeUnlabeled = {include_unlabeled};
  return Array.from(document.querySelectorAll({selector}))
    .map((el) => {{
      const isImage = el.tagName === "IMG";
      const raw = (isImage ? el.title : el.textContent) || "";
      const sourceRef = (isImage ? el.src : el.href) || "";
      return {{ source_ref: String(sourceRef), raw }};
    }})
    .filter((c) => c.source_ref !== "")
    .filter((c) => (includeUnlabeled || c.raw.trim() !== "") && pattern.test(c.raw))
    .map((c) => ({{ source_ref: c.source_ref, label: c.raw.trim() }}));
}})()"#
    )
}
