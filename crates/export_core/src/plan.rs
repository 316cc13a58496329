use std::fmt;

use url::Url;

use crate::sanitize::{fallback_name, marker_name, path_param_name, sanitize, url_segment_name};
use crate::{resolve_source, Candidate, ExportMode, NameSource, ResolvedTarget};

/// Per-run inputs to the item policy chain.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub page_url: Url,
    pub mode: ExportMode,
    pub name_source: NameSource,
}

impl PlanContext {
    pub fn new(page_url: Url, mode: ExportMode) -> Self {
        Self {
            page_url,
            mode,
            name_source: NameSource::default_for(mode),
        }
    }

    pub fn with_name_source(mut self, name_source: NameSource) -> Self {
        self.name_source = name_source;
        self
    }
}

/// Why a candidate is excluded from output without a ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedScheme(String),
    AlreadyPdf(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedScheme(scheme) => write!(f, "non-http scheme {scheme}"),
            SkipReason::AlreadyPdf(path) => write!(f, "already a pdf: {path}"),
        }
    }
}

/// What the orchestrator should do with one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPlan {
    Skip(SkipReason),
    /// The candidate cannot be exported; record a failure under `file_name`.
    Reject { file_name: String, reason: String },
    Export {
        target: ResolvedTarget,
        file_name: String,
    },
}

/// Skip guards: non-http(s) schemes in any mode, and in pdf mode a `path`
/// query parameter that already references a `.pdf`.
pub fn skip_reason(mode: ExportMode, url: &Url) -> Option<SkipReason> {
    if !matches!(url.scheme(), "http" | "https") {
        return Some(SkipReason::UnsupportedScheme(url.scheme().to_string()));
    }
    if mode == ExportMode::Pdf {
        if let Some((_, path)) = url.query_pairs().find(|(key, _)| key == "path") {
            if path.to_ascii_lowercase().contains(".pdf") {
                return Some(SkipReason::AlreadyPdf(path.into_owned()));
            }
        }
    }
    None
}

/// Base output name for a candidate whose URL is already resolved.
///
/// Names come from the link as written, before any request is made, so
/// redirects never rename a download.
pub fn output_name(candidate: &Candidate, url: &Url, ordinal: usize, source: NameSource) -> String {
    let fallback = fallback_name(&candidate.source_ref, ordinal);
    let label_name = || sanitize(&candidate.label, &fallback);
    if let Some(token) = marker_name(&candidate.label) {
        return token;
    }
    match source {
        NameSource::Label => label_name(),
        NameSource::UrlSegment => url_segment_name(url).unwrap_or_else(label_name),
        NameSource::PathParam => path_param_name(url).unwrap_or_else(label_name),
    }
}

/// On-disk file name for `output_name` in `mode`.
pub fn file_name_for(mode: ExportMode, output_name: &str) -> String {
    match mode {
        ExportMode::Fetch => output_name.to_string(),
        ExportMode::Pdf if output_name.to_ascii_lowercase().ends_with(".pdf") => {
            output_name.to_string()
        }
        ExportMode::Pdf => format!("{output_name}.pdf"),
    }
}

/// Ordered policy chain for one candidate: resolve, skip check, naming.
///
/// `ordinal` is the candidate's zero-based position in the run and only
/// feeds the `Page_<n>` fallback name.
pub fn plan_item(candidate: &Candidate, ordinal: usize, ctx: &PlanContext) -> ItemPlan {
    let url = match resolve_source(&ctx.page_url, &candidate.source_ref) {
        Ok(url) => url,
        Err(err) => {
            let fallback = fallback_name(&candidate.source_ref, ordinal);
            let name = sanitize(&candidate.label, &fallback);
            return ItemPlan::Reject {
                file_name: file_name_for(ctx.mode, &name),
                reason: err.to_string(),
            };
        }
    };

    if let Some(reason) = skip_reason(ctx.mode, &url) {
        return ItemPlan::Skip(reason);
    }

    let name = output_name(candidate, &url, ordinal, ctx.name_source);
    let file_name = file_name_for(ctx.mode, &name);
    ItemPlan::Export {
        target: ResolvedTarget {
            absolute_url: url.into(),
            output_name: name,
        },
        file_name,
    }
}

/// Text column for a candidate's ledger row: its label, or the file name
/// when the label is empty.
pub fn ledger_text(candidate: &Candidate, file_name: &str) -> String {
    if candidate.label.trim().is_empty() {
        file_name.to_string()
    } else {
        candidate.label.clone()
    }
}
