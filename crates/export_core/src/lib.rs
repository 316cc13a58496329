//! Export core: pure naming, matching and per-item policy decisions.
mod pattern;
mod plan;
mod resolve;
mod sanitize;
mod types;

pub use pattern::MatchPattern;
pub use plan::{
    file_name_for, ledger_text, output_name, plan_item, skip_reason, ItemPlan, PlanContext,
    SkipReason,
};
pub use resolve::{page_origin, resolve_source};
pub use sanitize::{fallback_name, marker_name, path_param_name, sanitize, url_segment_name};
pub use types::{
    cookie_header, Candidate, ExportMode, ExportOutcome, LedgerEntry, LedgerStatus, NameSource,
    ResolvedTarget, SessionCredential, WaitUntil,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid match pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("unknown export mode {0:?}, expected fetch or pdf")]
    UnknownMode(String),
    #[error("unknown name source {0:?}, expected label, url-segment or path-param")]
    UnknownNameSource(String),
    #[error("unknown wait condition {0:?}, expected load, networkidle0 or networkidle2")]
    UnknownWaitUntil(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("empty source reference")]
    Empty,
    #[error("invalid url {reference:?}: {source}")]
    Invalid {
        reference: String,
        #[source]
        source: url::ParseError,
    },
}
