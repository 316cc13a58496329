use std::fmt;
use std::time::Duration;

/// A per-item export failure. Its `Display` form is the ledger reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExportError {
    pub kind: FailureKind,
    pub message: String,
}

impl ExportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn timeout(what: &str, after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("{what} timed out after {}ms", after.as_millis()),
        )
    }

    pub(crate) fn io(err: std::io::Error) -> Self {
        Self::new(FailureKind::Io, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidSelector,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    Io,
    Navigation,
    SelectorMissing { selector: String },
    Script,
    Render,
    Browser,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidSelector => write!(f, "invalid selector"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Navigation => write!(f, "navigation failed"),
            FailureKind::SelectorMissing { selector } => {
                write!(f, "selector {selector} not found")
            }
            FailureKind::Script => write!(f, "script evaluation failed"),
            FailureKind::Render => write!(f, "pdf rendering failed"),
            FailureKind::Browser => write!(f, "browser error"),
        }
    }
}
