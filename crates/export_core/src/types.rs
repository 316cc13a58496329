use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One element matched by selector and pattern. `source_ref` may be relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub source_ref: String,
    pub label: String,
}

impl Candidate {
    pub fn new(source_ref: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub absolute_url: String,
    pub output_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerStatus {
    Success,
    Failure { reason: Option<String> },
}

impl From<&ExportOutcome> for LedgerStatus {
    fn from(outcome: &ExportOutcome) -> Self {
        match outcome {
            ExportOutcome::Success => LedgerStatus::Success,
            ExportOutcome::Failure(reason) => LedgerStatus::Failure {
                reason: Some(reason.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub text: String,
    pub file_name: String,
    pub status: LedgerStatus,
}

/// Name/value cookie pair forwarded to the browser and to raw fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub name: String,
    pub value: String,
}

impl SessionCredential {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Serializes credentials into a single `Cookie` header value.
///
/// Returns `None` for an empty jar so no header is sent at all.
pub fn cookie_header(credentials: &[SessionCredential]) -> Option<String> {
    if credentials.is_empty() {
        return None;
    }
    let joined = credentials
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    Some(joined)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Stream the referenced resource to disk as raw bytes.
    Fetch,
    /// Navigate to the referenced page and print it to PDF.
    #[default]
    Pdf,
}

impl FromStr for ExportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch" => Ok(ExportMode::Fetch),
            "pdf" => Ok(ExportMode::Pdf),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Fetch => write!(f, "fetch"),
            ExportMode::Pdf => write!(f, "pdf"),
        }
    }
}

/// Where the base of an output filename comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameSource {
    /// Sanitized label text.
    Label,
    /// Last path segment of the resolved URL, extension kept.
    UrlSegment,
    /// Last segment of the `path` query parameter.
    PathParam,
}

impl NameSource {
    pub fn default_for(mode: ExportMode) -> Self {
        match mode {
            ExportMode::Fetch => NameSource::UrlSegment,
            ExportMode::Pdf => NameSource::Label,
        }
    }
}

impl FromStr for NameSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "label" => Ok(NameSource::Label),
            "url-segment" | "url_segment" => Ok(NameSource::UrlSegment),
            "path-param" | "path_param" => Ok(NameSource::PathParam),
            other => Err(ConfigError::UnknownNameSource(other.to_string())),
        }
    }
}

/// Navigation completion condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// No requests in flight for the quiet window.
    #[default]
    NetworkIdle0,
    /// At most two requests in flight for the quiet window.
    NetworkIdle2,
}

impl WaitUntil {
    /// Maximum number of in-flight requests tolerated while idle.
    pub fn max_inflight(&self) -> Option<usize> {
        match self {
            WaitUntil::Load => None,
            WaitUntil::NetworkIdle0 => Some(0),
            WaitUntil::NetworkIdle2 => Some(2),
        }
    }
}

impl FromStr for WaitUntil {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "load" => Ok(WaitUntil::Load),
            "networkidle0" => Ok(WaitUntil::NetworkIdle0),
            "networkidle2" => Ok(WaitUntil::NetworkIdle2),
            other => Err(ConfigError::UnknownWaitUntil(other.to_string())),
        }
    }
}
