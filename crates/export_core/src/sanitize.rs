use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const UNTITLED: &str = "UNTITLED";

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FILE NAME:\s*(\S+)").expect("marker regex"));

/// Deterministic, filesystem-safe name derived from a label.
///
/// Characters outside `[A-Za-z0-9_\s-]` are dropped, whitespace runs become a
/// single `_` and the result is uppercased. A `FILE NAME: <token>` marker in
/// the label wins and is returned verbatim. An empty result falls back to the
/// folded `fallback`, and finally to `UNTITLED`.
pub fn sanitize(label: &str, fallback: &str) -> String {
    if let Some(token) = marker_name(label) {
        return token;
    }
    let folded = fold(label);
    if !folded.is_empty() {
        return folded;
    }
    let folded = fold(fallback);
    if !folded.is_empty() {
        return folded;
    }
    UNTITLED.to_string()
}

/// Token following a `FILE NAME:` marker, if it names a plain file.
///
/// Tokens carrying a path separator or naming `.`/`..` are ignored so the
/// source page cannot write outside the output directory.
pub fn marker_name(label: &str) -> Option<String> {
    let token = MARKER.captures(label)?.get(1)?.as_str();
    if token.contains(['/', '\\']) || token == "." || token == ".." {
        return None;
    }
    Some(token.to_string())
}

/// Fallback base for unlabeled candidates: the last path segment of the
/// source reference without its extension, or `Page_<ordinal>`.
pub fn fallback_name(source_ref: &str, ordinal: usize) -> String {
    let without_query = source_ref
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = without_query
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = match segment.rfind('.') {
        Some(idx) if idx > 0 => &segment[..idx],
        _ => segment,
    };
    if fold(stem).is_empty() {
        format!("Page_{ordinal}")
    } else {
        stem.to_string()
    }
}

/// Last non-empty path segment of `url`, extension kept.
pub fn url_segment_name(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    safe_segment(segment)
}

/// Last segment of the `path` query parameter of `url`.
pub fn path_param_name(url: &Url) -> Option<String> {
    let (_, value) = url.query_pairs().find(|(key, _)| key == "path")?;
    let segment = value.rsplit(['/', '\\']).next()?;
    safe_segment(segment)
}

fn fold(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_uppercase()
}

fn safe_segment(segment: &str) -> Option<String> {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.trim_matches('_').is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
