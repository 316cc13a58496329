use url::Url;

use crate::ResolveError;

/// `scheme://host[:port]/` of `page`, or `None` for opaque origins.
pub fn page_origin(page: &Url) -> Option<Url> {
    let origin = page.origin();
    if !origin.is_tuple() {
        return None;
    }
    Url::parse(&format!("{}/", origin.ascii_serialization())).ok()
}

/// Resolves a possibly relative reference against `page`, the way a browser
/// resolves `href`.
///
/// Absolute references are returned as-is. `img/a.png` on `https://h/x/y.html`
/// becomes `https://h/x/img/a.png`; `/a.png` and `//cdn/a.png` keep their
/// root-relative and scheme-relative meaning.
pub fn resolve_source(page: &Url, source_ref: &str) -> Result<Url, ResolveError> {
    let trimmed = source_ref.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::Empty);
    }
    page.join(trimmed).map_err(|source| ResolveError::Invalid {
        reference: trimmed.to_string(),
        source,
    })
}
