use regex::Regex;

use crate::ConfigError;

/// A label filter rebuilt from its regex source.
///
/// The source string is what crosses into a rendering context; the compiled
/// form filters candidates on this side of the boundary. An empty source
/// matches every label.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    regex: Regex,
}

impl MatchPattern {
    pub fn new(source: impl Into<String>) -> Result<Self, ConfigError> {
        let source = source.into();
        let regex = Regex::new(&source).map_err(|err| ConfigError::InvalidPattern {
            pattern: source.clone(),
            message: err.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    pub fn match_all() -> Self {
        Self {
            source: String::new(),
            regex: Regex::new("").expect("empty regex"),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Unanchored test, like `RegExp.prototype.test` without the `g` flag.
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
