//! Key Pattern Module
//!
//! Compiled matcher used by `remove_by_pattern`.

use regex::Regex;

use crate::error::Result;

/// Regex matched anywhere inside a stored identifier.
///
/// A plain substring such as `pattern` is a valid regex matching itself.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// Compiles `pattern`, failing with `CacheError::InvalidPattern`.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, identifier: &str) -> bool {
        self.regex.is_match(identifier)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}
