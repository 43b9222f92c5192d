//! `src/fs/matcher.rs`
//! ============================================================
//! Name matcher for filename searches. The query string is opaque to the
//! worker; this module gives it the minimal interpretation the search
//! engine needs: case-insensitive substring by default, glob semantics when
//! the query carries metacharacters. Kept as its own module so a richer
//! query parser can replace it without touching the walk.

use glob::{MatchOptions, Pattern};

use crate::error::AppError;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled name matcher, built once per search.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Case-insensitive substring match (lowercased needle).
    Substring(String),

    /// Glob match, used when the query contains `*`, `?` or `[`.
    Glob(Pattern),
}

impl NameMatcher {
    /// Compile a query string. Invalid glob syntax is an input error.
    pub fn new(query: &str) -> Result<Self, AppError> {
        if query.chars().any(|c: char| matches!(c, '*' | '?' | '[')) {
            let pattern: Pattern = Pattern::new(query)
                .map_err(|e| AppError::invalid_input("query", e.to_string()))?;

            Ok(Self::Glob(pattern))
        } else {
            Ok(Self::Substring(query.to_lowercase()))
        }
    }

    /// Test one entry name.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Substring(needle) => name.to_lowercase().contains(needle.as_str()),
            Self::Glob(pattern) => pattern.matches_with(name, GLOB_OPTIONS),
        }
    }
}
