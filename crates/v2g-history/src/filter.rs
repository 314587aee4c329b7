// filter.rs: Glob-based exclusion of legacy paths.
//
// A pattern matches either the full legacy path (`$/Project/bin/**`) or the
// item's file name (`*.scc`). Matching is case-insensitive because legacy
// paths are.

use glob::{MatchOptions, Pattern};

use crate::error::{ReaderError, Result};
use crate::item::file_name;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Set of exclusion patterns applied during collection.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<Pattern>,
}

impl ExcludeFilter {
    /// Compile `patterns`. Fails on the first invalid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| ReaderError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether the legacy `path` is excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        let name = file_name(path);
        self.patterns.iter().any(|p| {
            p.matches_with(path, MATCH_OPTIONS) || p.matches_with(name, MATCH_OPTIONS)
        })
    }
}
