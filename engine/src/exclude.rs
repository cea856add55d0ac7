//! Exclusion matching for file and directory base names.
//!
//! A rule carries two independent lists: one checked against file names, one
//! against directory names. A name is excluded when any entry matches it. Only the
//! base name is ever matched, never the full path.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::fmt;

/// How the entries of an `exclude` block are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternMode {
    /// Exact base-name comparison
    #[default]
    Literal,
    /// Regular expression, matched anywhere in the base name
    Regex,
    /// Shell-style wildcard matched against the whole base name
    Glob,
}

/// One compiled exclusion entry.
#[derive(Debug, Clone)]
pub enum ExclusionRule {
    Literal(String),
    Regex(Regex),
    Glob(GlobMatcher),
}

impl ExclusionRule {
    /// Compile `pattern` according to `mode`.
    ///
    /// Returns the compiler's message on failure.
    pub fn compile(pattern: &str, mode: PatternMode) -> Result<Self, String> {
        match mode {
            PatternMode::Literal => Ok(Self::Literal(pattern.to_string())),
            PatternMode::Regex => Regex::new(pattern)
                .map(Self::Regex)
                .map_err(|e| format!("invalid regular expression {pattern:?}: {e}")),
            PatternMode::Glob => Glob::new(pattern)
                .map(|glob| Self::Glob(glob.compile_matcher()))
                .map_err(|e| format!("invalid glob {pattern:?}: {e}")),
        }
    }

    /// Whether this entry matches the given base name.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == name,
            Self::Regex(regex) => regex.is_match(name),
            Self::Glob(glob) => glob.is_match(name),
        }
    }

    /// The source text of the entry.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(literal) => literal,
            Self::Regex(regex) => regex.as_str(),
            Self::Glob(glob) => glob.glob().glob(),
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            Self::Glob(glob) => write!(f, "{}", glob.glob()),
        }
    }
}

/// Returns true if `name` matches any rule in `rules`.
pub fn is_excluded(name: &str, rules: &[ExclusionRule]) -> bool {
    rules.iter().any(|rule| rule.matches(name))
}

/// The file and directory exclusion lists of one rule.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    pub files: Vec<ExclusionRule>,
    pub directories: Vec<ExclusionRule>,
}

impl Exclusions {
    pub fn excludes_file(&self, name: &str) -> bool {
        is_excluded(name, &self.files)
    }

    pub fn excludes_directory(&self, name: &str) -> bool {
        is_excluded(name, &self.directories)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}
