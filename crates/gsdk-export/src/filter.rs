//! Source filters for per-directory build rules
//!
//! A filter is an ordered list of `+<pattern>` (include) and `-<pattern>`
//! (exclude) rules, matched against paths relative to the rule's source
//! directory. The last matching rule decides; unmatched paths are excluded.

use std::path::Path;

use globset::{Glob, GlobMatcher};
use serde::{Serialize, Serializer};

/// Errors building a source filter
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid filter rule '{0}': expected +<pattern> or -<pattern>")]
    InvalidRule(String),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),
}

#[derive(Debug, Clone)]
struct Rule {
    include: bool,
    text: String,
    matcher: GlobMatcher,
}

/// Ordered include/exclude rules
#[derive(Debug, Clone)]
pub struct SourceFilter {
    rules: Vec<Rule>,
}

impl SourceFilter {
    /// Parse filter rules such as `-<*>` and `+<main.c>`
    pub fn new<S: AsRef<str>>(rules: &[S]) -> Result<Self, FilterError> {
        let mut parsed = Vec::with_capacity(rules.len());

        for rule in rules {
            let text = rule.as_ref();
            let include = match text.chars().next() {
                Some('+') => true,
                Some('-') => false,
                _ => return Err(FilterError::InvalidRule(text.to_string())),
            };
            let pattern = text[1..]
                .strip_prefix('<')
                .and_then(|p| p.strip_suffix('>'))
                .ok_or_else(|| FilterError::InvalidRule(text.to_string()))?;

            parsed.push(Rule {
                include,
                text: text.to_string(),
                matcher: Glob::new(pattern)?.compile_matcher(),
            });
        }

        Ok(Self { rules: parsed })
    }

    /// Filter that selects exactly the listed file names
    pub fn only_files<S: AsRef<str>>(names: &[S]) -> Result<Self, FilterError> {
        let mut rules = vec!["-<*>".to_string()];
        rules.extend(
            names
                .iter()
                .map(|name| format!("+<{}>", globset::escape(name.as_ref()))),
        );
        Self::new(&rules)
    }

    /// Whether a path relative to the source directory is selected
    pub fn matches(&self, relative: &Path) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matcher.is_match(relative))
            .map(|rule| rule.include)
            .unwrap_or(false)
    }

    /// Rule texts in order
    pub fn rules(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.text.as_str()).collect()
    }
}

impl PartialEq for SourceFilter {
    fn eq(&self, other: &Self) -> bool {
        self.rules() == other.rules()
    }
}

impl Serialize for SourceFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rules.iter().map(|r| r.text.as_str()))
    }
}
