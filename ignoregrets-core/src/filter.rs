//! Exclude/include filtering of candidate paths
//!
//! Patterns are matched against the base name of each path, so `*.log`
//! excludes log files at any depth but a pattern cannot target a directory.
//! Include patterns win over exclude patterns.

use crate::config::STATE_DIR;
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Compiled exclude/include rule set
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    exclude: Vec<Pattern>,
    include: Vec<Pattern>,
}

impl FileFilter {
    /// Compile the patterns; malformed ones are dropped and never match
    pub fn new<E, I>(exclude: &[E], include: &[I]) -> Self
    where
        E: AsRef<str>,
        I: AsRef<str>,
    {
        Self {
            exclude: compile(exclude),
            include: compile(include),
        }
    }

    /// Apply the rules, returning the surviving paths sorted and de-duplicated
    pub fn apply<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        let mut kept = BTreeSet::new();
        for candidate in candidates {
            let path = candidate.as_ref();
            let name = base_name(path);
            let excluded = self.exclude.iter().any(|p| p.matches(name));
            let included = self.include.iter().any(|p| p.matches(name));
            if !excluded || included {
                kept.insert(path.to_string());
            }
        }
        kept.into_iter().collect()
    }
}

/// Filter `candidates` with the given exclude and include patterns
pub fn filter_paths<S, E, I>(candidates: &[S], exclude: &[E], include: &[I]) -> Vec<String>
where
    S: AsRef<str>,
    E: AsRef<str>,
    I: AsRef<str>,
{
    FileFilter::new(exclude, include).apply(candidates)
}

/// True for paths inside the tool's own state directory
pub fn is_state_path(path: &str) -> bool {
    Path::new(path)
        .components()
        .next()
        .map(|c| c.as_os_str() == STATE_DIR)
        .unwrap_or(false)
}

/// True when a pattern names a single path rather than a glob
pub fn is_literal_pattern(pattern: &str) -> bool {
    !pattern.is_empty() && !pattern.contains(['*', '?', '['])
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p.as_ref()) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                debug!(pattern = p.as_ref(), error = %e, "ignoring malformed glob pattern");
                None
            }
        })
        .collect()
}

fn base_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
