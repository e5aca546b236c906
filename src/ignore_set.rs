//! Path exclusion for archive operations
//!
//! An [`IgnoreSet`] is an ordered list of literal path patterns, matched
//! component-wise against paths relative to the archive root. A path is
//! excluded when it equals a pattern or lies beneath one:
//!
//! ```text
//! pattern "build"   excludes  build, build/out.o, build/a/b
//!                   keeps     builder, src/build
//! ```
//!
//! There is no globbing and no negation. The empty relative path (the root
//! itself) is always excluded since it has no name to archive under.
//!
//! The per-root ignore file holds one pattern per line. Only the line ending
//! is stripped, so names with surrounding spaces stay matchable. Empty lines
//! and lines starting with `#` are dropped. `./` prefixes and trailing `/` do
//! not change what a pattern matches.

use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Ordered set of literal exclusion patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    patterns: Vec<PathBuf>,
}

impl IgnoreSet {
    /// Create an empty set that excludes nothing but the root
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw patterns, normalizing each one
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for pattern in patterns {
            set.push(pattern.as_ref());
        }
        set
    }

    /// Parse the contents of an ignore file
    pub fn parse(contents: &str) -> Self {
        Self::from_patterns(contents.lines())
    }

    /// Read an ignore file
    ///
    /// A missing file yields an empty set. Any other read failure is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let set = Self::parse(&contents);
                debug!("Loaded {} ignore patterns from {:?}", set.len(), path);
                Ok(set)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No ignore file at {:?}", path);
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add one more pattern, returning the set
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.push(pattern);
        self
    }

    /// Add a pattern in place. Patterns that normalize to nothing are dropped.
    pub fn push(&mut self, pattern: &str) {
        if let Some(normalized) = normalize_pattern(pattern) {
            if !self.patterns.contains(&normalized) {
                self.patterns.push(normalized);
            }
        }
    }

    /// Decide whether `relative_path` is excluded
    pub fn is_excluded(&self, relative_path: impl AsRef<Path>) -> bool {
        let path = relative_path.as_ref();
        if path.as_os_str().is_empty() {
            return true;
        }

        self.patterns.iter().any(|pattern| path.starts_with(pattern))
    }

    /// Normalized patterns in insertion order
    pub fn patterns(&self) -> &[PathBuf] {
        &self.patterns
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set holds no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn normalize_pattern(raw: &str) -> Option<PathBuf> {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut pattern = PathBuf::new();
    for component in Path::new(line).components() {
        match component {
            Component::Normal(part) => pattern.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            // Nothing under the root can match a pattern that climbs out of it
            Component::ParentDir => {
                debug!("Dropping ignore pattern {:?}", line);
                return None;
            }
        }
    }

    if pattern.as_os_str().is_empty() {
        None
    } else {
        Some(pattern)
    }
}
