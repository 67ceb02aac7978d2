//! Cumulative ignore rules for the discovery walk
//!
//! Discovery excludes paths using gitwildmatch patterns collected from
//! `.gitignore` and `.forgeignore` files. The effective set at a directory
//! is the walk root's ancestor patterns (every directory between the
//! enclosing git root and the walk root, root-first) plus the local ignore
//! files of each directory descended through, appended in walk order.
//! Patterns always match against paths relative to the walk root, not the
//! directory the ignore file lives in.
//!
//! Two implicit patterns seed every set: the version-control directory
//! (`.git`) and the forge state directory (`.forge`).

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ignore files consulted in each directory, in order.
const IGNORE_FILES: &[&str] = &[".gitignore", ".forgeignore"];

/// Implicit exclusions present in every ignore set.
const BASE_PATTERNS: &[&str] = &[".git", ".forge"];

#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("failed to read ignore file {}: {source}", .path.display())]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),
}

/// Ordered, cumulative set of ignore patterns.
///
/// Cheap to clone; the discovery walk snapshots one per traversal frame.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
}

impl IgnoreSet {
    /// Builds the seed set for a walk rooted at `walk_root`.
    ///
    /// Collects the ignore files of every ancestor directory between
    /// `scope_root` (usually the enclosing git root) and `walk_root`,
    /// applied root-to-walk-root so deeper entries land last. `walk_root`'s
    /// own ignore files are not included here; the walk adds them when it
    /// enters the root directory.
    pub fn base(walk_root: &Path, scope_root: &Path) -> Result<Self, IgnoreError> {
        let mut patterns: Vec<String> = BASE_PATTERNS.iter().map(|s| s.to_string()).collect();
        for dir in ancestors_between(walk_root, scope_root) {
            patterns.extend(read_ignore_files(&dir)?);
        }
        Ok(Self { patterns })
    }

    /// Returns a child set extended with `dir`'s own ignore files.
    pub fn with_dir(&self, dir: &Path) -> Result<Self, IgnoreError> {
        let mut patterns = self.patterns.clone();
        patterns.extend(read_ignore_files(dir)?);
        Ok(Self { patterns })
    }

    /// Compiles the current patterns into a matcher anchored at
    /// `walk_root`.
    pub fn matcher(&self, walk_root: &Path) -> Result<IgnoreMatcher, IgnoreError> {
        let mut builder = GitignoreBuilder::new(walk_root);
        for line in &self.patterns {
            builder.add_line(None, line)?;
        }
        Ok(IgnoreMatcher {
            gitignore: builder.build()?,
        })
    }

    /// The ordered pattern list currently in effect.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Compiled gitwildmatch predicate for one directory level.
#[derive(Debug)]
pub struct IgnoreMatcher {
    gitignore: Gitignore,
}

impl IgnoreMatcher {
    /// True when `rel_path` (relative to the walk root) is excluded.
    pub fn is_ignored(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.gitignore.matched(rel_path, is_dir).is_ignore()
    }
}

/// Yields the directories strictly between `scope_root` (inclusive) and
/// `path` (exclusive), ordered from `scope_root` downward.
fn ancestors_between(path: &Path, scope_root: &Path) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    let mut current = path.parent();
    while let Some(dir) = current {
        chain.push(dir.to_path_buf());
        if dir == scope_root {
            break;
        }
        current = dir.parent();
    }
    // Nothing to contribute when the walk root is not inside the scope.
    if chain.last().map(PathBuf::as_path) != Some(scope_root) {
        return Vec::new();
    }
    chain.reverse();
    chain
}

fn read_ignore_files(dir: &Path) -> Result<Vec<String>, IgnoreError> {
    let mut lines = Vec::new();
    for name in IGNORE_FILES {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        let content = fs::read_to_string(&path).map_err(|source| IgnoreError::ReadFile {
            path: path.clone(),
            source,
        })?;
        lines.extend(content.lines().map(str::to_string));
    }
    Ok(lines)
}
