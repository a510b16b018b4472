//! File pattern matcher for bundle property files.

use std::path::{
    Path,
    PathBuf,
};

use globset::{
    Glob,
    GlobSet,
    GlobSetBuilder,
};
use ignore::WalkBuilder;

/// Default include pattern when none is configured.
pub const DEFAULT_INCLUDE: &str = "**/*.properties";

#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Invalid include pattern '{pattern}': {source}")]
    InvalidIncludePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExcludePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to build glob set: {0}")]
    GlobSetBuild(#[from] globset::Error),

    #[error("Bundle root is not a directory: {0}")]
    RootNotFound(PathBuf),
}

/// Resolves a root directory plus include/exclude glob patterns into the
/// concrete set of candidate files.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    root: PathBuf,
    include_set: GlobSet,
    exclude_set: GlobSet,
}

impl FileMatcher {
    /// Compiles the pattern sets. An empty include list falls back to
    /// [`DEFAULT_INCLUDE`].
    ///
    /// # Errors
    /// Invalid glob pattern or nonexistent root; both are configuration
    /// errors and abort before any traversal.
    pub fn new(
        root: impl Into<PathBuf>,
        includes: &[String],
        excludes: &[String],
    ) -> Result<Self, MatcherError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(MatcherError::RootNotFound(root));
        }

        let default_includes = [DEFAULT_INCLUDE.to_string()];
        let includes = if includes.is_empty() { &default_includes[..] } else { includes };

        let include_set = Self::build_glob_set(includes, |pattern, source| {
            MatcherError::InvalidIncludePattern { pattern, source }
        })?;
        let exclude_set = Self::build_glob_set(excludes, |pattern, source| {
            MatcherError::InvalidExcludePattern { pattern, source }
        })?;

        Ok(Self { root, include_set, exclude_set })
    }

    fn build_glob_set<F>(patterns: &[String], make_error: F) -> Result<GlobSet, MatcherError>
    where
        F: Fn(String, globset::Error) -> MatcherError,
    {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| make_error(pattern.clone(), e))?;
            builder.add(glob);
        }
        Ok(builder.build()?)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if the path matches the include patterns but not the
    /// exclude patterns. The path must be absolute and under the root.
    #[must_use]
    pub fn is_match(&self, absolute_path: &Path) -> bool {
        let Ok(relative_path) = absolute_path.strip_prefix(&self.root) else {
            return false;
        };

        self.is_match_relative(relative_path)
    }

    /// Same as [`FileMatcher::is_match`] for a path relative to the root.
    #[must_use]
    pub fn is_match_relative(&self, relative_path: &Path) -> bool {
        self.include_set.is_match(relative_path) && !self.exclude_set.is_match(relative_path)
    }

    /// Walks the root and returns every matching regular file, sorted for
    /// deterministic processing order.
    ///
    /// Unlike an editor integration, a batch sync must see exactly what the
    /// patterns say: hidden files are visible and gitignore rules are off.
    #[must_use]
    pub fn find_files(&self) -> Vec<PathBuf> {
        let mut found_files = Vec::new();

        for result in WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .follow_links(false)
            .build()
        {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(?err, "Failed to read directory entry");
                    continue;
                },
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let Ok(relative_path) = path.strip_prefix(&self.root) else {
                continue;
            };
            if !self.is_match_relative(relative_path) {
                continue;
            }

            found_files.push(path.to_path_buf());
        }

        found_files.sort();
        found_files
    }
}
