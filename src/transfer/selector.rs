// src/transfer/selector.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude globs selecting files inside a data space.
///
/// Patterns are relative to the space root; a pattern starting with `!` is
/// an exclusion.
#[derive(Clone)]
pub struct FileSelector {
    includes: Vec<String>,
    excludes: Vec<String>,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for FileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSelector")
            .field("includes", &self.includes)
            .field("excludes", &self.excludes)
            .finish_non_exhaustive()
    }
}

impl FileSelector {
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pat in patterns {
            let pat = pat.as_ref().trim();
            if pat.is_empty() {
                continue;
            }
            match pat.strip_prefix('!') {
                Some(excluded) => excludes.push(excluded.to_string()),
                None => includes.push(pat.to_string()),
            }
        }

        let include_set = build_globset(&includes).context("building include globset")?;
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(build_globset(&excludes).context("building exclude globset")?)
        };

        Ok(Self {
            includes,
            excludes,
            include_set,
            exclude_set,
        })
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Whether nothing can ever match.
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// `rel_path` uses forward slashes, e.g. `"out/result.txt"`.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Files under `root` selected by this selector, as `(absolute, relative)`
    /// pairs sorted by relative path.
    pub fn collect(&self, root: &Path) -> Result<Vec<(PathBuf, String)>> {
        let mut files = Vec::new();
        if self.is_empty() || !root.is_dir() {
            return Ok(files);
        }

        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries =
                std::fs::read_dir(&dir).with_context(|| format!("reading dir {:?}", dir))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.is_file() {
                    if let Ok(rel) = path.strip_prefix(root) {
                        let rel_str = rel.to_string_lossy().replace('\\', "/");
                        if self.matches(&rel_str) {
                            files.push((path, rel_str));
                        }
                    }
                }
            }
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
