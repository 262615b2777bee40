//! Compare a project tree against a reference template tree.
//!
//! Every relative file path found under either root, minus the skip set,
//! lands in at most one bucket:
//!
//! - `modified`: present in both trees, content differs
//! - `missing`:  present only in the template
//! - `extra`:    present only in the project
//!
//! Content comparison: files that are valid UTF-8 without NUL bytes are text
//! and compare equal when they match after CRLF → LF normalization. Anything
//! else is binary and compares by raw bytes. Symlinks and directories are
//! never classified.

use crate::error::{PytError, Result};
use crate::paths::to_slash;
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

/// Paths never compared, anchored at the root: VCS metadata, virtualenvs,
/// build output, local state. `build` skips `build/` but not `src/x/build/`.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    ".git",
    ".venv",
    "venv",
    ".coverage",
    "htmlcov",
    "node_modules",
    "dist",
    "build",
    "site",
    "tmp",
    "uv.lock",
    ".config/pyproject_template",
];

/// Cache and metadata names skipped at any depth.
pub const DEFAULT_SKIP_ANYWHERE: &[&str] = &[
    "__pycache__",
    "*.pyc",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "*.egg-info",
    ".DS_Store",
];

// ---------------------------------------------------------------------------
// SkipPatterns
// ---------------------------------------------------------------------------

/// Rooted globs match the relative path or one of its leading directories,
/// so `src/package_name` prunes the whole package. Anywhere globs match any
/// single path component.
#[derive(Debug, Clone)]
pub struct SkipPatterns {
    rooted: Vec<Pattern>,
    anywhere: Vec<Pattern>,
}

impl SkipPatterns {
    /// Rooted patterns only.
    pub fn new<I, S>(globs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            rooted: compile(globs)?,
            anywhere: Vec::new(),
        })
    }

    pub fn defaults() -> Self {
        // The built-in globs are all valid.
        Self {
            rooted: compile(DEFAULT_SKIP_PATTERNS).unwrap_or_default(),
            anywhere: compile(DEFAULT_SKIP_ANYWHERE).unwrap_or_default(),
        }
    }

    /// Add one more rooted glob.
    pub fn with(mut self, glob: &str) -> Result<Self> {
        self.rooted.extend(compile([glob])?);
        Ok(self)
    }

    /// Add a glob matched against every path component.
    pub fn with_anywhere(mut self, glob: &str) -> Result<Self> {
        self.anywhere.extend(compile([glob])?);
        Ok(self)
    }

    pub fn is_skipped(&self, rel: &str) -> bool {
        let opts = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        let rooted = leading_paths(rel).any(|prefix| {
            self.rooted.iter().any(|p| p.matches_with(prefix, opts))
        });
        rooted
            || rel
                .split('/')
                .any(|component| self.anywhere.iter().any(|p| p.matches(component)))
    }
}

fn compile<I, S>(globs: I) -> Result<Vec<Pattern>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    globs
        .into_iter()
        .map(|g| {
            let g = g.as_ref();
            Pattern::new(g.trim_end_matches('/')).map_err(|e| PytError::InvalidSkipPattern {
                pattern: g.to_string(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}

/// `a/b/c` yields `a`, `a/b`, `a/b/c`.
fn leading_paths(rel: &str) -> impl Iterator<Item = &str> {
    rel.match_indices('/')
        .map(move |(idx, _)| &rel[..idx])
        .chain(std::iter::once(rel))
}

impl Default for SkipPatterns {
    fn default() -> Self {
        Self::defaults()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Modified,
    Missing,
    Extra,
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Modified => write!(f, "modified"),
            Change::Missing => write!(f, "missing"),
            Change::Extra => write!(f, "extra"),
        }
    }
}

/// A path that could not be read; it is left out of every bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathError {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub modified: Vec<String>,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub errors: Vec<PathError>,
}

impl DiffReport {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.missing.is_empty() && self.extra.is_empty()
    }

    pub fn change_for(&self, path: &str) -> Option<Change> {
        let has = |bucket: &[String]| bucket.iter().any(|p| p == path);
        if has(&self.modified) {
            Some(Change::Modified)
        } else if has(&self.missing) {
            Some(Change::Missing)
        } else if has(&self.extra) {
            Some(Change::Extra)
        } else {
            None
        }
    }

    /// All classified paths in path order.
    pub fn entries(&self) -> Vec<(Change, &str)> {
        let mut out: Vec<(Change, &str)> = self
            .modified
            .iter()
            .map(|p| (Change::Modified, p.as_str()))
            .chain(self.missing.iter().map(|p| (Change::Missing, p.as_str())))
            .chain(self.extra.iter().map(|p| (Change::Extra, p.as_str())))
            .collect();
        out.sort_by(|a, b| a.1.cmp(b.1));
        out
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify every file under `project` and `template`.
///
/// Fails fast when either root is not a directory; unreadable entries are
/// reported in `errors` without stopping the walk.
pub fn classify(project: &Path, template: &Path, skip: &SkipPatterns) -> Result<DiffReport> {
    for root in [project, template] {
        if !root.is_dir() {
            return Err(PytError::RootNotFound(root.to_path_buf()));
        }
    }

    let mut report = DiffReport::default();
    let template_files = collect_files(template, skip, &mut report.errors);
    let project_files = collect_files(project, skip, &mut report.errors);

    for rel in &template_files {
        if !project_files.contains(rel) {
            report.missing.push(rel.clone());
            continue;
        }
        match files_differ(&project.join(rel), &template.join(rel)) {
            Ok(true) => report.modified.push(rel.clone()),
            Ok(false) => {}
            Err(e) => report.errors.push(PathError {
                path: rel.clone(),
                error: e.to_string(),
            }),
        }
    }

    report.extra = project_files
        .difference(&template_files)
        .cloned()
        .collect();

    tracing::debug!(
        modified = report.modified.len(),
        missing = report.missing.len(),
        extra = report.extra.len(),
        errors = report.errors.len(),
        "classified template differences"
    );
    Ok(report)
}

fn collect_files(root: &Path, skip: &SkipPatterns, errors: &mut Vec<PathError>) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let rel = relative(root, entry.path());
            rel.is_empty() || !skip.is_skipped(&rel)
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                files.insert(relative(root, entry.path()));
            }
            Ok(_) => {}
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative(root, p))
                    .unwrap_or_default();
                tracing::warn!(path = %path, error = %e, "skipping unreadable entry");
                errors.push(PathError {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }
    files
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(to_slash)
        .unwrap_or_else(|_| to_slash(path))
}

fn files_differ(a: &Path, b: &Path) -> std::io::Result<bool> {
    let left = std::fs::read(a)?;
    let right = std::fs::read(b)?;
    Ok(!contents_equal(&left, &right))
}

fn as_text(bytes: &[u8]) -> Option<&str> {
    if bytes.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

/// Byte equality, or for two text files equality after CRLF → LF.
pub fn contents_equal(left: &[u8], right: &[u8]) -> bool {
    if left == right {
        return true;
    }
    match (as_text(left), as_text(right)) {
        (Some(l), Some(r)) => l.replace("\r\n", "\n") == r.replace("\r\n", "\n"),
        _ => false,
    }
}
