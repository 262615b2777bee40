//! Replace template placeholders with project values.
//!
//! Substitution is literal and runs over a closed target set: an explicit
//! file list plus a few glob patterns expanded once, up front. Nothing
//! outside that set is read or written.

use crate::diff::SkipPatterns;
use crate::error::{PytError, Result};
use crate::io::{atomic_write, move_path};
use crate::names;
use crate::paths::{to_slash, PACKAGE_SOURCE_DIR};
use crate::settings::ProjectSettings;
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Placeholder strings shipped in the template, in substitution order.
/// Longer tokens come before the tokens they contain.
pub const TEMPLATE_TOKENS: &[&str] = &[
    "https://github.com/username/package_name",
    "username/package_name",
    "{owner}",
    "{repo}",
    "security@example.com",
    "[INSERT CONTACT EMAIL]",
    "your.email@example.com",
    "A short description of your package",
    "Your Name",
    "Package Name",
    "package-name",
    "package_name",
    "username",
];

/// Files rewritten when configuring a fresh copy of the template.
pub const DEFAULT_TARGETS: &[&str] = &[
    "pyproject.toml",
    "README.md",
    "LICENSE",
    "dodo.py",
    "mkdocs.yml",
    "AGENTS.md",
    ".envrc",
    ".pre-commit-config.yaml",
    ".claude/CLAUDE.md",
    ".claude/lsp-setup.md",
    ".github/CONTRIBUTING.md",
    ".github/SECURITY.md",
    ".github/CODE_OF_CONDUCT.md",
    ".github/CODEOWNERS",
    ".github/pull_request_template.md",
    ".github/workflows/ci.yml",
    ".github/workflows/release.yml",
    ".github/workflows/testpypi.yml",
    ".github/workflows/breaking-change-detection.yml",
];

pub const DEFAULT_TARGET_GLOBS: &[&str] = &[
    "docs/**/*.md",
    "src/**/*.py",
    ".github/ISSUE_TEMPLATE/*.md",
    ".github/ISSUE_TEMPLATE/config.yml",
    "examples/**/*",
];

/// Test sources whose package imports are rewritten.
pub const TEST_DIR: &str = "tests";

/// Template-only tests removed from configured projects.
pub const TEMPLATE_TOOL_TESTS: &str = "tests/pyproject_template";

const PLACEHOLDER_PACKAGE: &str = "package_name";

// ---------------------------------------------------------------------------
// TokenMap
// ---------------------------------------------------------------------------

/// A closed token → replacement mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMap {
    entries: Vec<(String, String)>,
}

impl TokenMap {
    /// Build a mapping that covers exactly `known`.
    ///
    /// A pair whose token is not in `known` fails with `UnknownToken`; a
    /// known token without a pair fails with `MissingToken`. Entries keep the
    /// order of `known`.
    pub fn new<I, K, V>(known: &[&str], pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut given: Vec<(String, String)> = Vec::new();
        for (k, v) in pairs {
            let k = k.into();
            if !known.contains(&k.as_str()) {
                return Err(PytError::UnknownToken(k));
            }
            given.retain(|(existing, _)| *existing != k);
            given.push((k, v.into()));
        }

        let mut entries = Vec::with_capacity(known.len());
        for token in known {
            let value = given
                .iter()
                .find(|(k, _)| k == token)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| PytError::MissingToken(token.to_string()))?;
            entries.push((token.to_string(), value));
        }
        Ok(Self { entries })
    }

    /// The standard template placeholders filled from project settings.
    pub fn for_project(settings: &ProjectSettings) -> Result<Self> {
        names::validate_package_name(&settings.package_name)?;
        let pypi_name = if settings.pypi_name.is_empty() {
            names::normalize_pypi_name(&settings.package_name)
        } else {
            settings.pypi_name.clone()
        };
        names::validate_pypi_name(&pypi_name)?;
        names::validate_email(&settings.author_email)?;
        if settings.github_user.trim().is_empty() {
            return Err(PytError::Config("GitHub user/organization is required".into()));
        }

        let owner = settings.github_user.as_str();
        let repo = if settings.github_repo.is_empty() {
            settings.package_name.as_str()
        } else {
            settings.github_repo.as_str()
        };
        let project_name = if settings.project_name.is_empty() {
            settings.package_name.as_str()
        } else {
            settings.project_name.as_str()
        };
        let email = settings.author_email.as_str();

        Self::new(
            TEMPLATE_TOKENS,
            [
                ("https://github.com/username/package_name", format!("https://github.com/{owner}/{repo}")),
                ("username/package_name", format!("{owner}/{repo}")),
                ("{owner}", owner.to_string()),
                ("{repo}", repo.to_string()),
                ("security@example.com", email.to_string()),
                ("[INSERT CONTACT EMAIL]", email.to_string()),
                ("your.email@example.com", email.to_string()),
                ("A short description of your package", settings.description.clone()),
                ("Your Name", settings.author_name.clone()),
                ("Package Name", project_name.to_string()),
                ("package-name", pypi_name),
                ("package_name", settings.package_name.clone()),
                ("username", owner.to_string()),
            ],
        )
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == token)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply every replacement in order.
    pub fn apply(&self, content: &str) -> String {
        let mut out = content.to_string();
        for (token, value) in &self.entries {
            if token != value {
                out = replace_token(&out, token, value);
            }
        }
        out
    }
}

/// Literal replacement. Only the package placeholder has an exception:
/// `package_name = ...` / `package_name="..."` used as an assignment key is
/// kept, so keyword arguments and TOML keys named after it survive.
fn replace_token(content: &str, token: &str, value: &str) -> String {
    if token != PLACEHOLDER_PACKAGE {
        return content.replace(token, value);
    }
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (idx, _) in content.match_indices(token) {
        let after = &content[idx + token.len()..];
        out.push_str(&content[last..idx]);
        out.push_str(if is_assignment_key(after) { token } else { value });
        last = idx + token.len();
    }
    out.push_str(&content[last..]);
    out
}

fn is_assignment_key(after: &str) -> bool {
    let rest = after.trim_start_matches([' ', '\t']);
    rest.starts_with('=') && !rest.starts_with("==")
}

// ---------------------------------------------------------------------------
// Configurator
// ---------------------------------------------------------------------------

/// What to do when an explicitly listed target does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Fail before writing anything.
    #[default]
    Abort,
    /// Warn and continue with the remaining targets.
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigureReport {
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped_binary: Vec<String>,
    pub skipped_missing: Vec<String>,
    pub removed: Vec<String>,
    /// `(from, to)` relative to the project root.
    pub renamed: Option<(String, String)>,
    pub dry_run: bool,
}

pub struct Configurator {
    root: PathBuf,
    tokens: TokenMap,
    targets: Vec<String>,
    globs: Vec<String>,
    test_imports: Option<String>,
    remove: Vec<String>,
    rename_to: Option<String>,
    missing: MissingPolicy,
}

impl Configurator {
    /// A configurator with no targets; add them with the builder methods.
    pub fn new(root: impl Into<PathBuf>, tokens: TokenMap) -> Self {
        Self {
            root: root.into(),
            tokens,
            targets: Vec::new(),
            globs: Vec::new(),
            test_imports: None,
            remove: Vec::new(),
            rename_to: None,
            missing: MissingPolicy::default(),
        }
    }

    /// The full template setup for `package_name`: default targets, source
    /// and docs globs, test imports, package directory rename.
    pub fn for_template(root: impl Into<PathBuf>, tokens: TokenMap, package_name: &str) -> Self {
        Self::new(root, tokens)
            .targets(DEFAULT_TARGETS.iter().copied())
            .target_globs(DEFAULT_TARGET_GLOBS.iter().copied())
            .rewrite_test_imports(package_name)
            .remove_dir(TEMPLATE_TOOL_TESTS)
            .rename_package_dir(package_name)
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Glob patterns relative to the root. A pattern matching nothing is fine.
    pub fn target_globs<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.globs.extend(globs.into_iter().map(Into::into));
        self
    }

    /// Rewrite `from package_name` / `import package_name` under `tests/`.
    pub fn rewrite_test_imports(mut self, package_name: &str) -> Self {
        self.test_imports = Some(package_name.to_string());
        self
    }

    pub fn remove_dir(mut self, rel: &str) -> Self {
        self.remove.push(rel.to_string());
        self
    }

    /// Rename `src/package_name` to `src/<package_name>` after substitution.
    pub fn rename_package_dir(mut self, package_name: &str) -> Self {
        self.rename_to = Some(package_name.to_string());
        self
    }

    pub fn missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing = policy;
        self
    }

    pub fn run(&self, dry_run: bool) -> Result<ConfigureReport> {
        let mut report = ConfigureReport {
            dry_run,
            ..Default::default()
        };

        let files = self.resolve_targets(&mut report)?;
        for rel in &files {
            self.rewrite(rel, dry_run, &mut report, |content| self.tokens.apply(content))?;
        }

        if let Some(package) = &self.test_imports {
            for rel in self.expand_glob(&format!("{TEST_DIR}/**/*.py"))? {
                if files.contains(&rel) || self.is_removed(&rel) {
                    continue;
                }
                self.rewrite(&rel, dry_run, &mut report, |content| {
                    rewrite_imports(content, package)
                })?;
            }
        }

        for rel in &self.remove {
            let path = self.root.join(rel);
            if path.is_dir() {
                if !dry_run {
                    std::fs::remove_dir_all(&path)?;
                }
                tracing::info!(dir = %rel, "removed template-only directory");
                report.removed.push(rel.clone());
            }
        }

        if let Some(package) = &self.rename_to {
            report.renamed = self.rename(package, dry_run)?;
        }

        Ok(report)
    }

    fn resolve_targets(&self, report: &mut ConfigureReport) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        let mut missing = Vec::new();
        for rel in &self.targets {
            if self.root.join(rel).is_file() {
                files.insert(rel.clone());
            } else {
                missing.push(rel.clone());
            }
        }

        if !missing.is_empty() {
            match self.missing {
                MissingPolicy::Abort => {
                    return Err(PytError::TargetNotFound(self.root.join(&missing[0])));
                }
                MissingPolicy::Skip => {
                    for rel in &missing {
                        tracing::warn!(file = %rel, "target not found, skipping");
                    }
                    report.skipped_missing = missing;
                }
            }
        }

        for pattern in &self.globs {
            files.extend(
                self.expand_glob(pattern)?
                    .into_iter()
                    .filter(|rel| !self.is_removed(rel)),
            );
        }
        Ok(files)
    }

    fn expand_glob(&self, pattern: &str) -> Result<BTreeSet<String>> {
        let compiled = Pattern::new(pattern).map_err(|e| {
            PytError::Config(format!("invalid target pattern '{pattern}': {}", e.msg))
        })?;
        let opts = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        let skip = SkipPatterns::defaults();

        let mut found = BTreeSet::new();
        if !self.root.is_dir() {
            return Ok(found);
        }
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .map(|rel| rel.as_os_str().is_empty() || !skip.is_skipped(&to_slash(rel)))
                    .unwrap_or(true)
            });
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel = to_slash(rel);
            if compiled.matches_with(&rel, opts) {
                found.insert(rel);
            }
        }
        Ok(found)
    }

    fn is_removed(&self, rel: &str) -> bool {
        self.remove
            .iter()
            .any(|dir| rel.strip_prefix(dir.as_str()).is_some_and(|r| r.starts_with('/')))
    }

    fn rewrite<F>(&self, rel: &str, dry_run: bool, report: &mut ConfigureReport, edit: F) -> Result<()>
    where
        F: Fn(&str) -> String,
    {
        let path = self.root.join(rel);
        let bytes = std::fs::read(&path)?;
        let Ok(content) = String::from_utf8(bytes) else {
            tracing::debug!(file = %rel, "not UTF-8, skipping");
            report.skipped_binary.push(rel.to_string());
            return Ok(());
        };

        let updated = edit(&content);
        if updated == content {
            report.unchanged.push(rel.to_string());
            return Ok(());
        }
        if !dry_run {
            atomic_write(&path, updated.as_bytes())?;
        }
        tracing::debug!(file = %rel, "updated placeholders");
        report.updated.push(rel.to_string());
        Ok(())
    }

    fn rename(&self, package: &str, dry_run: bool) -> Result<Option<(String, String)>> {
        let from = self.root.join(PACKAGE_SOURCE_DIR);
        let to_rel = format!("src/{package}");
        if package == PLACEHOLDER_PACKAGE || !from.is_dir() {
            return Ok(None);
        }
        let to = self.root.join(&to_rel);
        if to.exists() {
            return Err(PytError::Config(format!(
                "cannot rename {PACKAGE_SOURCE_DIR}: {to_rel} already exists"
            )));
        }
        if !dry_run {
            move_path(&from, &to)?;
        }
        tracing::info!(from = PACKAGE_SOURCE_DIR, to = %to_rel, "renamed package directory");
        Ok(Some((PACKAGE_SOURCE_DIR.to_string(), to_rel)))
    }
}

fn rewrite_imports(content: &str, package: &str) -> String {
    content
        .replace(
            &format!("from {PLACEHOLDER_PACKAGE}"),
            &format!("from {package}"),
        )
        .replace(
            &format!("import {PLACEHOLDER_PACKAGE}"),
            &format!("import {package}"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn read(root: &Path, rel: &str) -> String {
        std::fs::read_to_string(root.join(rel)).unwrap()
    }

    fn single(token: &str, value: &str) -> TokenMap {
        TokenMap::new(&[token], [(token, value)]).unwrap()
    }

    fn settings() -> ProjectSettings {
        ProjectSettings {
            project_name: "My Project".into(),
            package_name: "my_project".into(),
            pypi_name: "my-project".into(),
            description: "Does things".into(),
            author_name: "Ada Lovelace".into(),
            author_email: "ada@example.org".into(),
            github_user: "ada".into(),
            github_repo: "my-project".into(),
        }
    }

    #[test]
    fn token_map_rejects_unknown_and_missing() {
        let err = TokenMap::new(&["a"], [("a", "1"), ("b", "2")]).unwrap_err();
        assert!(matches!(err, PytError::UnknownToken(t) if t == "b"));

        let err = TokenMap::new(&["a", "b"], [("a", "1")]).unwrap_err();
        assert!(matches!(err, PytError::MissingToken(t) if t == "b"));
    }

    #[test]
    fn token_map_keeps_known_order() {
        let map = TokenMap::new(&["long_token", "long"], [("long", "L"), ("long_token", "T")])
            .unwrap();
        let order: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["long_token", "long"]);
        assert_eq!(map.apply("long_token long"), "T L");
    }

    #[test]
    fn literal_substitution_only_touches_listed_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pyproject.toml", "package = \"test3project\"");
        write(dir.path(), "other.txt", "package = \"test3project\"");

        let report = Configurator::new(dir.path(), single("test3project", "myproj"))
            .targets(["pyproject.toml"])
            .run(false)
            .unwrap();

        assert_eq!(read(dir.path(), "pyproject.toml"), "package = \"myproj\"");
        assert_eq!(read(dir.path(), "other.txt"), "package = \"test3project\"");
        assert_eq!(report.updated, vec!["pyproject.toml"]);
    }

    #[test]
    fn replacement_is_not_a_regex() {
        let map = single("a.b", "$1");
        assert_eq!(map.apply("axb a.b"), "axb $1");
    }

    #[test]
    fn other_identifier_tokens_are_replaced_in_key_position() {
        let map = single("test3project", "myproj");
        assert_eq!(map.apply("test3project = \"x\""), "myproj = \"x\"");

        let map = single("username", "ada");
        assert_eq!(
            map.apply("username = \"username\"\nf(username=1)"),
            "ada = \"ada\"\nf(ada=1)"
        );
    }

    #[test]
    fn package_token_used_as_key_is_kept() {
        let map = single("package_name", "my_pkg");
        assert_eq!(
            map.apply("from package_name import module\nfunc(package_name=\"value\")\n"),
            "from my_pkg import module\nfunc(package_name=\"value\")\n"
        );
        assert_eq!(
            map.apply("package_name = \"value\"\nname = \"package_name\"\n"),
            "package_name = \"value\"\nname = \"my_pkg\"\n"
        );
        assert_eq!(map.apply("if package_name == x"), "if my_pkg == x");
    }

    #[test]
    fn missing_target_aborts_before_writing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "old");

        let err = Configurator::new(dir.path(), single("old", "new"))
            .targets(["a.txt", "gone.txt"])
            .run(false)
            .unwrap_err();
        assert!(matches!(err, PytError::TargetNotFound(p) if p.ends_with("gone.txt")));
        assert_eq!(read(dir.path(), "a.txt"), "old");
    }

    #[test]
    fn missing_target_skip_policy_continues() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "old");

        let report = Configurator::new(dir.path(), single("old", "new"))
            .targets(["a.txt", "gone.txt"])
            .missing_policy(MissingPolicy::Skip)
            .run(false)
            .unwrap();
        assert_eq!(read(dir.path(), "a.txt"), "new");
        assert_eq!(report.skipped_missing, vec!["gone.txt"]);
    }

    #[test]
    fn binary_targets_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("logo.bin");
        std::fs::write(&bin, b"\x00\x01old\xff\xfe").unwrap();

        let report = Configurator::new(dir.path(), single("old", "new"))
            .targets(["logo.bin"])
            .run(false)
            .unwrap();
        assert_eq!(report.skipped_binary, vec!["logo.bin"]);
        assert_eq!(std::fs::read(&bin).unwrap(), b"\x00\x01old\xff\xfe");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "# Package Name");
        write(dir.path(), "src/package_name/__init__.py", "");

        let report = Configurator::new(dir.path(), single("Package Name", "Thing"))
            .targets(["README.md"])
            .rename_package_dir("thing")
            .run(true)
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.updated, vec!["README.md"]);
        assert_eq!(
            report.renamed,
            Some(("src/package_name".to_string(), "src/thing".to_string()))
        );
        assert_eq!(read(dir.path(), "README.md"), "# Package Name");
        assert!(dir.path().join("src/package_name").is_dir());
    }

    #[test]
    fn globs_expand_within_root() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/index.md", "Package Name docs");
        write(dir.path(), "docs/api/ref.md", "Package Name api");
        write(dir.path(), "docs/notes.txt", "Package Name");

        let report = Configurator::new(dir.path(), single("Package Name", "Thing"))
            .target_globs(["docs/**/*.md"])
            .run(false)
            .unwrap();
        assert_eq!(report.updated, vec!["docs/api/ref.md", "docs/index.md"]);
        assert_eq!(read(dir.path(), "docs/notes.txt"), "Package Name");
    }

    #[test]
    fn rename_refuses_to_clobber() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/package_name/__init__.py", "");
        write(dir.path(), "src/thing/__init__.py", "");

        let err = Configurator::new(dir.path(), single("x", "y"))
            .rename_package_dir("thing")
            .run(false)
            .unwrap_err();
        assert!(matches!(err, PytError::Config(_)));
    }

    #[test]
    fn full_template_configuration() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "pyproject.toml",
            "[project]\nname = \"package-name\"\ndescription = \"A short description of your package\"\nauthors = [{name = \"Your Name\", email = \"your.email@example.com\"}]\n\n[project.urls]\nRepository = \"https://github.com/username/package_name\"\n",
        );
        write(root, "README.md", "# Package Name\n\n`pip install package-name`\n");
        write(root, "src/package_name/__init__.py", "from package_name.core import run\n");
        write(root, "tests/test_core.py", "from package_name import core\nvalue = \"package_name\"\n");
        write(root, "tests/pyproject_template/test_utils.py", "import package_name\n");

        let tokens = TokenMap::for_project(&settings()).unwrap();
        let report = Configurator::for_template(root, tokens, "my_project")
            .missing_policy(MissingPolicy::Skip)
            .run(false)
            .unwrap();

        let pyproject = read(root, "pyproject.toml");
        assert!(pyproject.contains("name = \"my-project\""));
        assert!(pyproject.contains("description = \"Does things\""));
        assert!(pyproject.contains("{name = \"Ada Lovelace\", email = \"ada@example.org\"}"));
        assert!(pyproject.contains("https://github.com/ada/my-project"));
        assert_eq!(read(root, "README.md"), "# My Project\n\n`pip install my-project`\n");

        assert_eq!(
            read(root, "src/my_project/__init__.py"),
            "from my_project.core import run\n"
        );
        assert!(!root.join("src/package_name").exists());

        // Only imports change in tests.
        assert_eq!(
            read(root, "tests/test_core.py"),
            "from my_project import core\nvalue = \"package_name\"\n"
        );
        assert!(!root.join("tests/pyproject_template").exists());
        assert_eq!(report.removed, vec!["tests/pyproject_template"]);
        assert!(report.skipped_missing.contains(&"LICENSE".to_string()));
    }

    #[test]
    fn for_project_validates_inputs() {
        let mut bad = settings();
        bad.package_name = "My-Project".into();
        assert!(matches!(
            TokenMap::for_project(&bad),
            Err(PytError::InvalidPackageName(_))
        ));

        let mut bad = settings();
        bad.author_email = "nope".into();
        assert!(matches!(
            TokenMap::for_project(&bad),
            Err(PytError::InvalidEmail(_))
        ));
    }

    #[test]
    fn for_project_derives_defaults() {
        let mut s = settings();
        s.pypi_name.clear();
        s.github_repo.clear();
        let map = TokenMap::for_project(&s).unwrap();
        assert_eq!(map.get("package-name"), Some("my-project"));
        assert_eq!(map.get("{repo}"), Some("my_project"));
        assert_eq!(map.get("username/package_name"), Some("ada/my_project"));
    }
}
