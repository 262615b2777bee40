//! Project state at a glance and the suggested next action.

use crate::error::Result;
use crate::fetch::{CommitInfo, TemplateSource};
use crate::paths;
use crate::runner::{gh_authenticated, CommandRunner};
use crate::settings::{ProjectSettings, Settings, TemplateState};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
    pub has_git: bool,
    pub has_pyproject: bool,
    pub has_settings: bool,
}

impl ProjectContext {
    pub fn detect(root: &Path) -> Self {
        Self {
            has_git: root.join(paths::GIT_DIR).exists(),
            has_pyproject: paths::pyproject_path(root).is_file(),
            has_settings: paths::settings_path(root).is_file(),
        }
    }

    /// A repository with no project metadata yet.
    pub fn is_fresh_clone(&self) -> bool {
        self.has_git && !self.has_pyproject
    }

    pub fn is_existing_repo(&self) -> bool {
        self.has_git && self.has_pyproject
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Configure,
    CheckUpdates,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::Configure => "Configure the project (placeholder values remain)",
            Recommendation::CheckUpdates => "Review template changes since the last sync",
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Recommendation::Configure => "pyt configure",
            Recommendation::CheckUpdates => "pyt check",
        }
    }
}

/// Suggest the next action. `latest` is the template head, when known.
pub fn recommend(
    context: &ProjectContext,
    project: &ProjectSettings,
    state: Option<&TemplateState>,
    latest: Option<&CommitInfo>,
) -> Option<Recommendation> {
    if context.is_fresh_clone() || !project.is_configured() {
        return Some(Recommendation::Configure);
    }
    let latest = latest?;
    match state.filter(|s| s.is_synced()) {
        Some(s) if same_commit(&s.commit, &latest.sha) => None,
        _ => Some(Recommendation::CheckUpdates),
    }
}

/// Either sha may be abbreviated.
fn same_commit(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightWarning {
    pub message: String,
    pub suggestion: String,
}

impl PreflightWarning {
    pub fn new(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Environment problems that would get in the way of the other commands.
pub fn preflight(runner: &dyn CommandRunner, context: &ProjectContext) -> Vec<PreflightWarning> {
    let mut warnings = Vec::new();
    if !context.has_git {
        warnings.push(PreflightWarning::new("Not a git repository", "Run: git init"));
    }
    if !runner.exists("git") {
        warnings.push(PreflightWarning::new(
            "git is not installed",
            "Install from: https://git-scm.com/downloads",
        ));
    }
    if !runner.exists("gh") {
        warnings.push(PreflightWarning::new(
            "GitHub CLI (gh) is not installed",
            "Install from: https://cli.github.com/",
        ));
    } else if !gh_authenticated(runner) {
        warnings.push(PreflightWarning::new(
            "GitHub CLI not authenticated",
            "Run: gh auth login",
        ));
    }
    warnings
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub root: PathBuf,
    pub context: ProjectContext,
    pub project: ProjectSettings,
    pub configured: bool,
    pub placeholders: Vec<&'static str>,
    pub template: Option<TemplateState>,
    pub latest: Option<CommitInfo>,
    pub recommendation: Option<Recommendation>,
    pub warnings: Vec<PreflightWarning>,
}

/// Collect everything `pyt status` shows. With no `source` (offline) the
/// template head is unknown. A failed lookup becomes a warning.
pub fn gather(
    root: &Path,
    runner: &dyn CommandRunner,
    source: Option<&TemplateSource>,
) -> Result<StatusReport> {
    let context = ProjectContext::detect(root);
    let settings = Settings::load(root)?;
    let mut warnings = preflight(runner, &context);

    let latest = match source {
        Some(source) => match source.latest_commit() {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "could not look up the latest template commit");
                warnings.push(PreflightWarning::new(
                    "Could not reach the template repository",
                    "Retry later or pass --offline",
                ));
                None
            }
        },
        None => None,
    };

    let recommendation = recommend(
        &context,
        &settings.project,
        settings.template.as_ref(),
        latest.as_ref(),
    );
    Ok(StatusReport {
        root: root.to_path_buf(),
        context,
        configured: settings.project.is_configured(),
        placeholders: settings.project.placeholder_fields(),
        project: settings.project,
        template: settings.template,
        latest,
        recommendation,
        warnings,
    })
}
