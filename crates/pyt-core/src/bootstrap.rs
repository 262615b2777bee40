//! Create a new repository from the template: an ordered pipeline of named
//! steps over a `CommandRunner`.

use crate::configure::{Configurator, MissingPolicy, TokenMap};
use crate::error::{PytError, Result};
use crate::names;
use crate::paths::{GITHUB_WEB, TEMPLATE_REPO};
use crate::runner::{gh_api, gh_authenticated, CommandRunner, Invocation};
use crate::settings::{ProjectSettings, Settings};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// RepoSpec
// ---------------------------------------------------------------------------

/// What to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSpec {
    pub owner: String,
    pub name: String,
    pub description: String,
    pub private: bool,
    pub package_name: String,
    pub pypi_name: String,
    pub author_name: String,
    pub author_email: String,
    /// `owner/repo` of the template to generate from.
    pub template_repo: String,
}

impl RepoSpec {
    /// A spec for `owner/name` with names derived from the repository name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            owner: owner.into(),
            package_name: names::normalize_package_name(&name),
            pypi_name: names::normalize_pypi_name(&name),
            name,
            description: String::new(),
            private: false,
            author_name: String::new(),
            author_email: String::new(),
            template_repo: TEMPLATE_REPO.to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(PytError::Config("repository owner is required".into()));
        }
        if self.name.trim().is_empty() || self.name.contains('/') {
            return Err(PytError::Config(format!(
                "invalid repository name '{}'",
                self.name
            )));
        }
        names::validate_package_name(&self.package_name)?;
        names::validate_pypi_name(&self.pypi_name)?;
        names::validate_email(&self.author_email)?;
        Ok(())
    }

    pub fn project_settings(&self) -> ProjectSettings {
        ProjectSettings {
            project_name: self.name.clone(),
            package_name: self.package_name.clone(),
            pypi_name: self.pypi_name.clone(),
            description: self.description.clone(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
            github_user: self.owner.clone(),
            github_repo: self.name.clone(),
        }
    }
}

pub struct BootstrapContext<'a> {
    pub spec: &'a RepoSpec,
    pub runner: &'a dyn CommandRunner,
    /// Directory the repository is cloned into.
    pub workdir: PathBuf,
    /// Pause after creation and between clone attempts; GitHub needs a moment
    /// before a generated repository can be cloned.
    pub settle: Duration,
}

impl BootstrapContext<'_> {
    pub fn repo_dir(&self) -> PathBuf {
        self.workdir.join(&self.spec.name)
    }
}

pub const SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const CLONE_ATTEMPTS: u32 = 3;

/// Repository fields that GitHub reports but will not accept in a PATCH, or
/// that must not follow the template (visibility, template flag, branch).
const READ_ONLY_REPO_FIELDS: &[&str] = &[
    "id",
    "node_id",
    "name",
    "full_name",
    "owner",
    "organization",
    "template_repository",
    "created_at",
    "updated_at",
    "pushed_at",
    "forks",
    "forks_count",
    "open_issues",
    "open_issues_count",
    "size",
    "stargazers_count",
    "watchers",
    "watchers_count",
    "subscribers_count",
    "network_count",
    "fork",
    "language",
    "license",
    "permissions",
    "disabled",
    "default_branch",
    "private",
    "visibility",
    "is_template",
    "use_squash_pr_title_as_default",
];

fn is_writable_field(key: &str) -> bool {
    !(key == "url" || key.ends_with("_url") || READ_ONLY_REPO_FIELDS.contains(&key))
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A fn-pointer step. `run` returns a one-line summary of what it did.
pub struct Step {
    pub id: &'static str,
    pub description: &'static str,
    /// Required steps abort the pipeline on failure; optional ones warn.
    pub required: bool,
    pub run: fn(&BootstrapContext) -> Result<String>,
}

pub fn default_steps() -> Vec<Step> {
    vec![
        Step {
            id: "check-requirements",
            description: "Check that git and an authenticated gh are available",
            required: true,
            run: check_requirements,
        },
        Step {
            id: "create-repo",
            description: "Create the repository from the template",
            required: true,
            run: create_repo,
        },
        Step {
            id: "repo-settings",
            description: "Copy writable repository and security settings",
            required: false,
            run: configure_repo_settings,
        },
        Step {
            id: "rulesets",
            description: "Replicate branch-protection rulesets",
            required: false,
            run: replicate_rulesets,
        },
        Step {
            id: "labels",
            description: "Replicate issue labels",
            required: false,
            run: replicate_labels,
        },
        Step {
            id: "pages",
            description: "Enable GitHub Pages from gh-pages",
            required: false,
            run: enable_pages,
        },
        Step {
            id: "codeql",
            description: "Replicate the CodeQL default setup",
            required: false,
            run: configure_codeql,
        },
        Step {
            id: "clone",
            description: "Clone the new repository",
            required: true,
            run: clone_repo,
        },
        Step {
            id: "configure",
            description: "Replace template placeholders",
            required: true,
            run: configure_placeholders,
        },
        Step {
            id: "commit-push",
            description: "Commit and push the configured project",
            required: true,
            run: commit_and_push,
        },
        Step {
            id: "dev-environment",
            description: "Install dependencies and pre-commit hooks",
            required: false,
            run: setup_dev_environment,
        },
    ]
}

fn check_requirements(ctx: &BootstrapContext) -> Result<String> {
    for tool in ["git", "gh"] {
        if !ctx.runner.exists(tool) {
            return Err(PytError::ToolMissing(tool.to_string()));
        }
    }
    if !gh_authenticated(ctx.runner) {
        return Err(PytError::Config(
            "GitHub CLI is not authenticated; run `gh auth login`".into(),
        ));
    }
    Ok("git and gh available, gh authenticated".into())
}

fn create_repo(ctx: &BootstrapContext) -> Result<String> {
    let spec = ctx.spec;
    let body = json!({
        "owner": spec.owner,
        "name": spec.name,
        "description": spec.description,
        "private": spec.private,
        "include_all_branches": false,
    });
    gh_api(
        ctx.runner,
        "POST",
        &format!("repos/{}/generate", spec.template_repo),
        Some(&body),
    )?;
    std::thread::sleep(ctx.settle);
    Ok(format!("created {GITHUB_WEB}/{}", spec.full_name()))
}

fn configure_repo_settings(ctx: &BootstrapContext) -> Result<String> {
    let spec = ctx.spec;
    let template = gh_api(ctx.runner, "GET", &format!("repos/{}", spec.template_repo), None)?;
    let fields = template.as_object().ok_or_else(|| {
        PytError::Config(format!("no settings returned for {}", spec.template_repo))
    })?;

    let mut body: Map<String, Value> = fields
        .iter()
        .filter(|(key, value)| !value.is_null() && is_writable_field(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    body.insert("description".into(), json!(spec.description));

    // allow_forking only applies to organization repositories.
    let owner = gh_api(ctx.runner, "GET", &format!("users/{}", spec.owner), None)?;
    if owner["type"] != "Organization" {
        body.remove("allow_forking");
    }
    let security = body.remove("security_and_analysis");

    let endpoint = format!("repos/{}", spec.full_name());
    gh_api(ctx.runner, "PATCH", &endpoint, Some(&Value::Object(body.clone())))?;

    let enabled: Map<String, Value> = security
        .as_ref()
        .and_then(Value::as_object)
        .map(|features| {
            features
                .iter()
                .filter(|(_, v)| v["status"] == "enabled")
                .map(|(k, _)| (k.clone(), json!({ "status": "enabled" })))
                .collect()
        })
        .unwrap_or_default();
    if enabled.is_empty() {
        return Ok(format!("{} settings copied", body.len()));
    }

    // Private repositories without Advanced Security reject these.
    let security_detail = match gh_api(
        ctx.runner,
        "PATCH",
        &endpoint,
        Some(&json!({ "security_and_analysis": enabled })),
    ) {
        Ok(_) => format!("{} security features enabled", enabled.len()),
        Err(e) => {
            tracing::warn!(error = %e, "security settings not applied");
            "security features not applied".to_string()
        }
    };
    Ok(format!("{} settings copied, {security_detail}", body.len()))
}

fn replicate_rulesets(ctx: &BootstrapContext) -> Result<String> {
    let template = &ctx.spec.template_repo;
    let listed = gh_api(ctx.runner, "GET", &format!("repos/{template}/rulesets"), None)?;
    let ids: Vec<i64> = listed
        .as_array()
        .map(|a| a.iter().filter_map(|r| r["id"].as_i64()).collect())
        .unwrap_or_default();

    for id in &ids {
        let full = gh_api(ctx.runner, "GET", &format!("repos/{template}/rulesets/{id}"), None)?;
        let body = json!({
            "name": full["name"],
            "target": full["target"],
            "enforcement": full["enforcement"],
            "bypass_actors": full.get("bypass_actors").cloned().unwrap_or_else(|| json!([])),
            "conditions": full.get("conditions").cloned().unwrap_or_else(|| json!({})),
            "rules": full.get("rules").cloned().unwrap_or_else(|| json!([])),
        });
        gh_api(
            ctx.runner,
            "POST",
            &format!("repos/{}/rulesets", ctx.spec.full_name()),
            Some(&body),
        )?;
    }
    Ok(format!("{} rulesets", ids.len()))
}

fn replicate_labels(ctx: &BootstrapContext) -> Result<String> {
    let listed = gh_api(
        ctx.runner,
        "GET",
        &format!("repos/{}/labels?per_page=100", ctx.spec.template_repo),
        None,
    )?;
    let labels = listed.as_array().cloned().unwrap_or_default();

    let mut created = 0;
    for label in &labels {
        let body = json!({
            "name": label["name"],
            "color": label["color"],
            "description": label.get("description").and_then(Value::as_str).unwrap_or_default(),
        });
        // An existing label is not a failure.
        match gh_api(
            ctx.runner,
            "POST",
            &format!("repos/{}/labels", ctx.spec.full_name()),
            Some(&body),
        ) {
            Ok(_) => created += 1,
            Err(e) => tracing::debug!(label = %label["name"], error = %e, "label not created"),
        }
    }
    Ok(format!("{created} of {} labels", labels.len()))
}

fn enable_pages(ctx: &BootstrapContext) -> Result<String> {
    let body = json!({ "source": { "branch": "gh-pages", "path": "/" } });
    gh_api(
        ctx.runner,
        "POST",
        &format!("repos/{}/pages", ctx.spec.full_name()),
        Some(&body),
    )
    .map_err(|e| {
        PytError::Config(format!(
            "{e}; pages are enabled by the first docs deployment once gh-pages exists"
        ))
    })?;
    Ok("pages enabled from gh-pages".into())
}

fn configure_codeql(ctx: &BootstrapContext) -> Result<String> {
    let setup = gh_api(
        ctx.runner,
        "GET",
        &format!("repos/{}/code-scanning/default-setup", ctx.spec.template_repo),
        None,
    )?;
    if setup["state"] != "configured" {
        return Ok("not configured in the template, skipped".into());
    }

    let suite = setup["query_suite"].as_str().unwrap_or("default");
    let mut body = json!({ "state": "configured", "query_suite": suite });
    if let Some(languages) = setup["languages"].as_array().filter(|l| !l.is_empty()) {
        body["languages"] = Value::Array(languages.clone());
    }
    gh_api(
        ctx.runner,
        "PATCH",
        &format!("repos/{}/code-scanning/default-setup", ctx.spec.full_name()),
        Some(&body),
    )?;
    Ok(format!("{suite} query suite"))
}

/// `gh repo clone`, retried while the generated repository settles.
fn clone_repo(ctx: &BootstrapContext) -> Result<String> {
    let dir = ctx.repo_dir();
    if dir.exists() {
        return Err(PytError::Config(format!(
            "{} already exists",
            dir.display()
        )));
    }
    let clone = Invocation::new(
        "gh",
        ["repo", "clone", ctx.spec.full_name().as_str(), ctx.spec.name.as_str()],
    )
    .cwd(&ctx.workdir);

    let mut attempt = 1;
    loop {
        match ctx.runner.check(&clone) {
            Ok(_) => return Ok(format!("cloned into {}", dir.display())),
            Err(e) if attempt < CLONE_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "clone failed, retrying");
                if dir.exists() {
                    std::fs::remove_dir_all(&dir)?;
                }
                std::thread::sleep(ctx.settle);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn configure_placeholders(ctx: &BootstrapContext) -> Result<String> {
    let dir = ctx.repo_dir();
    let project = ctx.spec.project_settings();
    let tokens = TokenMap::for_project(&project)?;
    let report = Configurator::for_template(&dir, tokens, &project.package_name)
        .missing_policy(MissingPolicy::Skip)
        .run(false)?;

    Settings {
        project,
        template: None,
    }
    .save(&dir)?;
    Ok(format!("{} files updated", report.updated.len()))
}

fn commit_and_push(ctx: &BootstrapContext) -> Result<String> {
    let dir = ctx.repo_dir();
    let spec = ctx.spec;
    let message = format!(
        "chore: configure project from template\n\n- Set project name to {}\n- Configure package as {}\n- Set author to {}",
        spec.name, spec.package_name, spec.author_name
    );
    // The fresh repository is on main; commit hooks would refuse.
    let commands = [
        Invocation::new("git", ["add", "."]),
        Invocation::new("git", ["commit", "-m", message.as_str(), "--no-verify"]),
        Invocation::new("git", ["push"]),
    ];
    for cmd in commands {
        ctx.runner.check(&cmd.cwd(&dir))?;
    }
    Ok("changes committed and pushed".into())
}

fn setup_dev_environment(ctx: &BootstrapContext) -> Result<String> {
    if !ctx.runner.exists("uv") {
        return Err(PytError::ToolMissing("uv".into()));
    }
    let dir = ctx.repo_dir();
    ctx.runner
        .check(&Invocation::new("uv", ["sync", "--all-extras"]).cwd(&dir))?;
    ctx.runner
        .check(&Invocation::new("uv", ["run", "pre-commit", "install"]).cwd(&dir))?;
    Ok("dependencies and pre-commit hooks installed".into())
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub id: String,
    pub description: String,
    pub required: bool,
    pub status: StepStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub repo: String,
    pub dry_run: bool,
    pub steps: Vec<StepRecord>,
}

pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn standard() -> Self {
        Self::new(default_steps())
    }

    /// What `run` would do, without running anything.
    pub fn plan(&self, spec: &RepoSpec) -> BootstrapReport {
        BootstrapReport {
            repo: spec.full_name(),
            dry_run: true,
            steps: self
                .steps
                .iter()
                .map(|s| StepRecord {
                    id: s.id.to_string(),
                    description: s.description.to_string(),
                    required: s.required,
                    status: StepStatus::Planned,
                    detail: String::new(),
                })
                .collect(),
        }
    }

    /// Run every step in order. The first failing required step aborts with
    /// `StepFailed`; optional failures are recorded and the run continues.
    pub fn run(&self, ctx: &BootstrapContext) -> Result<BootstrapReport> {
        ctx.spec.validate()?;
        let mut report = BootstrapReport {
            repo: ctx.spec.full_name(),
            dry_run: false,
            steps: Vec::with_capacity(self.steps.len()),
        };

        for step in &self.steps {
            tracing::info!(step = step.id, "{}", step.description);
            let (status, detail) = match (step.run)(ctx) {
                Ok(detail) => (StepStatus::Done, detail),
                Err(e) if step.required => {
                    return Err(PytError::StepFailed {
                        step: step.id.to_string(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(step = step.id, error = %e, "optional step failed, continuing");
                    (StepStatus::Failed, e.to_string())
                }
            };
            report.steps.push(StepRecord {
                id: step.id.to_string(),
                description: step.description.to_string(),
                required: step.required,
                status,
                detail,
            });
        }
        Ok(report)
    }
}
