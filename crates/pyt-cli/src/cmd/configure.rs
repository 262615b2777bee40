use crate::output::{print_json, print_list};
use anyhow::Context;
use clap::Args;
use pyt_core::configure::{ConfigureReport, Configurator, MissingPolicy, TokenMap};
use pyt_core::names;
use pyt_core::runner::{git_config, SystemRunner};
use pyt_core::settings::{ProjectSettings, Settings};
use std::path::Path;

#[derive(Args)]
pub struct ConfigureArgs {
    /// Human-readable project name
    #[arg(long)]
    pub project_name: Option<String>,

    /// Python package (import) name
    #[arg(long)]
    pub package_name: Option<String>,

    /// Distribution name on PyPI
    #[arg(long)]
    pub pypi_name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub author_name: Option<String>,

    #[arg(long)]
    pub author_email: Option<String>,

    /// GitHub user or organization
    #[arg(long)]
    pub github_user: Option<String>,

    #[arg(long)]
    pub github_repo: Option<String>,

    /// Only rewrite these files (relative to the root)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<String>,

    /// Warn about missing target files instead of failing
    #[arg(long)]
    pub skip_missing: bool,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Reconfigure a project that is already configured
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(root: &Path, args: ConfigureArgs, json: bool) -> anyhow::Result<()> {
    let mut settings = Settings::load(root).context("failed to load settings")?;

    if settings.project.is_configured() && !args.yes && args.files.is_empty() {
        anyhow::bail!(
            "project '{}' is already configured; pass --yes to configure again",
            settings.project.project_name
        );
    }

    apply_overrides(&mut settings.project, &args);
    clear_placeholders(&mut settings.project);
    derive_defaults(&mut settings.project);

    let missing = missing_fields(&settings.project);
    if !missing.is_empty() {
        let flags: Vec<String> = missing
            .iter()
            .map(|f| format!("--{}", f.replace('_', "-")))
            .collect();
        anyhow::bail!("no value for {}; pass {}", missing.join(", "), flags.join(" "));
    }

    let project = &settings.project;
    let tokens = TokenMap::for_project(project)?;
    let configurator = if args.files.is_empty() {
        Configurator::for_template(root, tokens, &project.package_name)
    } else {
        Configurator::new(root, tokens).targets(args.files.iter().cloned())
    };
    let policy = if args.skip_missing {
        MissingPolicy::Skip
    } else {
        MissingPolicy::Abort
    };

    let report = configurator
        .missing_policy(policy)
        .run(args.dry_run)
        .context("configuration failed")?;

    if !args.dry_run {
        settings.save(root).context("failed to save settings")?;
    }

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn apply_overrides(project: &mut ProjectSettings, args: &ConfigureArgs) {
    let overrides = [
        (&mut project.project_name, &args.project_name),
        (&mut project.package_name, &args.package_name),
        (&mut project.pypi_name, &args.pypi_name),
        (&mut project.description, &args.description),
        (&mut project.author_name, &args.author_name),
        (&mut project.author_email, &args.author_email),
        (&mut project.github_user, &args.github_user),
        (&mut project.github_repo, &args.github_repo),
    ];
    for (field, value) in overrides {
        if let Some(v) = value {
            *field = v.trim().to_string();
        }
    }
}

/// Blank out fields still holding the template's own values so they get
/// derived instead of written back verbatim.
fn clear_placeholders(project: &mut ProjectSettings) {
    for field in project.placeholder_fields() {
        let slot = match field {
            "project_name" => &mut project.project_name,
            "package_name" => &mut project.package_name,
            "pypi_name" => &mut project.pypi_name,
            "description" => &mut project.description,
            "author_name" => &mut project.author_name,
            "author_email" => &mut project.author_email,
            "github_user" => &mut project.github_user,
            "github_repo" => &mut project.github_repo,
            _ => continue,
        };
        slot.clear();
    }
    // A template pyproject.toml names the project after its package.
    if ["package_name", "package-name"].contains(&project.project_name.as_str()) {
        project.project_name.clear();
    }
}

fn missing_fields(project: &ProjectSettings) -> Vec<&'static str> {
    [
        ("package_name", &project.package_name),
        ("author_name", &project.author_name),
        ("author_email", &project.author_email),
        ("github_user", &project.github_user),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(f, _)| f)
    .collect()
}

/// Fill blanks from each other and from git config.
fn derive_defaults(project: &mut ProjectSettings) {
    let package_source = if project.package_name.is_empty() {
        &project.project_name
    } else {
        &project.package_name
    };
    project.package_name = names::normalize_package_name(package_source);
    if project.pypi_name.is_empty() {
        project.pypi_name = names::normalize_pypi_name(&project.package_name);
    }
    if project.project_name.is_empty() {
        project.project_name = project.package_name.clone();
    }

    let runner = SystemRunner;
    let from_git = [
        (&mut project.author_name, "user.name"),
        (&mut project.author_email, "user.email"),
        (&mut project.github_user, "github.user"),
    ];
    for (field, key) in from_git {
        if field.is_empty() {
            if let Some(value) = git_config(&runner, key) {
                *field = value;
            }
        }
    }
    if project.github_repo.is_empty() {
        project.github_repo = project.pypi_name.clone();
    }
}

fn print_report(report: &ConfigureReport) {
    if report.dry_run {
        println!("Dry run: nothing was written.");
    }
    print_list("Updated", &report.updated);
    print_list("Skipped (binary)", &report.skipped_binary);
    print_list("Skipped (not found)", &report.skipped_missing);
    print_list("Removed", &report.removed);
    if let Some((from, to)) = &report.renamed {
        println!("Renamed: {from} -> {to}");
    }
    println!(
        "{} updated, {} unchanged.",
        report.updated.len(),
        report.unchanged.len()
    );
}
