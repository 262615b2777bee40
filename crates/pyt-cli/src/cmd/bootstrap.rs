use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use pyt_core::bootstrap::{
    BootstrapContext, BootstrapReport, Pipeline, RepoSpec, StepStatus, SETTLE_DELAY,
};
use pyt_core::paths::TEMPLATE_REPO;
use pyt_core::runner::{gh_api, git_config, CommandRunner, SystemRunner};
use std::path::PathBuf;

#[derive(Args)]
pub struct BootstrapArgs {
    /// Repository name
    #[arg(long)]
    pub name: String,

    /// Owner (user or organization); default: the authenticated gh user
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub private: bool,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Python package name (default: derived from the repository name)
    #[arg(long)]
    pub package_name: Option<String>,

    /// PyPI name (default: derived from the repository name)
    #[arg(long)]
    pub pypi_name: Option<String>,

    /// Default: git config user.name
    #[arg(long)]
    pub author_name: Option<String>,

    /// Default: git config user.email
    #[arg(long)]
    pub author_email: Option<String>,

    /// Template repository as owner/name
    #[arg(long, env = "PYT_TEMPLATE_REPO", default_value = TEMPLATE_REPO)]
    pub template_repo: String,

    /// Directory to clone into (default: current directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Print the steps without running them
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: BootstrapArgs, json: bool) -> anyhow::Result<()> {
    let runner = SystemRunner;
    let spec = build_spec(&runner, &args)?;
    let pipeline = Pipeline::standard();

    let report = if args.dry_run {
        spec.validate()?;
        pipeline.plan(&spec)
    } else {
        let workdir = match args.workdir {
            Some(dir) => dir,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let ctx = BootstrapContext {
            spec: &spec,
            runner: &runner,
            workdir,
            settle: SETTLE_DELAY,
        };
        pipeline.run(&ctx).context("bootstrap failed")?
    };

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn build_spec(runner: &dyn CommandRunner, args: &BootstrapArgs) -> anyhow::Result<RepoSpec> {
    let owner = match &args.owner {
        Some(owner) => owner.clone(),
        None if args.dry_run => "<gh user>".to_string(),
        None => gh_api(runner, "GET", "user", None)
            .context("cannot determine the GitHub user; pass --owner")?["login"]
            .as_str()
            .map(str::to_string)
            .context("gh api user returned no login; pass --owner")?,
    };

    let mut spec = RepoSpec::new(owner, args.name.trim());
    spec.description = args.description.clone();
    spec.private = args.private;
    spec.template_repo = args.template_repo.clone();
    if let Some(p) = &args.package_name {
        spec.package_name = p.clone();
    }
    if let Some(p) = &args.pypi_name {
        spec.pypi_name = p.clone();
    }
    spec.author_name = args
        .author_name
        .clone()
        .or_else(|| git_config(runner, "user.name"))
        .unwrap_or_default();
    spec.author_email = args
        .author_email
        .clone()
        .or_else(|| git_config(runner, "user.email"))
        .unwrap_or_default();
    Ok(spec)
}

fn print_report(report: &BootstrapReport) {
    if report.dry_run {
        println!("Plan for {} (dry run):", report.repo);
    } else {
        println!("Bootstrapped {}:", report.repo);
    }
    let rows = report
        .steps
        .iter()
        .map(|s| {
            let status = match s.status {
                StepStatus::Planned => "planned",
                StepStatus::Done => "done",
                StepStatus::Failed => "failed",
            };
            let kind = if s.required { "required" } else { "optional" };
            let detail = if s.detail.is_empty() {
                s.description.clone()
            } else {
                s.detail.clone()
            };
            vec![s.id.clone(), kind.to_string(), status.to_string(), detail]
        })
        .collect();
    print_table(&["STEP", "KIND", "STATUS", "DETAIL"], rows);
}
