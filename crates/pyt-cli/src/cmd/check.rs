use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use pyt_core::diff::{classify, DiffReport, SkipPatterns};
use pyt_core::fetch::{CommitInfo, CommitSummary, Revision};
use pyt_core::paths::{self, PACKAGE_SOURCE_DIR, TEMPLATE_REPO};
use pyt_core::settings::{Settings, TemplateState};
use pyt_core::{io, sync_state};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct CheckArgs {
    /// Compare against an already extracted template directory
    #[arg(long, conflicts_with_all = ["archive_url", "template_version"])]
    pub template: Option<PathBuf>,

    /// Download the template from this archive URL (or local archive path)
    #[arg(long, conflicts_with = "template_version")]
    pub archive_url: Option<String>,

    /// Template release tag (default: latest on the default branch)
    #[arg(long)]
    pub template_version: Option<String>,

    /// Template repository as owner/name
    #[arg(long, env = "PYT_TEMPLATE_REPO", default_value = TEMPLATE_REPO)]
    pub template_repo: String,

    /// Ignore CHANGELOG.md
    #[arg(long)]
    pub skip_changelog: bool,

    /// Keep the downloaded template under tmp/
    #[arg(long)]
    pub keep_template: bool,

    /// Record the template head as reviewed afterwards
    #[arg(long)]
    pub mark_reviewed: bool,

    /// Do not contact the template repository for commit history
    #[arg(long)]
    pub offline: bool,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    template: &'a Path,
    #[serde(flatten)]
    report: &'a DiffReport,
    last_sync: Option<&'a TemplateState>,
    new_commits: &'a [CommitSummary],
    marked: Option<&'a TemplateState>,
}

pub fn run(root: &Path, args: CheckArgs, json: bool) -> anyhow::Result<()> {
    if args.mark_reviewed && args.offline {
        anyhow::bail!("--mark-reviewed needs the template head; drop --offline");
    }
    let settings = Settings::load(root).context("failed to load settings")?;
    let source = super::template_source(&args.template_repo)?;

    // Held until the end so a downloaded template is cleaned up on drop.
    let mut staging: Option<tempfile::TempDir> = None;
    let template_root = match &args.template {
        Some(dir) => dir.clone(),
        None => {
            let tmp = paths::tmp_dir(root);
            io::ensure_dir(&tmp)?;
            let dir = tempfile::Builder::new()
                .prefix("template-")
                .tempdir_in(&tmp)
                .context("failed to create download directory")?;
            let extracted = match &args.archive_url {
                Some(url) => source.fetch_url(url, dir.path()),
                None => source.fetch(
                    &Revision::from_tag(args.template_version.as_deref()),
                    dir.path(),
                ),
            }
            .context("failed to download template")?;
            if args.keep_template {
                let kept = dir.keep();
                tracing::info!(dir = %kept.display(), "keeping downloaded template");
            } else {
                staging = Some(dir);
            }
            extracted
        }
    };

    let mut skip = SkipPatterns::defaults().with(PACKAGE_SOURCE_DIR)?;
    if !settings.project.package_name.is_empty() {
        skip = skip.with(&format!("src/{}", settings.project.package_name))?;
    }
    if args.skip_changelog {
        skip = skip.with("CHANGELOG.md")?;
    }
    let report = classify(root, &template_root, &skip).context("comparison failed")?;

    let last_sync = settings.template.as_ref().filter(|t| t.is_synced());
    let mut new_commits = Vec::new();
    let mut latest: Option<CommitInfo> = None;
    if !args.offline {
        if let Some(state) = last_sync {
            match source.commits_since(&state.commit) {
                Ok(commits) => new_commits = commits,
                Err(e) => tracing::warn!(error = %e, "could not list template commits"),
            }
        }
        if args.mark_reviewed {
            latest = Some(
                source
                    .latest_commit()
                    .context("failed to look up the template head")?,
            );
        }
    }

    let marked = match &latest {
        Some(head) => {
            let state = TemplateState::new(&head.sha, &head.date);
            sync_state::write(root, &state).context("failed to write sync state")?;
            Some(state)
        }
        None => None,
    };

    if json {
        print_json(&CheckOutput {
            template: &template_root,
            report: &report,
            last_sync,
            new_commits: &new_commits,
            marked: marked.as_ref(),
        })?;
    } else {
        print_human(&template_root, &report, last_sync, &new_commits, args.offline);
        if let Some(state) = &marked {
            println!();
            println!("Marked template commit {} as reviewed.", state.commit);
        }
    }

    drop(staging);
    Ok(())
}

fn print_human(
    template: &Path,
    report: &DiffReport,
    last_sync: Option<&TemplateState>,
    new_commits: &[CommitSummary],
    offline: bool,
) {
    println!("Template: {}", template.display());
    match last_sync {
        Some(s) => println!("Last reviewed: {} ({})", s.commit, s.commit_date),
        None => println!("Last reviewed: never"),
    }
    println!();

    if report.is_clean() {
        println!("Project matches the template.");
    } else {
        let rows = report
            .entries()
            .into_iter()
            .map(|(change, path)| vec![change.to_string(), path.to_string()])
            .collect();
        print_table(&["CHANGE", "PATH"], rows);
        println!();
        println!(
            "{} modified, {} missing, {} extra.",
            report.modified.len(),
            report.missing.len(),
            report.extra.len()
        );
    }

    for e in &report.errors {
        eprintln!("warning: could not compare {}: {}", e.path, e.error);
    }

    if last_sync.is_some() && !offline {
        println!();
        if new_commits.is_empty() {
            println!("No template commits since the last review.");
        } else {
            println!("Template commits since the last review:");
            for c in new_commits {
                println!("  {}  {}  {}", c.sha, c.date, c.message);
            }
        }
    }
}
