use crate::output::{print_json, print_list};
use anyhow::Context;
use clap::Args;
use pyt_core::fetch::Revision;
use pyt_core::io;
use pyt_core::migrate::{backup_label, migrate, MigrationReport};
use pyt_core::paths::{self, TEMPLATE_REPO};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct MigrateArgs {
    /// Repository to migrate (default: current directory)
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Extracted template directory to copy from
    #[arg(long, conflicts_with_all = ["download", "archive_url"])]
    pub template: Option<PathBuf>,

    /// Download the latest template first
    #[arg(long)]
    pub download: bool,

    /// Download the template from this archive URL (or local archive path)
    #[arg(long)]
    pub archive_url: Option<String>,

    /// Template repository as owner/name
    #[arg(long, env = "PYT_TEMPLATE_REPO", default_value = TEMPLATE_REPO)]
    pub template_repo: String,

    /// Show what would be copied and backed up
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: MigrateArgs, json: bool) -> anyhow::Result<()> {
    let target = match &args.target {
        Some(t) => t.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    if !target.is_dir() {
        anyhow::bail!("target directory does not exist: {}", target.display());
    }

    let mut staging: Option<tempfile::TempDir> = None;
    let template = match (&args.template, &args.archive_url, args.download) {
        (Some(dir), _, _) => dir.clone(),
        (None, url, download) if url.is_some() || download => {
            let dir = download_dir(&target, args.dry_run)?;
            let source = super::template_source(&args.template_repo)?;
            let root = match url {
                Some(url) => source.fetch_url(url, dir.path()),
                None => source.fetch(&Revision::Latest, dir.path()),
            }
            .context("failed to download template")?;
            staging = Some(dir);
            root
        }
        _ => anyhow::bail!("pass --template <dir>, --download or --archive-url <url>"),
    };

    let report = migrate(&template, &target, &backup_label(), args.dry_run)
        .context("migration failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    drop(staging);
    Ok(())
}

/// Downloads land in the target's tmp/, except on a dry run, which must
/// leave the target untouched.
fn download_dir(target: &Path, dry_run: bool) -> anyhow::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("template-");
    let dir = if dry_run {
        builder.tempdir()
    } else {
        let tmp = paths::tmp_dir(target);
        io::ensure_dir(&tmp)?;
        builder.tempdir_in(&tmp)
    };
    dir.context("failed to create download directory")
}

fn print_report(report: &MigrationReport) {
    if report.dry_run {
        println!("Dry run: nothing was written.");
    }
    println!("Template: {}", report.template.display());
    println!("Target:   {}", report.target.display());
    print_list("Copied", &report.copied);
    if !report.backed_up.is_empty() {
        println!("Backed up to {}:", report.backup_root.display());
        for b in &report.backed_up {
            println!("  - {}", b.path);
        }
    }
    print_list("Not in template", &report.skipped);
    println!();
    println!("Review the changes, then run `pyt configure` in the target.");
}
