use crate::output::{print_json, print_list};
use anyhow::Context;
use pyt_core::paths::TEMPLATE_REPO;
use pyt_core::runner::SystemRunner;
use pyt_core::status::gather;
use std::path::Path;

pub fn run(root: &Path, offline: bool, json: bool) -> anyhow::Result<()> {
    let source = if offline {
        None
    } else {
        Some(super::template_source(TEMPLATE_REPO)?)
    };
    let report = gather(root, &SystemRunner, source.as_ref()).context("failed to gather status")?;

    if json {
        return print_json(&report);
    }

    let p = &report.project;
    println!("Project root: {}", report.root.display());
    println!(
        "Repository:   git={} pyproject={} settings={}",
        yes_no(report.context.has_git),
        yes_no(report.context.has_pyproject),
        yes_no(report.context.has_settings)
    );
    println!();
    println!("Project:      {}", or_unset(&p.project_name));
    println!("Package:      {}", or_unset(&p.package_name));
    println!("PyPI name:    {}", or_unset(&p.pypi_name));
    println!("Author:       {} <{}>", or_unset(&p.author_name), or_unset(&p.author_email));
    println!("GitHub:       {}/{}", or_unset(&p.github_user), or_unset(&p.github_repo));
    println!("Configured:   {}", yes_no(report.configured));
    print_list("Placeholder values", &report.placeholders);
    println!();

    match &report.template {
        Some(t) if t.is_synced() => println!("Template sync: {} ({})", t.commit, t.commit_date),
        _ => println!("Template sync: never"),
    }
    if let Some(latest) = &report.latest {
        println!("Template head: {} ({})", latest.sha, latest.date);
    } else if offline {
        println!("Template head: unknown (offline)");
    }

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &report.warnings {
            if w.suggestion.is_empty() {
                println!("  - {}", w.message);
            } else {
                println!("  - {} ({})", w.message, w.suggestion);
            }
        }
    }

    println!();
    match report.recommendation {
        Some(r) => println!("Next: {} -> `{}`", r.message(), r.command()),
        None => println!("Next: nothing to do, project is up to date."),
    }
    Ok(())
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn or_unset(s: &str) -> &str {
    if s.is_empty() {
        "(unset)"
    } else {
        s
    }
}
