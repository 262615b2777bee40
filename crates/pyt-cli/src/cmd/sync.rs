use crate::output::print_json;
use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;
use pyt_core::settings::TemplateState;
use pyt_core::sync_state;
use std::path::Path;

#[derive(Subcommand)]
pub enum SyncSubcommand {
    /// Show the last reviewed template commit
    Show,

    /// Record a template commit as reviewed
    Mark {
        /// Template commit sha
        commit: String,
        /// Commit date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: SyncSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SyncSubcommand::Show => show(root, json),
        SyncSubcommand::Mark { commit, date } => mark(root, &commit, date.as_deref(), json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let state = sync_state::read(root).context("failed to read sync state")?;
    if json {
        return print_json(&state);
    }
    match state {
        Some(s) if s.is_synced() => {
            println!("Last reviewed template commit: {}", s.commit);
            if !s.commit_date.is_empty() {
                println!("Commit date:                   {}", s.commit_date);
            }
        }
        _ => println!("Never synced with the template."),
    }
    Ok(())
}

fn mark(root: &Path, commit: &str, date: Option<&str>, json: bool) -> anyhow::Result<()> {
    let commit = commit.trim();
    if commit.is_empty() || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("'{commit}' is not a commit sha");
    }
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{d}', expected YYYY-MM-DD"))?,
        None => chrono::Local::now().date_naive(),
    };

    let state = TemplateState::new(commit, date.format("%Y-%m-%d").to_string());
    sync_state::write(root, &state).context("failed to write sync state")?;

    if json {
        print_json(&state)?;
    } else {
        println!("Marked template commit {} ({}) as reviewed.", state.commit, state.commit_date);
    }
    Ok(())
}
