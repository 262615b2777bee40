//! Copy template scaffolding into an existing project. Anything that would be
//! overwritten is first moved under `tmp/template-migration-backup-<label>/`.

use crate::error::{PytError, Result};
use crate::io::{copy_path, move_path};
use crate::paths::{migration_backup_dir, to_slash};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Template paths (files or directories) copied into the target.
pub const TEMPLATE_REL_PATHS: &[&str] = &[
    // Config and tooling
    "pyproject.toml",
    "dodo.py",
    "tools/pyproject_template/configure.py",
    ".envrc",
    ".envrc.local.example",
    ".pre-commit-config.yaml",
    ".python-version",
    "mkdocs.yml",
    ".editorconfig",
    ".gitignore",
    "src/package_name",
    // Docs
    "AGENTS.md",
    "CHANGELOG.md",
    "docs",
    "examples",
    // Automation and editor setup
    ".github",
    ".devcontainer",
    ".vscode",
    ".claude",
    ".codex",
    ".gemini",
    "tools",
    "tmp/.gitkeep",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub path: String,
    /// Relative to the target root.
    pub backup: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub template: PathBuf,
    pub target: PathBuf,
    pub backup_root: PathBuf,
    pub copied: Vec<String>,
    pub backed_up: Vec<BackupRecord>,
    /// Listed paths the template does not have.
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

/// Timestamp label for a backup directory, e.g. `20250115-103000`.
pub fn backup_label() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

pub fn migrate(
    template_root: &Path,
    target_root: &Path,
    label: &str,
    dry_run: bool,
) -> Result<MigrationReport> {
    migrate_paths(template_root, target_root, TEMPLATE_REL_PATHS, label, dry_run)
}

/// Copy `rel_paths` from `template_root` into `target_root`.
pub fn migrate_paths(
    template_root: &Path,
    target_root: &Path,
    rel_paths: &[&str],
    label: &str,
    dry_run: bool,
) -> Result<MigrationReport> {
    for root in [template_root, target_root] {
        if !root.is_dir() {
            return Err(PytError::RootNotFound(root.to_path_buf()));
        }
    }

    let backup_root = migration_backup_dir(target_root, label);
    let mut report = MigrationReport {
        template: template_root.to_path_buf(),
        target: target_root.to_path_buf(),
        backup_root: backup_root.clone(),
        copied: Vec::new(),
        backed_up: Vec::new(),
        skipped: Vec::new(),
        dry_run,
    };

    for rel in rel_paths {
        let src = template_root.join(rel);
        let dst = target_root.join(rel);
        if !src.exists() {
            tracing::debug!(path = %rel, "not in template, skipping");
            report.skipped.push(rel.to_string());
            continue;
        }

        if dst.exists() || dst.is_symlink() {
            let backup = backup_root.join(rel);
            if !dry_run {
                move_path(&dst, &backup)?;
            }
            let backup_rel = backup
                .strip_prefix(target_root)
                .map(to_slash)
                .unwrap_or_else(|_| backup.display().to_string());
            report.backed_up.push(BackupRecord {
                path: rel.to_string(),
                backup: backup_rel,
            });
        }

        if !dry_run {
            copy_path(&src, &dst)?;
        }
        report.copied.push(rel.to_string());
    }

    tracing::info!(
        copied = report.copied.len(),
        backed_up = report.backed_up.len(),
        dry_run,
        "migration finished"
    );
    Ok(report)
}
