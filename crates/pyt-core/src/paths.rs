use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CONFIG_DIR: &str = ".config/pyproject_template";
pub const SETTINGS_FILE: &str = ".config/pyproject_template/settings.toml";
pub const PYPROJECT_FILE: &str = "pyproject.toml";
pub const TMP_DIR: &str = "tmp";
pub const GIT_DIR: &str = ".git";

/// Source directory renamed to the package name during configuration.
pub const PACKAGE_SOURCE_DIR: &str = "src/package_name";

/// Upstream template repository on GitHub.
pub const TEMPLATE_REPO: &str = "endavis/pyproject-template";
pub const GITHUB_WEB: &str = "https://github.com";
pub const GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_dir(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR)
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

pub fn pyproject_path(root: &Path) -> PathBuf {
    root.join(PYPROJECT_FILE)
}

pub fn tmp_dir(root: &Path) -> PathBuf {
    root.join(TMP_DIR)
}

/// Backup directory used by the migrator for a given timestamp label.
pub fn migration_backup_dir(root: &Path, label: &str) -> PathBuf {
    tmp_dir(root).join(format!("template-migration-backup-{label}"))
}

/// Render a relative path with forward slashes regardless of platform.
pub fn to_slash(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
