use pyt_core::paths::{CONFIG_DIR, GIT_DIR, PYPROJECT_FILE};
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `PYT_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.config/pyproject_template/`
/// 3. Walk upward from `cwd` looking for `pyproject.toml`
/// 4. Walk upward from `cwd` looking for `.git/`
/// 5. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root(&cwd)
}

fn find_root(start: &Path) -> PathBuf {
    let markers: [(&str, fn(&Path) -> bool); 3] = [
        (CONFIG_DIR, Path::is_dir),
        (PYPROJECT_FILE, Path::is_file),
        (GIT_DIR, Path::exists),
    ];
    for (marker, present) in markers {
        if let Some(dir) = start.ancestors().find(|dir| present(&dir.join(marker))) {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}
