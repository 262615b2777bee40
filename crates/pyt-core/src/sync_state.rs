//! Read and write the last reviewed template revision.
//!
//! The record lives in the `[template]` table of the settings file. A write
//! replaces the whole table; no history is kept. A missing file or table
//! means the project has never been synced.

use crate::error::Result;
use crate::settings::{Settings, TemplateState};
use std::path::Path;

pub fn read(root: &Path) -> Result<Option<TemplateState>> {
    Ok(Settings::read_file(root)?.and_then(|s| s.template))
}

pub fn write(root: &Path, state: &TemplateState) -> Result<()> {
    let mut settings = Settings::read_file(root)?.unwrap_or_default();
    settings.template = Some(state.clone());
    settings.save(root)?;
    tracing::info!(commit = %state.commit, date = %state.commit_date, "recorded template sync state");
    Ok(())
}
