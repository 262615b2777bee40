pub mod bootstrap;
pub mod check;
pub mod configure;
pub mod hook;
pub mod migrate;
pub mod status;
pub mod sync;

use anyhow::Context;
use pyt_core::fetch::TemplateSource;
use pyt_core::paths::{GITHUB_API, GITHUB_WEB};

/// Template source for `repo`; `PYT_GITHUB_WEB` / `PYT_GITHUB_API` point at
/// another host.
pub fn template_source(repo: &str) -> anyhow::Result<TemplateSource> {
    let web = std::env::var("PYT_GITHUB_WEB").unwrap_or_else(|_| GITHUB_WEB.to_string());
    let api = std::env::var("PYT_GITHUB_API").unwrap_or_else(|_| GITHUB_API.to_string());
    TemplateSource::with_endpoints(repo, web, api).context("failed to set up template source")
}
