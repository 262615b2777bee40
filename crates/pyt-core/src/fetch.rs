//! Retrieve the upstream template: archive download + extraction, and commit
//! metadata from the hosting API.

use crate::error::{PytError, Result};
use crate::io::ensure_dir;
use crate::paths::{DEFAULT_BRANCH, GITHUB_API, GITHUB_WEB};
use chrono::DateTime;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which template revision to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// Head of the default branch.
    Latest,
    Tag(String),
}

impl Revision {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(t) if !t.is_empty() && t != "latest" => Revision::Tag(t.to_string()),
            _ => Revision::Latest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.split(['?', '#']).next().unwrap_or(name);
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            Some(ArchiveKind::Zip)
        } else if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub date: String,
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    message: String,
    committer: Option<ApiSignature>,
}

#[derive(Deserialize)]
struct ApiSignature {
    #[serde(default)]
    date: String,
}

impl ApiCommit {
    fn date(&self) -> String {
        self.commit
            .committer
            .as_ref()
            .map(|c| short_date(&c.date))
            .unwrap_or_default()
    }
}

fn short_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => raw.chars().take(10).collect(),
    }
}

fn retrieval(url: &str, reason: impl std::fmt::Display) -> PytError {
    PytError::Retrieval {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn extraction(reason: impl std::fmt::Display) -> PytError {
    PytError::Extraction(reason.to_string())
}

// ---------------------------------------------------------------------------
// TemplateSource
// ---------------------------------------------------------------------------

/// A template repository on a GitHub-compatible host.
pub struct TemplateSource {
    repo: String,
    web_base: String,
    api_base: String,
    client: Client,
}

impl TemplateSource {
    pub fn new(repo: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(repo, GITHUB_WEB, GITHUB_API)
    }

    /// Point at a different host, e.g. an enterprise instance or a test server.
    pub fn with_endpoints(
        repo: impl Into<String>,
        web_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pyt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PytError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            repo: repo.into(),
            web_base: web_base.into().trim_end_matches('/').to_string(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn archive_url(&self, revision: &Revision) -> String {
        match revision {
            Revision::Latest => format!(
                "{}/{}/archive/refs/heads/{DEFAULT_BRANCH}.zip",
                self.web_base, self.repo
            ),
            Revision::Tag(tag) => format!(
                "{}/{}/archive/refs/tags/{tag}.zip",
                self.web_base, self.repo
            ),
        }
    }

    /// Download and extract `revision` under `dest`; returns the template root.
    pub fn fetch(&self, revision: &Revision, dest: &Path) -> Result<PathBuf> {
        self.fetch_url(&self.archive_url(revision), dest)
    }

    /// Download and extract an explicit archive URL (or local archive path).
    pub fn fetch_url(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        tracing::info!(url, dest = %dest.display(), "fetching template archive");
        let bytes = self.download(url)?;
        let kind = ArchiveKind::from_name(url)
            .or_else(|| ArchiveKind::sniff(&bytes))
            .ok_or_else(|| extraction(format!("unrecognized archive format: {url}")))?;
        extract_archive(&bytes, kind, dest)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            let path = url.strip_prefix("file://").unwrap_or(url);
            return std::fs::read(path).map_err(|e| retrieval(url, e));
        }
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| retrieval(url, e))?;
        let bytes = response.bytes().map_err(|e| retrieval(url, e))?;
        Ok(bytes.to_vec())
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<T>())
            .map_err(|e| retrieval(url, e))
    }

    /// Head commit of the template's default branch.
    pub fn latest_commit(&self) -> Result<CommitInfo> {
        let url = format!(
            "{}/repos/{}/commits/{DEFAULT_BRANCH}",
            self.api_base, self.repo
        );
        let commit: ApiCommit = self.get_json(&url)?;
        Ok(CommitInfo {
            date: commit.date(),
            sha: commit.sha,
        })
    }

    /// Commits on the default branch newer than `known_sha`, newest first.
    /// Either sha may be abbreviated.
    pub fn commits_since(&self, known_sha: &str) -> Result<Vec<CommitSummary>> {
        let url = format!(
            "{}/repos/{}/commits?sha={DEFAULT_BRANCH}&per_page=100",
            self.api_base, self.repo
        );
        let commits: Vec<ApiCommit> = self.get_json(&url)?;

        let mut newer = Vec::new();
        let mut found = false;
        for c in &commits {
            if !known_sha.is_empty()
                && (c.sha.starts_with(known_sha) || known_sha.starts_with(&c.sha))
            {
                found = true;
                break;
            }
            newer.push(CommitSummary {
                sha: c.sha.chars().take(12).collect(),
                message: c.commit.message.lines().next().unwrap_or_default().to_string(),
                date: c.date(),
            });
        }
        if !found {
            tracing::warn!(known_sha, "synced commit not found in recent template history");
        }
        Ok(newer)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract `bytes` into a fresh staging directory under `dest`.
///
/// The staging directory is removed if extraction fails. When the archive
/// holds a single top-level directory, that directory is returned.
pub fn extract_archive(bytes: &[u8], kind: ArchiveKind, dest: &Path) -> Result<PathBuf> {
    ensure_dir(dest)?;
    let staging = tempfile::Builder::new()
        .prefix("template-")
        .tempdir_in(dest)?;

    match kind {
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(extraction)?;
            archive.extract(staging.path()).map_err(extraction)?;
        }
        ArchiveKind::TarGz => {
            let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(bytes));
            archive.unpack(staging.path()).map_err(extraction)?;
        }
    }

    if std::fs::read_dir(staging.path())?.next().is_none() {
        return Err(extraction("archive is empty"));
    }

    let root = staging.keep();
    Ok(single_top_level_dir(&root).unwrap_or(root))
}

fn single_top_level_dir(root: &Path) -> Option<PathBuf> {
    let mut entries = std::fs::read_dir(root).ok()?;
    let first = entries.next()?.ok()?;
    if entries.next().is_some() {
        return None;
    }
    first.file_type().ok()?.is_dir().then(|| first.path())
}
