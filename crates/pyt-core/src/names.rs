//! Name and identity validation for project values.

use crate::error::{PytError, Result};
use regex::Regex;
use std::sync::OnceLock;

static PACKAGE_RE: OnceLock<Regex> = OnceLock::new();
static PYPI_RE: OnceLock<Regex> = OnceLock::new();
static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn package_re() -> &'static Regex {
    PACKAGE_RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap())
}

fn pypi_re() -> &'static Regex {
    PYPI_RE.get_or_init(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap())
}

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
    })
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Turn arbitrary input into an importable Python package name.
pub fn normalize_package_name(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('_');
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Turn arbitrary input into a PyPI distribution name.
pub fn normalize_pypi_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn is_valid_package_name(name: &str) -> bool {
    package_re().is_match(name)
}

pub fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email)
}

pub fn validate_package_name(name: &str) -> Result<()> {
    if !is_valid_package_name(name) {
        return Err(PytError::InvalidPackageName(name.to_string()));
    }
    Ok(())
}

pub fn validate_pypi_name(name: &str) -> Result<()> {
    if !pypi_re().is_match(name) {
        return Err(PytError::InvalidPypiName(name.to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    if !is_valid_email(email) {
        return Err(PytError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GitHub URLs
// ---------------------------------------------------------------------------

/// Extract the host of an http(s) URL, without userinfo or port.
fn url_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

/// True only when the URL's host is github.com or one of its subdomains.
pub fn is_github_url(url: &str) -> bool {
    match url_host(url) {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            host == "github.com" || host.ends_with(".github.com")
        }
        None => false,
    }
}

/// Parse `(owner, repo)` out of an https or ssh GitHub URL.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let path = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else {
        if url_host(url)?.to_ascii_lowercase() != "github.com" {
            return None;
        }
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        rest.split_once('/')?.1
    };

    let mut segments = path.trim_end_matches('/').split('/');
    let owner = segments.next()?.trim();
    let repo = segments.next()?.trim();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
