//! Project settings persisted in `.config/pyproject_template/settings.toml`.
//!
//! Layout:
//!   [project]   — values substituted into the template's placeholders
//!   [template]  — last reviewed upstream revision (see `sync_state`)

use crate::error::{PytError, Result};
use crate::names;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ProjectSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default, rename = "name")]
    pub project_name: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub pypi_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default)]
    pub github_user: String,
    #[serde(default)]
    pub github_repo: String,
}

/// Values the template ships with before configuration.
pub const PLACEHOLDER_VALUES: &[(&str, &str)] = &[
    ("project_name", "Package Name"),
    ("package_name", "package_name"),
    ("pypi_name", "package-name"),
    ("description", "A short description of your package"),
    ("author_name", "Your Name"),
    ("author_email", "your.email@example.com"),
    ("github_user", "username"),
    ("github_repo", "package_name"),
];

impl ProjectSettings {
    fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("project_name", self.project_name.as_str()),
            ("package_name", self.package_name.as_str()),
            ("pypi_name", self.pypi_name.as_str()),
            ("description", self.description.as_str()),
            ("author_name", self.author_name.as_str()),
            ("author_email", self.author_email.as_str()),
            ("github_user", self.github_user.as_str()),
            ("github_repo", self.github_repo.as_str()),
        ]
    }

    /// Names of fields still holding the template's placeholder value.
    pub fn placeholder_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(field, value)| {
                PLACEHOLDER_VALUES
                    .iter()
                    .any(|(f, placeholder)| f == field && value == placeholder)
            })
            .map(|(field, _)| field)
            .collect()
    }

    /// True when the identity fields are filled in with real values.
    pub fn is_configured(&self) -> bool {
        let required = [
            &self.project_name,
            &self.package_name,
            &self.author_name,
            &self.author_email,
            &self.github_user,
        ];
        required.iter().all(|v| !v.trim().is_empty()) && self.placeholder_fields().is_empty()
    }

    /// Fill empty fields from `other`, keeping values already present.
    pub fn fill_from(&mut self, other: &ProjectSettings) {
        let pairs = [
            (&mut self.project_name, &other.project_name),
            (&mut self.package_name, &other.package_name),
            (&mut self.pypi_name, &other.pypi_name),
            (&mut self.description, &other.description),
            (&mut self.author_name, &other.author_name),
            (&mut self.author_email, &other.author_email),
            (&mut self.github_user, &other.github_user),
            (&mut self.github_repo, &other.github_repo),
        ];
        for (mine, theirs) in pairs {
            if mine.is_empty() && !theirs.is_empty() {
                mine.clone_from(theirs);
            }
        }
    }

    /// Read what `pyproject.toml` says about the project. A missing or
    /// unparsable file yields empty settings.
    pub fn from_pyproject(root: &Path) -> ProjectSettings {
        let path = paths::pyproject_path(root);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return ProjectSettings::default();
        };
        let doc: toml::Table = match toml::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable pyproject.toml");
                return ProjectSettings::default();
            }
        };
        let Some(project) = doc.get("project").and_then(|v| v.as_table()) else {
            return ProjectSettings::default();
        };

        let str_field = |key: &str| {
            project
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let name = str_field("name");

        let mut settings = ProjectSettings {
            package_name: if name.is_empty() {
                String::new()
            } else {
                names::normalize_package_name(&name)
            },
            pypi_name: if name.is_empty() {
                String::new()
            } else {
                names::normalize_pypi_name(&name)
            },
            project_name: name,
            description: str_field("description"),
            ..Default::default()
        };

        if let Some(author) = project
            .get("authors")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|a| a.as_table())
        {
            let get = |k: &str| author.get(k).and_then(|v| v.as_str()).unwrap_or_default();
            settings.author_name = get("name").to_string();
            settings.author_email = get("email").to_string();
        }

        let repo_url = project
            .get("urls")
            .and_then(|v| v.as_table())
            .and_then(|urls| urls.get("Repository").or_else(|| urls.get("repository")))
            .and_then(|v| v.as_str());
        if let Some((owner, repo)) = repo_url.and_then(names::parse_github_url) {
            settings.github_user = owner;
            settings.github_repo = repo;
        }

        settings
    }
}

// ---------------------------------------------------------------------------
// TemplateState
// ---------------------------------------------------------------------------

/// The upstream template revision a project was last reviewed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateState {
    pub commit: String,
    pub commit_date: String,
}

impl TemplateState {
    pub fn new(commit: impl Into<String>, commit_date: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            commit_date: commit_date.into(),
        }
    }

    pub fn is_synced(&self) -> bool {
        !self.commit.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateState>,
}

impl Settings {
    /// Read the settings file exactly as stored. `Ok(None)` when it does not
    /// exist.
    pub fn read_file(root: &Path) -> Result<Option<Settings>> {
        let path = paths::settings_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let settings = toml::from_str(&data).map_err(|e| PytError::MalformedSettings {
            path: path.clone(),
            reason: e.message().to_string(),
        })?;
        Ok(Some(settings))
    }

    /// Load settings, filling project fields the file leaves empty from
    /// `pyproject.toml`.
    pub fn load(root: &Path) -> Result<Settings> {
        let mut settings = Self::read_file(root)?.unwrap_or_default();
        settings
            .project
            .fill_from(&ProjectSettings::from_pyproject(root));
        Ok(settings)
    }

    /// Write the settings back. Keys and tables this struct does not model
    /// are carried over from the existing file; the `[template]` table is
    /// replaced as a whole.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::settings_path(root);
        let mut doc = read_table(&path)?.unwrap_or_default();

        let toml::Value::Table(mut ours) = toml::Value::try_from(self)? else {
            return Err(PytError::Config("settings did not serialize to a table".into()));
        };

        if let Some(toml::Value::Table(project)) = ours.remove("project") {
            let slot = doc
                .entry("project")
                .or_insert(toml::Value::Table(toml::Table::new()));
            match slot {
                toml::Value::Table(existing) => {
                    for (key, value) in project {
                        existing.insert(key, value);
                    }
                }
                other => *other = toml::Value::Table(project),
            }
        }
        match ours.remove("template") {
            Some(template) => doc.insert("template".into(), template),
            None => doc.remove("template"),
        };

        let data = toml::to_string_pretty(&doc)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }
}

fn read_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let table = toml::from_str(&data).map_err(|e| PytError::MalformedSettings {
        path: path.to_path_buf(),
        reason: e.message().to_string(),
    })?;
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn configured() -> ProjectSettings {
        ProjectSettings {
            project_name: "My Project".into(),
            package_name: "my_project".into(),
            pypi_name: "my-project".into(),
            description: "A test project".into(),
            author_name: "Test Author".into(),
            author_email: "test@example.com".into(),
            github_user: "testuser".into(),
            github_repo: "my-project".into(),
        }
    }

    #[test]
    fn configured_settings_are_configured() {
        assert!(configured().is_configured());
    }

    #[test]
    fn placeholder_settings_are_not_configured() {
        let settings = ProjectSettings {
            project_name: "Package Name".into(),
            package_name: "package_name".into(),
            description: "A test project".into(),
            author_name: "Your Name".into(),
            author_email: "your.email@example.com".into(),
            github_user: "username".into(),
            ..Default::default()
        };
        assert!(!settings.is_configured());
    }

    #[test]
    fn empty_settings_are_not_configured() {
        assert!(!ProjectSettings::default().is_configured());
    }

    #[test]
    fn placeholder_fields_lists_only_placeholders() {
        let settings = ProjectSettings {
            project_name: "Package Name".into(),
            package_name: "my_project".into(),
            author_name: "Your Name".into(),
            author_email: "test@example.com".into(),
            github_user: "testuser".into(),
            ..Default::default()
        };
        let fields = settings.placeholder_fields();
        assert!(fields.contains(&"project_name"));
        assert!(fields.contains(&"author_name"));
        assert!(!fields.contains(&"package_name"));
    }

    #[test]
    fn template_state_synced() {
        assert!(TemplateState::new("abc123", "2025-01-15").is_synced());
        assert!(!TemplateState::new("", "").is_synced());
    }

    #[test]
    fn load_reads_pyproject_when_no_settings_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            r#"
[project]
name = "test-project"
description = "A test project"
authors = [{name = "Test Author", email = "test@example.com"}]

[project.urls]
Repository = "https://github.com/testuser/test-project"
"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.project.project_name, "test-project");
        assert_eq!(settings.project.package_name, "test_project");
        assert_eq!(settings.project.description, "A test project");
        assert_eq!(settings.project.author_name, "Test Author");
        assert_eq!(settings.project.author_email, "test@example.com");
        assert_eq!(settings.project.github_user, "testuser");
        assert_eq!(settings.project.github_repo, "test-project");
        assert!(settings.template.is_none());
    }

    #[test]
    fn settings_file_takes_precedence_over_pyproject() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(paths::CONFIG_DIR)).unwrap();
        std::fs::write(
            paths::settings_path(dir.path()),
            r#"
[project]
name = "My Project"
package_name = "my_project"

[template]
commit = "abc123def456"
commit_date = "2025-01-15"
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nname = \"other\"\ndescription = \"from pyproject\"\n",
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.project.project_name, "My Project");
        assert_eq!(settings.project.package_name, "my_project");
        assert_eq!(settings.project.description, "from pyproject");
        let template = settings.template.unwrap();
        assert_eq!(template.commit, "abc123def456");
        assert_eq!(template.commit_date, "2025-01-15");
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(paths::CONFIG_DIR)).unwrap();
        std::fs::write(paths::settings_path(dir.path()), "this is not [[[ toml").unwrap();

        let err = Settings::load(dir.path()).unwrap_err();
        assert!(matches!(err, PytError::MalformedSettings { .. }));
    }

    #[test]
    fn unparsable_pyproject_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "not valid [[[").unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.project, ProjectSettings::default());
    }

    #[test]
    fn save_then_read_file() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            project: configured(),
            template: Some(TemplateState::new("abc123", "2025-01-17")),
        };
        settings.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(paths::settings_path(dir.path())).unwrap();
        assert!(content.contains("abc123"));
        assert_eq!(Settings::read_file(dir.path()).unwrap(), Some(settings));
    }

    #[test]
    fn save_keeps_unmodelled_keys_and_tables() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(paths::config_dir(dir.path())).unwrap();
        std::fs::write(
            paths::settings_path(dir.path()),
            "[project]\nname = \"Old\"\nlicense = \"MIT\"\n\n[tooling]\nrunner = \"doit\"\n",
        )
        .unwrap();

        let settings = Settings {
            project: configured(),
            template: Some(TemplateState::new("abc123", "2025-01-17")),
        };
        settings.save(dir.path()).unwrap();

        let doc: toml::Table =
            toml::from_str(&std::fs::read_to_string(paths::settings_path(dir.path())).unwrap())
                .unwrap();
        assert_eq!(doc["project"]["name"].as_str(), Some("My Project"));
        assert_eq!(doc["project"]["license"].as_str(), Some("MIT"));
        assert_eq!(doc["tooling"]["runner"].as_str(), Some("doit"));
        assert_eq!(doc["template"]["commit"].as_str(), Some("abc123"));
        assert_eq!(Settings::read_file(dir.path()).unwrap(), Some(settings));
    }

    #[test]
    fn save_without_template_drops_stale_table() {
        let dir = TempDir::new().unwrap();
        Settings {
            project: configured(),
            template: Some(TemplateState::new("abc123", "2025-01-17")),
        }
        .save(dir.path())
        .unwrap();

        Settings {
            project: configured(),
            template: None,
        }
        .save(dir.path())
        .unwrap();
        assert_eq!(Settings::read_file(dir.path()).unwrap().unwrap().template, None);
    }
}
