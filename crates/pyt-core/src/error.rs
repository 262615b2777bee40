use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PytError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("directory does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("required tool not installed: {0}")]
    ToolMissing(String),

    #[error("invalid skip pattern '{pattern}': {reason}")]
    InvalidSkipPattern { pattern: String, reason: String },

    #[error("failed to retrieve {url}: {reason}")]
    Retrieval { url: String, reason: String },

    #[error("failed to extract archive: {0}")]
    Extraction(String),

    #[error("target not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("malformed settings file {}: {reason}", .path.display())]
    MalformedSettings { path: PathBuf, reason: String },

    #[error("invalid package name '{0}': must match [a-z_][a-z0-9_]*")]
    InvalidPackageName(String),

    #[error("invalid PyPI name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidPypiName(String),

    #[error("invalid email address '{0}'")]
    InvalidEmail(String),

    #[error("unknown placeholder token '{0}'")]
    UnknownToken(String),

    #[error("no replacement given for placeholder token '{0}'")]
    MissingToken(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to spawn `{program}`: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("step '{step}' failed")]
    StepFailed {
        step: String,
        #[source]
        source: Box<PytError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, PytError>;
