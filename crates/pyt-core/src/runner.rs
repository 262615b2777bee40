//! External command execution (`git`, `gh`) behind a trait, so sequencing
//! logic can be exercised without touching real repositories.

use crate::error::{PytError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            stdin: None,
        }
    }

    pub fn cwd(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-quoted command line, for logs and error messages.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; -1 when the process was killed by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait CommandRunner {
    /// Run to completion. A non-zero exit is not an error here.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Whether `program` can be found on PATH.
    fn exists(&self, program: &str) -> bool;

    /// Run and fail with `CommandFailed` on a non-zero exit.
    fn check(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if !output.success() {
            return Err(PytError::CommandFailed {
                command: invocation.display(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!(command = %invocation.display(), "running");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let spawn_err = |e: std::io::Error| PytError::SpawnFailed {
            program: invocation.program.clone(),
            reason: e.to_string(),
        };
        let mut child = cmd.spawn().map_err(spawn_err)?;

        if let Some(input) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).map_err(spawn_err)?;
            }
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

// ---------------------------------------------------------------------------
// git / gh helpers
// ---------------------------------------------------------------------------

/// Branch checked out in `dir`, or None when detached or not a repository.
pub fn current_branch(runner: &dyn CommandRunner, dir: &Path) -> Option<String> {
    let output = runner
        .run(&Invocation::new("git", ["branch", "--show-current"]).cwd(dir))
        .ok()?;
    let branch = output.stdout.trim();
    (output.success() && !branch.is_empty()).then(|| branch.to_string())
}

pub fn git_config(runner: &dyn CommandRunner, key: &str) -> Option<String> {
    let output = runner
        .run(&Invocation::new("git", ["config", "--get", key]))
        .ok()?;
    let value = output.stdout.trim();
    (output.success() && !value.is_empty()).then(|| value.to_string())
}

pub fn gh_authenticated(runner: &dyn CommandRunner) -> bool {
    runner
        .run(&Invocation::new("gh", ["auth", "status"]))
        .map(|o| o.success())
        .unwrap_or(false)
}

/// `gh api` call. A body is sent as JSON on stdin; an empty response is
/// returned as `Value::Null`.
pub fn gh_api(
    runner: &dyn CommandRunner,
    method: &str,
    endpoint: &str,
    body: Option<&serde_json::Value>,
) -> Result<serde_json::Value> {
    let mut invocation = Invocation::new("gh", ["api", endpoint, "--method", method]);
    if let Some(body) = body {
        invocation.args.extend(["--input".to_string(), "-".to_string()]);
        invocation = invocation.stdin(serde_json::to_string(body)?);
    }
    let output = runner.check(&invocation)?;
    if output.stdout.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_str(&output.stdout)?)
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------
