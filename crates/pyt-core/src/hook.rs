//! Pre-execution gate for shell commands proposed by coding agents.
//!
//! A command line is tokenized with shell quoting rules, so text inside
//! quotes (commit messages, heredoc bodies) never matches a rule. Rules run
//! in a fixed order and the first match blocks:
//!
//! 1. dangerous standalone flags, anywhere in the line
//! 2. dangerous token sequences, anywhere in the line
//! 3. per simple command (split on `&&`, `||`, `;`, `|`, `&`): force push to
//!    a protected branch, deleting a protected branch, a merge commit on a
//!    protected branch, workflow commands that have project wrappers
//!
//! A force push whose target branch cannot be determined is blocked.

use crate::error::Result;
use serde::Deserialize;

pub const PROTECTED_BRANCHES: &[&str] = &["main", "master"];

/// Flags blocked whenever they appear as a whole token.
pub const DANGEROUS_FLAGS: &[(&str, &str)] = &[
    ("--admin", "Bypasses branch protection rules"),
    ("--no-verify", "Skips pre-commit/pre-push hooks"),
    ("--hard", "Hard reset - can lose uncommitted changes"),
];

/// Consecutive tokens blocked anywhere in the line (case-insensitive).
pub const DANGEROUS_SEQUENCES: &[(&[&str], &str)] = &[
    (&["rm", "-rf", "/"], "Destructive: removes root filesystem"),
    (&["rm", "-rf", "~"], "Destructive: removes home directory"),
    (&["sudo", "rm"], "Privileged deletion"),
];

pub const FORCE_PUSH_FLAGS: &[&str] = &["--force", "-f", "--force-with-lease"];

/// Command prefixes that must go through the project's task wrappers.
pub const BLOCKED_WORKFLOW_COMMANDS: &[(&[&str], &str)] = &[
    (
        &["gh", "issue", "create"],
        "Use 'doit issue --type=<type>' instead of 'gh issue create'",
    ),
    (&["gh", "pr", "create"], "Use 'doit pr' instead of 'gh pr create'"),
];

/// Agent tool names that carry a shell command.
pub const SHELL_TOOLS: &[&str] = &["Bash", "run_shell_command"];

const CONTROL_OPERATORS: &[&str] = &["&&", "||", ";", "|", "&"];

/// `git` global options that consume the following token.
const GIT_VALUE_OPTIONS: &[&str] = &["-C", "-c", "--git-dir", "--work-tree", "--namespace"];

/// `git push` options that consume the following token.
const PUSH_VALUE_OPTIONS: &[&str] = &["-o", "--push-option", "--repo", "--receive-pack", "--exec"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block { rule: &'static str, reason: String },
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Block { .. })
    }
}

// ---------------------------------------------------------------------------
// Tokenizing
// ---------------------------------------------------------------------------

/// Split with POSIX shell quoting; malformed quoting falls back to a plain
/// whitespace split, which exposes quoted text to the rules. Unquoted control
/// operators glued to words (`cd x&&git push`) become their own tokens.
pub fn tokenize(command: &str) -> Vec<String> {
    let spaced = space_operators(command);
    shell_words::split(&spaced)
        .unwrap_or_else(|_| spaced.split_whitespace().map(String::from).collect())
}

/// Surround unquoted `&&`, `||`, `;`, `|` and `&` with spaces. Redirections
/// such as `2>&1` and `&>` are left whole.
fn space_operators(command: &str) -> String {
    let chars: Vec<char> = command.chars().collect();
    let mut out = String::with_capacity(command.len() + 8);
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' && q == '"' && i + 1 < chars.len() {
                    out.push(c);
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None => match c {
                '\\' if i + 1 < chars.len() => {
                    out.push(c);
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '&' if is_redirection(&chars, i) => out.push(c),
                '&' | '|' => {
                    let doubled = chars.get(i + 1) == Some(&c);
                    out.push(' ');
                    out.push(c);
                    if doubled {
                        out.push(c);
                        i += 1;
                    }
                    out.push(' ');
                }
                ';' => out.push_str(" ; "),
                _ => out.push(c),
            },
        }
        i += 1;
    }
    out
}

fn is_redirection(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).map(|j| chars[j]);
    matches!(before, Some('>') | Some('<')) || chars.get(i + 1) == Some(&'>')
}

/// One simple command: program plus arguments, leading `VAR=value`
/// assignments dropped.
struct SimpleCommand<'a> {
    words: &'a [String],
}

impl<'a> SimpleCommand<'a> {
    fn new(words: &'a [String]) -> Self {
        let start = words
            .iter()
            .position(|w| !is_env_assignment(w))
            .unwrap_or(words.len());
        Self {
            words: &words[start..],
        }
    }

    fn starts_with(&self, prefix: &[&str]) -> bool {
        self.words.len() >= prefix.len()
            && self
                .words
                .iter()
                .zip(prefix)
                .all(|(w, p)| w.eq_ignore_ascii_case(p))
    }

    /// For a `git` command: the subcommand (lowercased) and its arguments.
    fn git(&self) -> Option<(String, &'a [String])> {
        let (program, rest) = self.words.split_first()?;
        if !program.eq_ignore_ascii_case("git") {
            return None;
        }
        let mut i = 0;
        while i < rest.len() {
            let word = rest[i].as_str();
            if GIT_VALUE_OPTIONS.contains(&word) {
                i += 2;
            } else if word.starts_with('-') {
                i += 1;
            } else {
                return Some((word.to_ascii_lowercase(), &rest[i + 1..]));
            }
        }
        None
    }
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

fn simple_commands(tokens: &[String]) -> Vec<SimpleCommand<'_>> {
    tokens
        .split(|t| CONTROL_OPERATORS.contains(&t.as_str()))
        .filter(|words| !words.is_empty())
        .map(SimpleCommand::new)
        .collect()
}

/// Positional arguments, skipping flags and the values of `value_options`.
fn positionals<'a>(args: &'a [String], value_options: &[&str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if value_options.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with('-') {
            out.push(arg.as_str());
        }
    }
    out
}

/// Branch a push refspec or ref names: `+src:dst` → `dst`,
/// `origin/main` and `refs/heads/main` → `main`.
fn ref_branch(spec: &str) -> &str {
    let spec = spec.trim_start_matches('+');
    let dst = spec.rsplit_once(':').map_or(spec, |(_, dst)| dst);
    dst.rsplit('/').next().unwrap_or(dst)
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// A fn-pointer rule evaluated against one simple command.
struct CommandRule {
    id: &'static str,
    check: fn(&RuleSet, &SimpleCommand, &mut dyn FnMut() -> Option<String>) -> Option<String>,
}

const COMMAND_RULES: &[CommandRule] = &[
    CommandRule {
        id: "force-push",
        check: RuleSet::force_push,
    },
    CommandRule {
        id: "delete-branch",
        check: RuleSet::delete_branch,
    },
    CommandRule {
        id: "merge-commit",
        check: RuleSet::merge_commit,
    },
    CommandRule {
        id: "workflow-command",
        check: RuleSet::workflow_command,
    },
];

#[derive(Debug, Clone)]
pub struct RuleSet {
    protected: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_protected(PROTECTED_BRANCHES.iter().copied())
    }
}

impl RuleSet {
    pub fn with_protected<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: branches.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_protected(&self, branch: &str) -> bool {
        self.protected.iter().any(|p| p.eq_ignore_ascii_case(branch))
    }

    /// Classify `command`. `current_branch` is called at most once, and only
    /// when a rule depends on the checked-out branch.
    pub fn check(&self, command: &str, current_branch: impl FnOnce() -> Option<String>) -> Decision {
        let tokens = tokenize(command);

        for token in &tokens {
            if let Some((_, reason)) = DANGEROUS_FLAGS.iter().find(|(flag, _)| token == flag) {
                return block("dangerous-flag", reason.to_string());
            }
        }

        for (sequence, reason) in DANGEROUS_SEQUENCES {
            let hit = tokens.windows(sequence.len()).any(|window| {
                window
                    .iter()
                    .zip(sequence.iter())
                    .all(|(t, s)| t.eq_ignore_ascii_case(s))
            });
            if hit {
                return block("dangerous-sequence", reason.to_string());
            }
        }

        let mut lookup = Some(current_branch);
        let mut cached: Option<String> = None;
        let mut branch = || {
            if let Some(f) = lookup.take() {
                cached = f();
            }
            cached.clone()
        };

        for cmd in simple_commands(&tokens) {
            for rule in COMMAND_RULES {
                if let Some(reason) = (rule.check)(self, &cmd, &mut branch) {
                    return block(rule.id, reason);
                }
            }
        }
        Decision::Allow
    }

    fn force_push(
        &self,
        cmd: &SimpleCommand,
        _: &mut dyn FnMut() -> Option<String>,
    ) -> Option<String> {
        let (sub, args) = cmd.git()?;
        if sub != "push" {
            return None;
        }
        let positional = positionals(args, PUSH_VALUE_OPTIONS);
        let forced = args.iter().any(|a| {
            FORCE_PUSH_FLAGS.contains(&a.as_str()) || a.starts_with("--force-with-lease=")
        }) || positional.iter().skip(1).any(|p| p.starts_with('+'));
        if !forced {
            return None;
        }

        let refspecs = positional.get(1..).unwrap_or_default();
        if let Some(branch) = refspecs
            .iter()
            .map(|r| ref_branch(r))
            .find(|b| self.is_protected(b))
        {
            return Some(format!("Force push to protected branch '{branch}'"));
        }
        match refspecs.last().map(|r| ref_branch(r)) {
            None | Some("") => Some(
                "Force push without explicit branch (could affect protected branch)".into(),
            ),
            Some(b) if b.eq_ignore_ascii_case("HEAD") => Some(
                "Force push of HEAD (target branch cannot be determined)".into(),
            ),
            Some(_) => None,
        }
    }

    fn delete_branch(
        &self,
        cmd: &SimpleCommand,
        _: &mut dyn FnMut() -> Option<String>,
    ) -> Option<String> {
        let (sub, args) = cmd.git()?;
        match sub.as_str() {
            "push" => {
                let positional = positionals(args, PUSH_VALUE_OPTIONS);
                let refs = positional.get(1..).unwrap_or_default();
                let delete_flag = args.iter().any(|a| a == "--delete" || a == "-d");
                for r in refs {
                    let colon = r.trim_start_matches('+').starts_with(':');
                    if colon || delete_flag {
                        let branch = ref_branch(r);
                        if self.is_protected(branch) {
                            return Some(format!("Deleting protected remote branch '{branch}'"));
                        }
                    }
                }
                None
            }
            "branch" => {
                let deleting = args
                    .iter()
                    .any(|a| a == "-d" || a == "-D" || a == "--delete");
                if !deleting {
                    return None;
                }
                positionals(args, &[])
                    .into_iter()
                    .find(|b| self.is_protected(b))
                    .map(|b| format!("Deleting protected local branch '{b}'"))
            }
            _ => None,
        }
    }

    fn merge_commit(
        &self,
        cmd: &SimpleCommand,
        current_branch: &mut dyn FnMut() -> Option<String>,
    ) -> Option<String> {
        let (sub, args) = cmd.git()?;
        if sub != "merge" {
            return None;
        }
        let safe = args
            .iter()
            .any(|a| a == "--ff-only" || a == "--abort" || a == "--quit");
        if safe {
            return None;
        }
        let branch = current_branch()?;
        self.is_protected(&branch).then(|| {
            format!(
                "Merge on protected branch '{branch}' would create merge commit. \
                 Use --ff-only for fast-forward merge, or merge via PR"
            )
        })
    }

    fn workflow_command(
        &self,
        cmd: &SimpleCommand,
        _: &mut dyn FnMut() -> Option<String>,
    ) -> Option<String> {
        BLOCKED_WORKFLOW_COMMANDS
            .iter()
            .find(|(prefix, _)| cmd.starts_with(prefix))
            .map(|(_, reason)| reason.to_string())
    }
}

fn block(rule: &'static str, reason: String) -> Decision {
    Decision::Block { rule, reason }
}

// ---------------------------------------------------------------------------
// Hook protocol
// ---------------------------------------------------------------------------

/// PreToolUse payload: `{"tool_name": ..., "tool_input": {"command": ...}}`.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: ToolInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub command: String,
}

impl HookInput {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The shell command to check, if this is a shell tool call.
    pub fn shell_command(&self) -> Option<&str> {
        let command = self.tool_input.command.as_str();
        (SHELL_TOOLS.contains(&self.tool_name.as_str()) && !command.is_empty()).then_some(command)
    }
}

/// Parse a hook payload and classify it. Non-shell tools are allowed.
pub fn evaluate(
    raw: &str,
    rules: &RuleSet,
    current_branch: impl FnOnce() -> Option<String>,
) -> Result<Decision> {
    let input = HookInput::parse(raw)?;
    Ok(match input.shell_command() {
        Some(command) => rules.check(command, current_branch),
        None => Decision::Allow,
    })
}

/// Message shown to the agent when a command is blocked.
pub fn block_message(command: &str, reason: &str) -> String {
    format!(
        "BLOCKED: Command contains dangerous pattern.\n\
         Reason: {reason}\n\
         Command: {command}\n\
         \n\
         If this is intentional, ask the user to run it manually."
    )
}
