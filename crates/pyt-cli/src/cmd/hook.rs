use pyt_core::hook::{block_message, evaluate, Decision, HookInput, RuleSet};
use pyt_core::runner::{current_branch, SystemRunner};
use std::io::Read;

pub const EXIT_ALLOW: i32 = 0;
pub const EXIT_INVALID: i32 = 1;
pub const EXIT_BLOCK: i32 = 2;

/// Read one PreToolUse payload from stdin and return the process exit code.
pub fn run() -> i32 {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        eprintln!("Failed to read hook input: {e}");
        return EXIT_INVALID;
    }

    let rules = RuleSet::default();
    let branch = || {
        let cwd = std::env::current_dir().ok()?;
        current_branch(&SystemRunner, &cwd)
    };

    match evaluate(&raw, &rules, branch) {
        Ok(Decision::Allow) => EXIT_ALLOW,
        Ok(Decision::Block { rule, reason }) => {
            let command = HookInput::parse(&raw)
                .map(|i| i.tool_input.command)
                .unwrap_or_default();
            tracing::debug!(rule = %rule, "blocked command");
            eprintln!("{}", block_message(&command, &reason));
            EXIT_BLOCK
        }
        Err(e) => {
            eprintln!("Invalid JSON input: {e}");
            EXIT_INVALID
        }
    }
}
