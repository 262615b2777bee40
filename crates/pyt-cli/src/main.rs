mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    bootstrap::BootstrapArgs, check::CheckArgs, configure::ConfigureArgs, migrate::MigrateArgs,
    sync::SyncSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pyt",
    about = "Keep Python projects in step with pyproject-template",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .config/pyproject_template/, pyproject.toml or .git/)
    #[arg(long, global = true, env = "PYT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show project configuration, template sync state and the suggested next step
    Status {
        /// Do not contact the template repository
        #[arg(long)]
        offline: bool,
    },

    /// Replace template placeholders with project values
    Configure(ConfigureArgs),

    /// Compare the project against the template
    Check(CheckArgs),

    /// Inspect or record the last reviewed template commit
    Sync {
        #[command(subcommand)]
        subcommand: SyncSubcommand,
    },

    /// Copy template scaffolding into an existing repository
    Migrate(MigrateArgs),

    /// Create a new GitHub repository from the template
    Bootstrap(BootstrapArgs),

    /// PreToolUse hook: read a tool call as JSON on stdin, exit 2 to block it
    Hook,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Bootstrap(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Status { offline } => cmd::status::run(&root, offline, cli.json),
        Commands::Configure(args) => cmd::configure::run(&root, args, cli.json),
        Commands::Check(args) => cmd::check::run(&root, args, cli.json),
        Commands::Sync { subcommand } => cmd::sync::run(&root, subcommand, cli.json),
        Commands::Migrate(args) => cmd::migrate::run(args, cli.json),
        Commands::Bootstrap(args) => cmd::bootstrap::run(args, cli.json),
        // The hook speaks its own exit-code protocol.
        Commands::Hook => std::process::exit(cmd::hook::run()),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
