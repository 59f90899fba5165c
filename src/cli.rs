//! Command-line surface of `csync`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Keep Claude session logs and permission grants in step between this
/// machine and a GitHub Codespace.
#[derive(Parser, Debug)]
#[command(
    name = "csync",
    version,
    about,
    after_help = "Examples:\n  csync push\n  csync pull --dir ~/src/widget\n  csync sessions push --days 30\n  csync permissions --codespace fluffy-umbrella-5g4x\n  csync completions zsh"
)]
pub struct Cli {
    /// Show debug logging.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Codespace to use instead of picking one.
    #[arg(long, short = 'c', global = true, env = "CODESPACE_SYNC_CODESPACE")]
    pub codespace: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send agent notes, settings (same repo only) and newer sessions to the codespace.
    Push {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Fetch agent notes and newer sessions, then offer new permission grants.
    Pull {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Reconcile session logs only.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },

    /// Offer permission grants from the codespace's settings for the local project.
    Permissions {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// Push sessions that are newer locally.
    Push {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Pull sessions that are newer in the codespace.
    Pull {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
}

/// Which local project to sync.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Local project directory.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Repository name; defaults to the directory's name. The codespace
    /// checkout is `/workspaces/<repo>`.
    #[arg(long)]
    pub repo: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Only consider sessions modified within this many days.
    #[arg(long, env = "CODESPACE_SYNC_DAYS", value_parser = clap::value_parser!(u32).range(1..))]
    pub days: Option<u32>,
}
