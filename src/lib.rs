pub mod cli;
pub mod config;
pub mod interactive;
pub mod remote;
pub mod sync;
pub mod workspace;

#[cfg(test)]
mod testing;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;
use colored::Colorize;

use crate::cli::{Cli, Command, SessionsCommand, TargetArgs, WindowArgs};
use crate::config::Config;
use crate::interactive::LinePrompt;
use crate::remote::selector::{CodespaceInfo, select_codespace};
use crate::remote::{GhCodespace, remote_join};
use crate::sync::{
    PathScope, PermissionReconciler, SETTINGS_SUBPATH, SessionLayout, SessionReconciler,
    SessionReport, SystemClock,
};
use crate::workspace::SettingsPush;

/// Root under which codespaces check out repositories.
pub const REMOTE_WORKSPACES: &str = "/workspaces";

/// Library entrypoint for the `csync` binary.
pub fn run(cli: Cli) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "csync", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load()?;

    match &cli.command {
        Command::Push { target, window } => {
            let session = Session::open(&cli, &config, target)?;
            session.push_workspace()?;
            session.push_sessions(&config, window)?;
        }
        Command::Pull { target, window } => {
            let session = Session::open(&cli, &config, target)?;
            session.pull_workspace()?;
            session.pull_sessions(&config, window)?;
            session.pull_permissions(&config)?;
        }
        Command::Sessions {
            action: SessionsCommand::Push { target, window },
        } => {
            Session::open(&cli, &config, target)?.push_sessions(&config, window)?;
        }
        Command::Sessions {
            action: SessionsCommand::Pull { target, window },
        } => {
            Session::open(&cli, &config, target)?.pull_sessions(&config, window)?;
        }
        Command::Permissions { target } => {
            Session::open(&cli, &config, target)?.pull_permissions(&config)?;
        }
        Command::Completions { .. } => {}
    }
    Ok(())
}

/// A local project paired with the codespace it syncs against.
struct Session {
    dir: PathBuf,
    repo: String,
    remote_workspace: String,
    info: CodespaceInfo,
    codespace: GhCodespace,
}

impl Session {
    fn open(cli: &Cli, config: &Config, target: &TargetArgs) -> Result<Self> {
        let (dir, repo) = resolve_target(target)?;
        let info = select_codespace(&config.gh_bin, cli.codespace.as_deref(), true)?;
        let codespace = GhCodespace::new(&info.name).with_gh_bin(&config.gh_bin);
        let remote_workspace = remote_join(REMOTE_WORKSPACES, &repo);

        heading(&format!("Using Codespace {}", info.name.bold()));
        detail(&format!("Local: {}", dir.display()));
        detail(&format!("Remote: {}:{}", info.name, remote_workspace));

        Ok(Self {
            dir,
            repo,
            remote_workspace,
            info,
            codespace,
        })
    }

    fn push_workspace(&self) -> Result<()> {
        heading("Syncing .coding-agent to Codespace...");
        if workspace::push_agent_dir(
            &self.dir,
            &self.codespace,
            &self.codespace,
            &self.remote_workspace,
        )? {
            detail(&"done".green().to_string());
        } else {
            detail("No .coding-agent directory found, skipping");
        }

        let outcome = workspace::push_settings_if_same_repo(
            &self.dir,
            self.info.repository.as_deref(),
            &self.codespace,
            &self.codespace,
            &self.remote_workspace,
        )?;
        match outcome {
            SettingsPush::Pushed => heading(&format!("Synced {SETTINGS_SUBPATH} to Codespace")),
            SettingsPush::RepoMismatch => detail(&format!(
                "Skipping {SETTINGS_SUBPATH} sync (local repo doesn't match Codespace)"
            )),
            SettingsPush::NoLocalFile | SettingsPush::UnknownRepository => {}
        }
        Ok(())
    }

    fn pull_workspace(&self) -> Result<()> {
        heading("Syncing .coding-agent from Codespace...");
        if workspace::pull_agent_dir(
            &self.dir,
            &self.codespace,
            &self.codespace,
            &self.remote_workspace,
        )? {
            detail(&"done".green().to_string());
        } else {
            detail("No .coding-agent directory in Codespace, skipping");
        }
        Ok(())
    }

    fn reconciler<'a>(
        &'a self,
        config: &Config,
        window: &WindowArgs,
        clock: &'a SystemClock,
    ) -> SessionReconciler<'a> {
        let layout = SessionLayout::new(config.projects_dir.clone())
            .with_window_days(window.days.unwrap_or(config.days));
        SessionReconciler::new(&self.codespace, &self.codespace, clock, layout)
    }

    fn push_sessions(&self, config: &Config, window: &WindowArgs) -> Result<()> {
        heading("Syncing Claude sessions to Codespace...");
        let clock = SystemClock;
        let report = self
            .reconciler(config, window, &clock)
            .push(&self.repo)
            .with_context(|| format!("session push to {} failed", self.info.name))?;
        print_report(&report);
        Ok(())
    }

    fn pull_sessions(&self, config: &Config, window: &WindowArgs) -> Result<()> {
        heading("Syncing Claude sessions from Codespace...");
        let clock = SystemClock;
        let report = self
            .reconciler(config, window, &clock)
            .pull(&self.repo)
            .with_context(|| format!("session pull from {} failed", self.info.name))?;
        print_report(&report);
        Ok(())
    }

    fn pull_permissions(&self, config: &Config) -> Result<()> {
        heading("Checking Codespace permissions...");
        let home = dirs::home_dir().context("could not determine home directory")?;
        let scope = PathScope::new(home).with_extra_prefixes(&config.extra_workspace_prefixes);
        let remote_settings = remote_join(&self.remote_workspace, SETTINGS_SUBPATH);

        let mut prompt = LinePrompt::stdio();
        let added = PermissionReconciler::new(scope, &mut prompt).reconcile_from_remote(
            &self.codespace,
            &remote_settings,
            &self.dir,
        );
        if added > 0 {
            heading(&format!(
                "Added {} permission(s) to {}",
                added.to_string().green(),
                SETTINGS_SUBPATH
            ));
        } else {
            detail("No new permissions added");
        }
        Ok(())
    }
}

/// Absolute project directory and repository name for a target.
pub fn resolve_target(target: &TargetArgs) -> Result<(PathBuf, String)> {
    let dir = std::fs::canonicalize(&target.dir)
        .with_context(|| format!("project directory {} not found", target.dir.display()))?;
    let repo = match &target.repo {
        Some(repo) => repo.clone(),
        None => repo_name(&dir)
            .with_context(|| format!("cannot infer repository name from {}", dir.display()))?,
    };
    Ok((dir, repo))
}

fn repo_name(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn print_report(report: &SessionReport) {
    if let Some(dir) = &report.fallback_dir {
        println!(
            "    {} no local session directory; using {}",
            "warning:".yellow().bold(),
            dir.display()
        );
    }
    if report.total() == 0 {
        detail("No recent sessions found");
    } else {
        detail(&format!("Found {} session(s)", report.total()));
        heading(&report.to_string());
    }
}

fn heading(line: &str) {
    println!("{} {}", "==>".blue().bold(), line);
}

fn detail(line: &str) {
    println!("    {line}");
}
