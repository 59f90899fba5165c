//! Project-workspace files that travel alongside the session logs.
//!
//! - `.coding-agent/`: the agent's notes directory. Synced additively in both
//!   directions; files that already exist on the destination are kept.
//! - `.claude/settings.local.json`: pushed whole, but only when the local
//!   checkout and the codespace were made from the same GitHub repository.
//!
//! Unlike the permission pass, failures here stop the command.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::remote::{
    BulkTransport, RemoteError, RemoteExecutor, TransferMode, TransportError, remote_join,
};
use crate::sync::SETTINGS_SUBPATH;

/// Agent notes directory name inside a project root.
pub const AGENT_DIR: &str = ".coding-agent";

static SSH_REMOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^git@github\.com:(.+?)(?:\.git)?$").expect("valid regex"));
static HTTPS_REMOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://github\.com/(.+?)(?:\.git)?$").expect("valid regex"));

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to sync {what}: {source}")]
    Transport {
        what: &'static str,
        #[source]
        source: TransportError,
    },
}

/// Outcome of the settings-file push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsPush {
    Pushed,
    /// No local settings file to send.
    NoLocalFile,
    /// The codespace's repository is not known.
    UnknownRepository,
    /// Local `origin` is missing or points elsewhere.
    RepoMismatch,
}

/// Push `<local_dir>/.coding-agent` into the remote workspace.
///
/// Returns `false` when there is no local directory to send.
pub fn push_agent_dir(
    local_dir: &Path,
    executor: &dyn RemoteExecutor,
    transport: &dyn BulkTransport,
    remote_workspace: &str,
) -> Result<bool, WorkspaceError> {
    let local = local_dir.join(AGENT_DIR);
    if !local.is_dir() {
        tracing::info!(path = %local.display(), "no agent directory, skipping");
        return Ok(false);
    }

    let remote = remote_join(remote_workspace, AGENT_DIR);
    executor.ensure_dir(&remote)?;
    tracing::info!(local = %local.display(), remote = %remote, codespace = executor.target(), "syncing agent directory to codespace");
    transport
        .push(&local, &remote, TransferMode::AdditiveDirectory)
        .map_err(|source| WorkspaceError::Transport {
            what: AGENT_DIR,
            source,
        })?;
    Ok(true)
}

/// Pull the remote workspace's `.coding-agent` into `<local_dir>`.
///
/// Returns `false` when the codespace has no such directory.
pub fn pull_agent_dir(
    local_dir: &Path,
    executor: &dyn RemoteExecutor,
    transport: &dyn BulkTransport,
    remote_workspace: &str,
) -> Result<bool, WorkspaceError> {
    let remote = remote_join(remote_workspace, AGENT_DIR);
    if !executor.dir_exists(&remote)? {
        tracing::info!(remote = %remote, codespace = executor.target(), "no agent directory in codespace, skipping");
        return Ok(false);
    }

    let local = local_dir.join(AGENT_DIR);
    tracing::info!(remote = %remote, local = %local.display(), "syncing agent directory from codespace");
    transport
        .pull(&remote, &local, TransferMode::AdditiveDirectory)
        .map_err(|source| WorkspaceError::Transport {
            what: AGENT_DIR,
            source,
        })?;
    Ok(true)
}

/// Copy the local settings file to the codespace when both sides share a
/// GitHub repository.
pub fn push_settings_if_same_repo(
    local_dir: &Path,
    codespace_repository: Option<&str>,
    executor: &dyn RemoteExecutor,
    transport: &dyn BulkTransport,
    remote_workspace: &str,
) -> Result<SettingsPush, WorkspaceError> {
    let Some(codespace_repository) = codespace_repository else {
        return Ok(SettingsPush::UnknownRepository);
    };
    let origin = local_origin_url(local_dir);
    if !repositories_match(origin.as_deref(), codespace_repository) {
        tracing::info!(
            origin = origin.as_deref().unwrap_or("<none>"),
            codespace_repository,
            "local repo doesn't match codespace; skipping settings sync"
        );
        return Ok(SettingsPush::RepoMismatch);
    }

    let local: PathBuf = local_dir.join(SETTINGS_SUBPATH);
    if !local.is_file() {
        return Ok(SettingsPush::NoLocalFile);
    }

    let remote = remote_join(remote_workspace, SETTINGS_SUBPATH);
    let remote_parent = remote_join(remote_workspace, ".claude");
    executor.ensure_dir(&remote_parent)?;
    tracing::info!(remote = %remote, "syncing settings file to codespace");
    transport
        .push(&local, &remote, TransferMode::File)
        .map_err(|source| WorkspaceError::Transport {
            what: SETTINGS_SUBPATH,
            source,
        })?;
    Ok(SettingsPush::Pushed)
}

/// `owner/repo` from a GitHub remote URL, for ssh and https forms.
pub fn normalize_github_repo(url: &str) -> Option<String> {
    let url = url.trim();
    SSH_REMOTE
        .captures(url)
        .or_else(|| HTTPS_REMOTE.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a local origin URL names `codespace_repository`, ignoring case.
pub fn repositories_match(origin_url: Option<&str>, codespace_repository: &str) -> bool {
    origin_url
        .and_then(normalize_github_repo)
        .is_some_and(|local| local.eq_ignore_ascii_case(codespace_repository))
}

/// URL of the `origin` remote of the checkout at `dir`, if any.
pub fn local_origin_url(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["remote", "get-url", "origin"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!url.is_empty()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LocalRemote;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        local: PathBuf,
        remote_ws: PathBuf,
        remote: LocalRemote,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local/widget");
        let remote_ws = tmp.path().join("remote/workspaces/widget");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&remote_ws).unwrap();
        let remote = LocalRemote::new(tmp.path().join("remote/home"));
        Fixture {
            _tmp: tmp,
            local,
            remote_ws,
            remote,
        }
    }

    impl Fixture {
        fn ws(&self) -> String {
            self.remote_ws.display().to_string()
        }
    }

    #[test]
    fn test_normalize_github_repo() {
        assert_eq!(
            normalize_github_repo("git@github.com:acme/widget.git").as_deref(),
            Some("acme/widget")
        );
        assert_eq!(
            normalize_github_repo("git@github.com:acme/widget").as_deref(),
            Some("acme/widget")
        );
        assert_eq!(
            normalize_github_repo("https://github.com/acme/widget.git\n").as_deref(),
            Some("acme/widget")
        );
        assert_eq!(
            normalize_github_repo("https://github.com/acme/widget").as_deref(),
            Some("acme/widget")
        );
        assert_eq!(normalize_github_repo("https://gitlab.com/acme/widget"), None);
        assert_eq!(normalize_github_repo(""), None);
    }

    #[test]
    fn test_repositories_match_ignores_case() {
        assert!(repositories_match(
            Some("git@github.com:Acme/Widget.git"),
            "acme/widget"
        ));
        assert!(!repositories_match(
            Some("git@github.com:acme/gadget.git"),
            "acme/widget"
        ));
        assert!(!repositories_match(None, "acme/widget"));
    }

    #[test]
    fn test_push_agent_dir_skips_when_missing() {
        let f = fixture();
        assert!(!push_agent_dir(&f.local, &f.remote, &f.remote, &f.ws()).unwrap());
        assert!(f.remote.transfers.borrow().is_empty());
    }

    #[test]
    fn test_push_agent_dir_keeps_remote_files() {
        let f = fixture();
        fs::create_dir_all(f.local.join(".coding-agent/notes")).unwrap();
        fs::write(f.local.join(".coding-agent/plan.md"), "local plan").unwrap();
        fs::write(f.local.join(".coding-agent/notes/a.md"), "a").unwrap();
        fs::create_dir_all(f.remote_ws.join(".coding-agent")).unwrap();
        fs::write(f.remote_ws.join(".coding-agent/plan.md"), "remote plan").unwrap();

        assert!(push_agent_dir(&f.local, &f.remote, &f.remote, &f.ws()).unwrap());

        assert_eq!(
            fs::read_to_string(f.remote_ws.join(".coding-agent/plan.md")).unwrap(),
            "remote plan"
        );
        assert_eq!(
            fs::read_to_string(f.remote_ws.join(".coding-agent/notes/a.md")).unwrap(),
            "a"
        );
        assert_eq!(
            f.remote.transfers.borrow()[0].mode,
            TransferMode::AdditiveDirectory
        );
    }

    #[test]
    fn test_pull_agent_dir() {
        let f = fixture();
        assert!(!pull_agent_dir(&f.local, &f.remote, &f.remote, &f.ws()).unwrap());

        fs::create_dir_all(f.remote_ws.join(".coding-agent")).unwrap();
        fs::write(f.remote_ws.join(".coding-agent/todo.md"), "remote").unwrap();
        fs::write(f.remote_ws.join(".coding-agent/plan.md"), "remote plan").unwrap();
        fs::create_dir_all(f.local.join(".coding-agent")).unwrap();
        fs::write(f.local.join(".coding-agent/plan.md"), "local plan").unwrap();

        assert!(pull_agent_dir(&f.local, &f.remote, &f.remote, &f.ws()).unwrap());
        assert_eq!(
            fs::read_to_string(f.local.join(".coding-agent/todo.md")).unwrap(),
            "remote"
        );
        assert_eq!(
            fs::read_to_string(f.local.join(".coding-agent/plan.md")).unwrap(),
            "local plan"
        );
    }

    #[test]
    fn test_agent_dir_transport_failure_is_fatal() {
        let f = fixture();
        fs::create_dir_all(f.local.join(".coding-agent")).unwrap();
        f.remote.fail_transfers();
        let err = push_agent_dir(&f.local, &f.remote, &f.remote, &f.ws()).unwrap_err();
        assert!(matches!(err, WorkspaceError::Transport { .. }));
    }

    #[test]
    fn test_settings_push_needs_repository() {
        let f = fixture();
        let outcome =
            push_settings_if_same_repo(&f.local, None, &f.remote, &f.remote, &f.ws()).unwrap();
        assert_eq!(outcome, SettingsPush::UnknownRepository);

        // Not a git checkout, so there is no origin to compare.
        let outcome = push_settings_if_same_repo(
            &f.local,
            Some("acme/widget"),
            &f.remote,
            &f.remote,
            &f.ws(),
        )
        .unwrap();
        assert_eq!(outcome, SettingsPush::RepoMismatch);
        assert!(f.remote.transfers.borrow().is_empty());
    }

    #[test]
    fn test_settings_push_same_repo() {
        if which::which("git").is_err() {
            return;
        }
        let f = fixture();
        let git = |args: &[&str]| {
            Command::new("git")
                .arg("-C")
                .arg(&f.local)
                .args(args)
                .output()
                .unwrap()
        };
        git(&["init", "-q"]);
        git(&["remote", "add", "origin", "git@github.com:acme/widget.git"]);

        let outcome = push_settings_if_same_repo(
            &f.local,
            Some("ACME/widget"),
            &f.remote,
            &f.remote,
            &f.ws(),
        )
        .unwrap();
        assert_eq!(outcome, SettingsPush::NoLocalFile);

        fs::create_dir_all(f.local.join(".claude")).unwrap();
        fs::write(f.local.join(SETTINGS_SUBPATH), r#"{"permissions":{"allow":["A"]}}"#).unwrap();
        fs::create_dir_all(f.remote_ws.join(".claude")).unwrap();
        fs::write(f.remote_ws.join(SETTINGS_SUBPATH), "{}").unwrap();

        let outcome = push_settings_if_same_repo(
            &f.local,
            Some("acme/widget"),
            &f.remote,
            &f.remote,
            &f.ws(),
        )
        .unwrap();
        assert_eq!(outcome, SettingsPush::Pushed);
        assert_eq!(
            fs::read_to_string(f.remote_ws.join(SETTINGS_SUBPATH)).unwrap(),
            r#"{"permissions":{"allow":["A"]}}"#
        );

        let outcome = push_settings_if_same_repo(
            &f.local,
            Some("acme/gadget"),
            &f.remote,
            &f.remote,
            &f.ws(),
        )
        .unwrap();
        assert_eq!(outcome, SettingsPush::RepoMismatch);
    }
}
