//! `gh codespace ssh` backed executor and transport.
//!
//! Files and session directories travel as a tar stream piped through
//! `gh codespace ssh`, which copes with quoting far better than `gh codespace
//! cp`. Additive directory syncs use rsync with `gh codespace ssh` as the
//! remote shell and `--ignore-existing`, so nothing already present on the
//! receiving side is overwritten.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::transport::{BulkTransport, TransferMode, TransportError};
use super::{CommandOutput, RemoteError, RemoteExecutor, quote, split_remote};

/// A codespace reached through the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCodespace {
    gh_bin: String,
    name: String,
}

impl GhCodespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            gh_bin: "gh".to_string(),
            name: name.into(),
        }
    }

    /// Use a specific `gh` binary instead of the one on `PATH`.
    pub fn with_gh_bin(mut self, gh_bin: impl Into<String>) -> Self {
        self.gh_bin = gh_bin.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = Command::new(&self.gh_bin);
        cmd.args(["codespace", "ssh", "-c", &self.name, "--"]);
        cmd
    }

    /// Remote shell string handed to rsync via `-e`.
    fn rsync_shell(&self) -> String {
        format!(
            "{} codespace ssh -c {} --",
            quote(&self.gh_bin),
            quote(&self.name)
        )
    }

    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    fn rsync(&self, from: &str, to: &str) -> Result<(), TransportError> {
        let mut cmd = Command::new("rsync");
        cmd.args([
            "--archive",
            "--compress",
            "--ignore-existing",
            "--protect-args",
            "-e",
            &self.rsync_shell(),
            "--",
            from,
            to,
        ]);

        tracing::debug!(codespace = %self.name, from, to, "starting rsync");
        let output = cmd.output().map_err(|source| TransportError::Spawn {
            program: "rsync".to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Failed {
                mode: TransferMode::AdditiveDirectory,
                from: from.to_string(),
                to: to.to_string(),
                detail: format!(
                    "rsync exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }

    fn remote_spec(&self, path: &str) -> String {
        format!("{}:{}", self.name, path)
    }
}

impl RemoteExecutor for GhCodespace {
    fn target(&self) -> &str {
        &self.name
    }

    fn run(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        tracing::trace!(codespace = %self.name, command, "remote exec");
        let output = self
            .ssh_command()
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RemoteError::Spawn {
                program: self.gh_bin.clone(),
                source,
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

impl BulkTransport for GhCodespace {
    fn push(&self, local: &Path, remote: &str, mode: TransferMode) -> Result<(), TransportError> {
        let to = self.remote_spec(remote);
        if mode == TransferMode::AdditiveDirectory {
            let from = format!("{}/", local.display());
            let to = format!("{}/", to.trim_end_matches('/'));
            let pb = Self::spinner(format!("syncing {}", local.display()));
            let result = self.rsync(&from, &to);
            pb.finish_and_clear();
            return result;
        }

        let (local_parent, local_name) = split_local(local)?;
        let (remote_parent, remote_name) =
            split_remote(remote).ok_or_else(|| TransportError::InvalidPath(remote.to_string()))?;
        if local_name != remote_name {
            return Err(TransportError::InvalidPath(format!(
                "{} cannot be renamed to {remote}",
                local.display()
            )));
        }

        let mut producer = Command::new("tar");
        producer
            .args(["-cf", "-", "--no-xattrs", "-C"])
            .arg(local_parent)
            .arg(&local_name);

        let mut consumer = self.ssh_command();
        consumer.arg(format!(
            "mkdir -p {parent} && cd {parent} && tar -xf -",
            parent = quote(remote_parent)
        ));

        let pb = Self::spinner(format!("copying {local_name}"));
        let result = run_pipe(&mut producer, &mut consumer);
        pb.finish_and_clear();

        result.map_err(|detail| match detail {
            PipeFailure::Spawn(program, source) => TransportError::Spawn { program, source },
            PipeFailure::Exit(detail) => TransportError::Failed {
                mode,
                from: local.display().to_string(),
                to,
                detail,
            },
        })
    }

    fn pull(&self, remote: &str, local: &Path, mode: TransferMode) -> Result<(), TransportError> {
        let from = self.remote_spec(remote);
        if mode == TransferMode::AdditiveDirectory {
            std::fs::create_dir_all(local)?;
            let from = format!("{}/", from.trim_end_matches('/'));
            let to = format!("{}/", local.display());
            let pb = Self::spinner(format!("syncing {}", local.display()));
            let result = self.rsync(&from, &to);
            pb.finish_and_clear();
            return result;
        }

        let (remote_parent, remote_name) =
            split_remote(remote).ok_or_else(|| TransportError::InvalidPath(remote.to_string()))?;
        let (local_parent, local_name) = split_local(local)?;
        if local_name != remote_name {
            return Err(TransportError::InvalidPath(format!(
                "{remote} cannot be renamed to {}",
                local.display()
            )));
        }
        std::fs::create_dir_all(local_parent)?;

        let mut producer = self.ssh_command();
        producer.arg(format!(
            "cd {} && tar -cf - {}",
            quote(remote_parent),
            quote(remote_name)
        ));

        let mut consumer = Command::new("tar");
        consumer.args(["-xf", "-", "-C"]).arg(local_parent);

        let pb = Self::spinner(format!("copying {remote_name}"));
        let result = run_pipe(&mut producer, &mut consumer);
        pb.finish_and_clear();

        result.map_err(|detail| match detail {
            PipeFailure::Spawn(program, source) => TransportError::Spawn { program, source },
            PipeFailure::Exit(detail) => TransportError::Failed {
                mode,
                from,
                to: local.display().to_string(),
                detail,
            },
        })
    }
}

fn split_local(path: &Path) -> Result<(&Path, String), TransportError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| TransportError::InvalidPath(path.display().to_string()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransportError::InvalidPath(path.display().to_string()))?;
    Ok((parent, name.to_string()))
}

enum PipeFailure {
    Spawn(String, std::io::Error),
    Exit(String),
}

/// Run `producer | consumer`, failing if either side exits non-zero.
fn run_pipe(producer: &mut Command, consumer: &mut Command) -> Result<(), PipeFailure> {
    let producer_name = producer.get_program().to_string_lossy().into_owned();
    let consumer_name = consumer.get_program().to_string_lossy().into_owned();

    let mut left = producer
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| PipeFailure::Spawn(producer_name.clone(), e))?;

    let Some(stream) = left.stdout.take() else {
        let _ = left.kill();
        return Err(PipeFailure::Exit(format!("{producer_name} produced no stdout")));
    };

    let right = consumer
        .stdin(Stdio::from(stream))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();
    let right = match right {
        Ok(out) => out,
        Err(e) => {
            let _ = left.kill();
            let _ = left.wait();
            return Err(PipeFailure::Spawn(consumer_name, e));
        }
    };
    let left = left
        .wait_with_output()
        .map_err(|e| PipeFailure::Spawn(producer_name.clone(), e))?;

    let mut failures = Vec::new();
    if !left.status.success() {
        failures.push(format!(
            "{producer_name}: {}",
            String::from_utf8_lossy(&left.stderr).trim()
        ));
    }
    if !right.status.success() {
        failures.push(format!(
            "{consumer_name}: {}",
            String::from_utf8_lossy(&right.stderr).trim()
        ));
    }
    if failures.is_empty() {
        Ok(())
    } else {
        tracing::warn!(errors = %failures.join("; "), "transfer pipeline failed");
        Err(PipeFailure::Exit(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_rsync_shell_quotes() {
        let cs = GhCodespace::new("my-space").with_gh_bin("/opt/gh bin/gh");
        assert_eq!(
            cs.rsync_shell(),
            "'/opt/gh bin/gh' codespace ssh -c my-space --"
        );
    }

    #[test]
    fn test_remote_spec() {
        let cs = GhCodespace::new("cs-1");
        assert_eq!(cs.remote_spec("/workspaces/r"), "cs-1:/workspaces/r");
        assert_eq!(cs.target(), "cs-1");
        assert_eq!(cs.name(), "cs-1");
    }

    #[test]
    fn test_split_local() {
        let (parent, name) = split_local(Path::new("/a/b/s.jsonl")).unwrap();
        assert_eq!(parent, Path::new("/a/b"));
        assert_eq!(name, "s.jsonl");
        assert!(split_local(&PathBuf::from("s.jsonl")).is_err());
    }

    #[test]
    fn test_push_rejects_rename() {
        let tmp = tempfile::TempDir::new().unwrap();
        let local = tmp.path().join("a.jsonl");
        std::fs::write(&local, "{}").unwrap();
        let cs = GhCodespace::new("cs").with_gh_bin("/nonexistent/gh");
        let err = cs
            .push(&local, "/remote/b.jsonl", TransferMode::File)
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidPath(_)));
    }

    #[test]
    fn test_missing_gh_is_spawn_error() {
        let cs = GhCodespace::new("cs").with_gh_bin("/nonexistent/gh-binary");
        let err = cs.run("true").unwrap_err();
        assert!(matches!(err, RemoteError::Spawn { .. }));
    }
}
