//! Remote environment access.
//!
//! The reconcilers never spawn processes directly. They talk to the codespace
//! through two seams:
//!
//! - [`RemoteExecutor`]: run a shell command remotely and capture its output.
//!   Used for existence checks, `tail`, `mkdir -p`, `find` and `cat`.
//! - [`transport::BulkTransport`]: move a file or directory between the local
//!   tree and the remote one.
//!
//! [`gh::GhCodespace`] implements both on top of `gh codespace ssh`. Tests use
//! in-memory fakes backed by a local directory.
//!
//! Every call is a blocking round trip with no timeout at this layer; a hung
//! `gh` hangs the caller.

pub mod gh;
pub mod selector;
pub mod transport;

use std::borrow::Cow;

use thiserror::Error;

pub use gh::GhCodespace;
pub use transport::{BulkTransport, TransferMode, TransportError};

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

/// Errors raised while talking to the remote environment.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remote command failed on {target} ({command}): {stderr}")]
    CommandFailed {
        target: String,
        command: String,
        stderr: String,
    },

    #[error("remote home directory is empty on {0}")]
    EmptyHome(String),
}

/// Runs shell commands inside a named remote environment.
pub trait RemoteExecutor {
    /// Name of the remote environment, for messages.
    fn target(&self) -> &str;

    /// Run `command` through the remote shell.
    ///
    /// `Err` means the command could not be run at all. A command that ran
    /// and exited non-zero is `Ok` with `success == false`.
    fn run(&self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Resolve `$HOME` on the remote side.
    fn home_dir(&self) -> Result<String, RemoteError> {
        let out = self.run("echo $HOME")?;
        if !out.success {
            return Err(RemoteError::CommandFailed {
                target: self.target().to_string(),
                command: "echo $HOME".to_string(),
                stderr: out.stderr.trim().to_string(),
            });
        }
        let home = out.stdout.trim().to_string();
        if home.is_empty() {
            return Err(RemoteError::EmptyHome(self.target().to_string()));
        }
        tracing::debug!(target = %self.target(), remote_home = %home, "got remote home directory");
        Ok(home)
    }

    /// Final line of a remote file, or `None` if it is missing or empty.
    fn tail_line(&self, path: &str) -> Result<Option<String>, RemoteError> {
        let out = self.run(&format!("tail -n 1 {} 2>/dev/null", quote(path)))?;
        if !out.success {
            return Ok(None);
        }
        let line = out.stdout.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }

    fn dir_exists(&self, path: &str) -> Result<bool, RemoteError> {
        Ok(self.run(&format!("test -d {}", quote(path)))?.success)
    }

    /// `mkdir -p` on the remote side. A non-zero exit is an error.
    fn ensure_dir(&self, path: &str) -> Result<(), RemoteError> {
        let command = format!("mkdir -p {}", quote(path));
        let out = self.run(&command)?;
        if out.success {
            Ok(())
        } else {
            Err(RemoteError::CommandFailed {
                target: self.target().to_string(),
                command,
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    /// Contents of a remote file, or `None` if it is missing or empty.
    fn read_file(&self, path: &str) -> Result<Option<String>, RemoteError> {
        let out = self.run(&format!("cat {} 2>/dev/null", quote(path)))?;
        if !out.success || out.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(out.stdout))
    }
}

/// Quote a path for the remote POSIX shell.
pub fn quote(path: &str) -> Cow<'_, str> {
    shell_words::quote(path)
}

/// Join a remote directory and a child name with a single `/`.
pub fn remote_join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Split a remote path into `(parent, file_name)`.
pub fn split_remote(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let name = &trimmed[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
    Some((parent, name))
}

/// Strip the `.jsonl` suffix from a remote or local file name.
pub fn session_id(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(".jsonl").filter(|id| !id.is_empty())
}
