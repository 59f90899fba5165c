//! Test doubles that stand in for a codespace.
//!
//! [`LocalRemote`] treats a local directory as the remote filesystem: remote
//! commands run through `sh -c` on this machine and bulk copies are plain
//! filesystem copies. Paths handed to it are therefore real local paths.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use walkdir::WalkDir;

use crate::remote::{
    BulkTransport, CommandOutput, RemoteError, RemoteExecutor, TransferMode, TransportError,
};

/// A recorded bulk copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub mode: TransferMode,
}

pub struct LocalRemote {
    home: PathBuf,
    pub transfers: RefCell<Vec<Transfer>>,
    pub commands: RefCell<Vec<String>>,
    fail_transfers: Cell<bool>,
    fail_spawn: Cell<bool>,
}

impl LocalRemote {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            transfers: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
            fail_transfers: Cell::new(false),
            fail_spawn: Cell::new(false),
        }
    }

    /// Make every subsequent bulk copy fail.
    pub fn fail_transfers(&self) {
        self.fail_transfers.set(true);
    }

    /// Make every subsequent remote command fail to spawn.
    pub fn fail_spawn(&self) {
        self.fail_spawn.set(true);
    }

    fn record(&self, from: String, to: String, mode: TransferMode) -> Result<(), TransportError> {
        self.transfers.borrow_mut().push(Transfer {
            from: from.clone(),
            to: to.clone(),
            mode,
        });
        if self.fail_transfers.get() {
            return Err(TransportError::Failed {
                mode,
                from,
                to,
                detail: "simulated transport failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteExecutor for LocalRemote {
    fn target(&self) -> &str {
        "local-test"
    }

    fn run(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        self.commands.borrow_mut().push(command.to_string());
        if self.fail_spawn.get() {
            return Err(RemoteError::Spawn {
                program: "gh".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gh not found"),
            });
        }
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("HOME", &self.home)
            .output()
            .map_err(|source| RemoteError::Spawn {
                program: "sh".to_string(),
                source,
            })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

impl BulkTransport for LocalRemote {
    fn push(&self, local: &Path, remote: &str, mode: TransferMode) -> Result<(), TransportError> {
        self.record(local.display().to_string(), remote.to_string(), mode)?;
        copy(local, Path::new(remote), mode)
    }

    fn pull(&self, remote: &str, local: &Path, mode: TransferMode) -> Result<(), TransportError> {
        self.record(remote.to_string(), local.display().to_string(), mode)?;
        copy(Path::new(remote), local, mode)
    }
}

fn copy(from: &Path, to: &Path, mode: TransferMode) -> Result<(), TransportError> {
    match mode {
        TransferMode::File => {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(from, to)?;
        }
        TransferMode::Directory | TransferMode::AdditiveDirectory => {
            let keep_existing = mode == TransferMode::AdditiveDirectory;
            for entry in WalkDir::new(from).into_iter().flatten() {
                let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
                let target = to.join(rel);
                if entry.file_type().is_dir() {
                    fs::create_dir_all(&target)?;
                } else if !(keep_existing && target.exists()) {
                    fs::copy(entry.path(), &target)?;
                }
            }
        }
    }
    Ok(())
}
