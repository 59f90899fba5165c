//! Bulk byte movement between the local tree and the remote environment.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// What is being copied and how existing destination data is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// A single file, replacing the destination file.
    File,
    /// A whole directory, extracted over the destination directory.
    Directory,
    /// Directory contents merged into the destination; existing destination
    /// files are left untouched.
    AdditiveDirectory,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
            Self::AdditiveDirectory => write!(f, "additive directory"),
        }
    }
}

/// Errors from a bulk copy.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{mode} transfer {from} -> {to} failed: {detail}")]
    Failed {
        mode: TransferMode,
        from: String,
        to: String,
        detail: String,
    },

    #[error("invalid transfer path: {0}")]
    InvalidPath(String),

    #[error("failed to prepare local directory: {0}")]
    LocalDir(#[from] std::io::Error),
}

/// Moves files and directories between local and remote.
///
/// For [`TransferMode::File`] and [`TransferMode::Directory`] the source keeps
/// its name: `remote`/`local` must end in the same file name as the source.
/// For [`TransferMode::AdditiveDirectory`] the contents of the source
/// directory are merged into the destination directory.
pub trait BulkTransport {
    fn push(&self, local: &Path, remote: &str, mode: TransferMode) -> Result<(), TransportError>;

    fn pull(&self, remote: &str, local: &Path, mode: TransferMode) -> Result<(), TransportError>;
}
