//! Session log reconciliation between `~/.claude/projects` and a codespace.
//!
//! Each pass is driven by one side. Candidates are the driving side's logs
//! touched within the recency window; for each one the last record on both
//! sides is compared and the log is copied only when the driving side is
//! strictly newer (or the other side has nothing). A session's auxiliary
//! directory (`<id>/` next to `<id>.jsonl`) travels with it when the source
//! has one.
//!
//! A "skip" verdict is silent and counted. A failed copy or remote command
//! ends the whole batch with an error.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::compare::{Direction, decide};
use super::enumerate::{Clock, DEFAULT_WINDOW_DAYS, recent_local_sessions, recent_remote_sessions};
use super::timestamp::{last_record_instant, local_last_instant};
use crate::remote::{
    BulkTransport, RemoteError, RemoteExecutor, TransferMode, TransportError, remote_join,
    session_id, split_remote,
};

/// Errors that stop a session batch.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to create local directory {path}: {source}")]
    LocalDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a single session's reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Transferred,
    Skipped,
}

/// Tally of a whole pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub direction: Direction,
    pub transferred: usize,
    pub skipped: usize,
    /// Set when no local project directory existed and a synthesized one was
    /// used instead.
    pub fallback_dir: Option<PathBuf>,
}

impl SessionReport {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            transferred: 0,
            skipped: 0,
            fallback_dir: None,
        }
    }

    pub fn record(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Transferred => self.transferred += 1,
            SessionOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.transferred + self.skipped
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, Skipped: {}",
            self.direction.verb(),
            self.transferred,
            self.skipped
        )
    }
}

/// Where session logs live on each side.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    /// Local projects root, normally `~/.claude/projects`.
    pub projects_dir: PathBuf,
    /// Recency window in days.
    pub window_days: u32,
}

impl SessionLayout {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Local project directory for a repository.
    ///
    /// The agent names project directories after the mangled absolute path of
    /// the checkout, so the match is any child ending in `-<repo>`. When more
    /// than one matches, the lexically first wins.
    pub fn find_local_project_dir(&self, repo: &str) -> Option<PathBuf> {
        let suffix = format!("-{repo}");
        let entries = std::fs::read_dir(&self.projects_dir).ok()?;
        let mut matches: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.ends_with(&suffix)))
            .map(|e| e.path())
            .collect();
        matches.sort();
        matches.into_iter().next()
    }

    /// Synthesized local directory used when none exists yet.
    pub fn fallback_local_dir(&self, repo: &str) -> PathBuf {
        self.projects_dir.join(format!("-workspaces-{repo}"))
    }

    /// Project directory inside the codespace, where the checkout lives at
    /// `/workspaces/<repo>`.
    pub fn remote_project_dir(remote_home: &str, repo: &str) -> String {
        remote_join(remote_home, &format!(".claude/projects/-workspaces-{repo}"))
    }
}

/// Drives push and pull passes over session logs.
pub struct SessionReconciler<'a> {
    executor: &'a dyn RemoteExecutor,
    transport: &'a dyn BulkTransport,
    clock: &'a dyn Clock,
    layout: SessionLayout,
}

impl<'a> SessionReconciler<'a> {
    pub fn new(
        executor: &'a dyn RemoteExecutor,
        transport: &'a dyn BulkTransport,
        clock: &'a dyn Clock,
        layout: SessionLayout,
    ) -> Self {
        Self {
            executor,
            transport,
            clock,
            layout,
        }
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    /// Push every recent local session that is newer than its remote copy.
    pub fn push(&self, repo: &str) -> Result<SessionReport, SyncError> {
        let mut report = SessionReport::new(Direction::ToRemote);
        let window = self.layout.window_days;

        let Some(local_dir) = self.layout.find_local_project_dir(repo) else {
            tracing::info!(repo, "no local sessions found");
            return Ok(report);
        };

        let sessions = recent_local_sessions(&local_dir, window, self.clock);
        if sessions.is_empty() {
            tracing::info!(repo, days = window, "no recent sessions to push");
            return Ok(report);
        }
        tracing::info!(repo, count = sessions.len(), days = window, "found local sessions");

        let remote_home = self.executor.home_dir()?;
        let remote_dir = SessionLayout::remote_project_dir(&remote_home, repo);

        for session in &sessions {
            report.record(self.push_session(session, &remote_dir)?);
        }

        tracing::info!(
            repo,
            pushed = report.transferred,
            skipped = report.skipped,
            "session push finished"
        );
        Ok(report)
    }

    /// Pull every recent remote session that is newer than its local copy.
    pub fn pull(&self, repo: &str) -> Result<SessionReport, SyncError> {
        let mut report = SessionReport::new(Direction::FromRemote);
        let window = self.layout.window_days;

        let remote_home = self.executor.home_dir()?;
        let remote_dir = SessionLayout::remote_project_dir(&remote_home, repo);

        let sessions = recent_remote_sessions(self.executor, &remote_dir, window)?;
        if sessions.is_empty() {
            tracing::info!(repo, days = window, "no recent sessions in codespace");
            return Ok(report);
        }
        tracing::info!(repo, count = sessions.len(), "found remote sessions");

        let local_dir = match self.layout.find_local_project_dir(repo) {
            Some(dir) => dir,
            None => {
                let dir = self.layout.fallback_local_dir(repo);
                tracing::warn!(
                    repo,
                    dir = %dir.display(),
                    "no local session directory; sessions will be stored in a synthesized path that the agent may not look in"
                );
                report.fallback_dir = Some(dir.clone());
                dir
            }
        };

        for session in &sessions {
            report.record(self.pull_session(session, &local_dir)?);
        }

        tracing::info!(
            repo,
            pulled = report.transferred,
            skipped = report.skipped,
            "session pull finished"
        );
        Ok(report)
    }

    /// Reconcile one local log against `remote_dir`.
    pub fn push_session(
        &self,
        local_session: &Path,
        remote_dir: &str,
    ) -> Result<SessionOutcome, SyncError> {
        let Some(id) = local_session
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(session_id)
        else {
            return Ok(SessionOutcome::Skipped);
        };
        let remote_session = remote_join(remote_dir, &format!("{id}.jsonl"));

        let local_ts = local_last_instant(local_session);
        let remote_ts = self
            .executor
            .tail_line(&remote_session)?
            .as_deref()
            .and_then(last_record_instant);

        let verdict = decide(local_ts, remote_ts);
        tracing::debug!(session = id, ?local_ts, ?remote_ts, ?verdict, "compared session");
        if !verdict.transfers() {
            return Ok(SessionOutcome::Skipped);
        }

        self.executor.ensure_dir(remote_dir)?;
        self.transport
            .push(local_session, &remote_session, TransferMode::File)?;

        let local_aux = local_session.with_extension("");
        if local_aux.is_dir() {
            let remote_aux = remote_join(remote_dir, id);
            self.transport
                .push(&local_aux, &remote_aux, TransferMode::Directory)?;
        }

        tracing::debug!(session = id, "pushed session");
        Ok(SessionOutcome::Transferred)
    }

    /// Reconcile one remote log against `local_dir`.
    pub fn pull_session(
        &self,
        remote_session: &str,
        local_dir: &Path,
    ) -> Result<SessionOutcome, SyncError> {
        let Some((remote_dir, id)) = split_remote(remote_session)
            .and_then(|(dir, name)| session_id(name).map(|id| (dir, id)))
        else {
            return Ok(SessionOutcome::Skipped);
        };
        let local_session = local_dir.join(format!("{id}.jsonl"));

        let remote_ts = self
            .executor
            .tail_line(remote_session)?
            .as_deref()
            .and_then(last_record_instant);
        let local_ts = local_last_instant(&local_session);

        let verdict = decide(remote_ts, local_ts);
        tracing::debug!(session = id, ?remote_ts, ?local_ts, ?verdict, "compared session");
        if !verdict.transfers() {
            return Ok(SessionOutcome::Skipped);
        }

        std::fs::create_dir_all(local_dir).map_err(|source| SyncError::LocalDir {
            path: local_dir.to_path_buf(),
            source,
        })?;
        self.transport
            .pull(remote_session, &local_session, TransferMode::File)?;

        let remote_aux = remote_join(remote_dir, id);
        if self.executor.dir_exists(&remote_aux)? {
            self.transport
                .pull(&remote_aux, &local_dir.join(id), TransferMode::Directory)?;
        }

        tracing::debug!(session = id, "pulled session");
        Ok(SessionOutcome::Transferred)
    }
}
