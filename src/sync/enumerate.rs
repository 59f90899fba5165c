//! Candidate discovery within a recency window.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};
use walkdir::WalkDir;

use crate::remote::{RemoteError, RemoteExecutor, quote};

/// Default recency window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Source of "now" for recency windows.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Session logs directly inside `dir` modified after `now - window_days`.
///
/// A missing directory yields an empty list. Results are sorted by path.
pub fn recent_local_sessions(dir: &Path, window_days: u32, clock: &dyn Clock) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let cutoff = window_start(clock.now(), window_days);

    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "jsonl"))
        .filter(|entry| {
            entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .is_some_and(|mtime| to_utc(mtime) > cutoff)
        })
        .map(|entry| entry.into_path())
        .collect();
    out.sort();
    out
}

/// Start of a window ending at `now`. A window reaching past the earliest
/// representable instant covers everything.
fn window_start(now: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(window_days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Session logs in a remote directory modified within the last `window_days`.
///
/// Evaluated with the remote `find -mtime`, so the remote clock decides.
/// A missing directory or failing `find` yields an empty list; only a failure
/// to reach the remote at all is an error.
pub fn recent_remote_sessions(
    executor: &dyn RemoteExecutor,
    dir: &str,
    window_days: u32,
) -> Result<Vec<String>, RemoteError> {
    let command = format!(
        "find {} -maxdepth 1 -name '*.jsonl' -mtime -{} 2>/dev/null",
        quote(dir),
        window_days
    );
    let out = executor.run(&command)?;
    if !out.success {
        tracing::debug!(target = %executor.target(), dir, "remote find failed; treating as empty");
        return Ok(Vec::new());
    }

    let mut sessions: Vec<String> = out
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    sessions.sort();
    Ok(sessions)
}
