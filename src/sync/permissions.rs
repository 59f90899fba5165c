//! Permission grant reconciliation.
//!
//! Grants present in a source allow-list but missing from the destination
//! are offered to the operator one at a time and appended to the
//! destination's `.claude/settings.local.json` when accepted. Existing grants
//! are never removed or reordered.
//!
//! Before anything is offered, grants that point into a *different*
//! project's checkout are dropped. A grant is foreign when any path-shaped
//! substring of it sits under a recognized workspace root (`~/projects`,
//! `~/src`, `~/code`, `~/repos`, `~/work`, `/workspaces`) but outside the
//! destination project. Paths outside those roots (`/usr`, `/etc`, ...) are
//! never filtered.
//!
//! Unlike session sync, nothing in here is fatal: any failure is logged and
//! printed as a warning, and the pass reports zero merged grants.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::settings::{
    SettingsError, allow_list_from_str, append_allowed, read_allow_list, settings_path,
};
use crate::interactive::Confirm;
use crate::remote::{RemoteError, RemoteExecutor};

/// Path-shaped substrings: optional `~`, a slash, then word, `.`, `~`, `-`
/// or `/` characters.
static PATH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~?/[\w/.~-]+").expect("path regex must compile"));

/// Home-relative directories that conventionally hold project checkouts.
const HOME_WORKSPACE_DIRS: [&str; 5] = ["projects", "src", "code", "repos", "work"];

/// Shared multi-tenant workspace root used by codespaces.
const SHARED_WORKSPACE_ROOT: &str = "/workspaces";

/// Errors inside a permission pass. Callers of
/// [`PermissionReconciler::reconcile`] never see these; they become warnings.
#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("failed to resolve project directory {path}: {source}")]
    ProjectDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Which filesystem roots count as "somebody's project".
#[derive(Debug, Clone)]
pub struct PathScope {
    home: PathBuf,
    prefixes: Vec<PathBuf>,
}

impl PathScope {
    /// Default workspace roots for the given home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let mut prefixes: Vec<PathBuf> = HOME_WORKSPACE_DIRS
            .iter()
            .map(|dir| home.join(dir))
            .collect();
        prefixes.push(PathBuf::from(SHARED_WORKSPACE_ROOT));
        Self { home, prefixes }
    }

    /// Add further workspace roots (from configuration).
    pub fn with_extra_prefixes<I, P>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for prefix in extra {
            let prefix = prefix.as_ref().trim();
            if !prefix.is_empty() {
                self.prefixes.push(normalize(&self.expand(prefix)));
            }
        }
        self
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    fn expand(&self, raw: &str) -> PathBuf {
        if raw == "~" {
            self.home.clone()
        } else if let Some(rest) = raw.strip_prefix("~/") {
            self.home.join(rest)
        } else {
            PathBuf::from(raw)
        }
    }

    /// Whether `path` lies strictly inside one of the workspace roots.
    pub fn is_workspace_path(&self, path: &Path) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| path != prefix && path.starts_with(prefix))
    }

    /// Whether `grant` references a workspace path outside `project_dir`.
    ///
    /// `project_dir` should already be resolved (canonical).
    pub fn is_foreign(&self, grant: &str, project_dir: &Path) -> bool {
        PATH_PATTERN.find_iter(grant).any(|m| {
            let path = normalize(&self.expand(m.as_str()));
            self.is_workspace_path(&path) && !path.starts_with(project_dir)
        })
    }
}

/// Lexically resolve `.` and `..` so `proj/../other` is judged as `other`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Source grants the destination does not have yet.
///
/// Order follows `source`. When `destination_dir` is given it is resolved
/// and grants that look like they belong to another project are dropped.
pub fn find_new_permissions(
    source: &[String],
    destination_settings: &Path,
    destination_dir: Option<&Path>,
    scope: &PathScope,
) -> Result<Vec<String>, PermissionError> {
    let existing: HashSet<String> = read_allow_list(destination_settings).into_iter().collect();
    let new: Vec<String> = source
        .iter()
        .filter(|grant| !existing.contains(*grant))
        .cloned()
        .collect();

    let Some(dir) = destination_dir else {
        return Ok(new);
    };
    let resolved = dir
        .canonicalize()
        .map_err(|source| PermissionError::ProjectDir {
            path: dir.to_path_buf(),
            source,
        })?;

    Ok(new
        .into_iter()
        .filter(|grant| {
            let foreign = scope.is_foreign(grant, &resolved);
            if foreign {
                tracing::debug!(grant = %grant, project = %resolved.display(), "dropping grant for another project");
            }
            !foreign
        })
        .collect())
}

/// Append `accepted` to the destination allow-list and save.
///
/// Creates the document (and its directory) when missing. Returns how many
/// grants were appended.
pub fn merge_accepted(
    accepted: &[String],
    destination_settings: &Path,
) -> Result<usize, PermissionError> {
    if accepted.is_empty() {
        return Ok(0);
    }
    Ok(append_allowed(destination_settings, accepted)?)
}

/// The allow-list stored in a remote settings document.
///
/// A missing, empty or malformed remote document reads as empty; only an
/// unreachable remote is an error.
pub fn read_remote_allow_list(
    executor: &dyn RemoteExecutor,
    remote_settings: &str,
) -> Result<Vec<String>, RemoteError> {
    Ok(executor
        .read_file(remote_settings)?
        .map(|text| allow_list_from_str(&text))
        .unwrap_or_default())
}

/// Runs a confirm-then-merge permission pass.
pub struct PermissionReconciler<'a> {
    scope: PathScope,
    confirm: &'a mut dyn Confirm,
}

impl<'a> PermissionReconciler<'a> {
    pub fn new(scope: PathScope, confirm: &'a mut dyn Confirm) -> Self {
        Self { scope, confirm }
    }

    /// Offer new grants from `source` and merge the accepted ones.
    ///
    /// Returns the number of grants appended. Never fails.
    pub fn reconcile(
        &mut self,
        source: &[String],
        destination_settings: &Path,
        destination_dir: Option<&Path>,
    ) -> usize {
        match self.try_reconcile(source, destination_settings, destination_dir) {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!(error = %e, settings = %destination_settings.display(), "could not merge permissions");
                eprintln!("{} Could not merge permissions: {e}", "Warning:".yellow());
                0
            }
        }
    }

    /// Pull new grants from a codespace's settings into a local project.
    pub fn reconcile_from_remote(
        &mut self,
        executor: &dyn RemoteExecutor,
        remote_settings: &str,
        local_project_dir: &Path,
    ) -> usize {
        let source = match read_remote_allow_list(executor, remote_settings) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, remote = %remote_settings, "could not read remote permissions");
                eprintln!("{} Could not read Codespace permissions: {e}", "Warning:".yellow());
                return 0;
            }
        };
        self.reconcile(
            &source,
            &settings_path(local_project_dir),
            Some(local_project_dir),
        )
    }

    fn try_reconcile(
        &mut self,
        source: &[String],
        destination_settings: &Path,
        destination_dir: Option<&Path>,
    ) -> Result<usize, PermissionError> {
        let new = find_new_permissions(source, destination_settings, destination_dir, &self.scope)?;
        if new.is_empty() {
            tracing::debug!("no new permissions");
            return Ok(0);
        }
        tracing::info!(count = new.len(), "found new permission(s)");

        let accepted: Vec<String> = new
            .into_iter()
            .filter(|grant| self.confirm.confirm(&format!("Add '{grant}'?")))
            .collect();
        if accepted.is_empty() {
            return Ok(0);
        }

        let added = merge_accepted(&accepted, destination_settings)?;
        tracing::info!(count = added, settings = %destination_settings.display(), "added permission(s)");
        Ok(added)
    }
}
