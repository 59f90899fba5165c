//! Choosing which codespace to talk to.
//!
//! Codespaces come from `gh codespace list --json`. An explicit name wins;
//! otherwise a single candidate is taken as-is and several candidates are
//! offered in a fuzzy picker.

use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

use crate::interactive::{InteractiveError, pick_one};

/// State `gh` reports for a running codespace.
pub const STATE_AVAILABLE: &str = "Available";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodespaceInfo {
    pub name: String,
    /// `owner/repo` the codespace was created from.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub git_status: Option<GitStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitStatus {
    #[serde(rename = "ref", default)]
    pub branch: Option<String>,
}

impl CodespaceInfo {
    /// A codespace known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: None,
            state: None,
            git_status: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state.as_deref() == Some(STATE_AVAILABLE)
    }

    pub fn branch(&self) -> &str {
        self.git_status
            .as_ref()
            .and_then(|g| g.branch.as_deref())
            .unwrap_or("unknown")
    }
}

/// Errors while finding or choosing a codespace.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("gh CLI is required but was not found ({0}). Install it from https://cli.github.com")]
    GhMissing(String),

    #[error("Failed to list Codespaces: {0}")]
    ListFailed(String),

    #[error("Could not parse Codespace list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No available Codespaces found. Create one with: gh codespace create")]
    NoneAvailable,

    #[error("No Codespaces found. Create one with: gh codespace create")]
    NoneFound,

    #[error("No Codespace selected")]
    NotSelected,

    #[error(transparent)]
    Interactive(#[from] InteractiveError),
}

/// Parse the output of `gh codespace list --json name,repository,state,gitStatus`.
pub fn parse_codespace_list(json: &str) -> Result<Vec<CodespaceInfo>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Fail early when `gh` cannot be found.
pub fn ensure_gh_installed(gh_bin: &str) -> Result<(), SelectionError> {
    which::which(gh_bin)
        .map(|_| ())
        .map_err(|_| SelectionError::GhMissing(gh_bin.to_string()))
}

/// List codespaces via `gh`.
pub fn list_codespaces(gh_bin: &str) -> Result<Vec<CodespaceInfo>, SelectionError> {
    ensure_gh_installed(gh_bin)?;

    let output = Command::new(gh_bin)
        .args([
            "codespace",
            "list",
            "--json",
            "name,repository,state,gitStatus",
        ])
        .output()
        .map_err(|e| SelectionError::ListFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(SelectionError::ListFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(parse_codespace_list(&String::from_utf8_lossy(&output.stdout))?)
}

/// Pick a codespace from `codespaces`.
///
/// `picker` is only consulted when more than one candidate remains; it gets
/// the candidates and returns the chosen index, or `None` if dismissed.
pub fn choose<F>(
    codespaces: Vec<CodespaceInfo>,
    explicit: Option<&str>,
    filter_available: bool,
    picker: F,
) -> Result<CodespaceInfo, SelectionError>
where
    F: FnOnce(&[CodespaceInfo]) -> Result<Option<usize>, InteractiveError>,
{
    if let Some(name) = explicit {
        return Ok(codespaces
            .into_iter()
            .find(|cs| cs.name == name)
            .unwrap_or_else(|| CodespaceInfo::named(name)));
    }

    let mut candidates = codespaces;
    if filter_available {
        candidates.retain(CodespaceInfo::is_available);
    }

    match candidates.len() {
        0 if filter_available => Err(SelectionError::NoneAvailable),
        0 => Err(SelectionError::NoneFound),
        1 => Ok(candidates.remove(0)),
        _ => {
            let idx = picker(&candidates)?.ok_or(SelectionError::NotSelected)?;
            if idx < candidates.len() {
                Ok(candidates.swap_remove(idx))
            } else {
                Err(SelectionError::NotSelected)
            }
        }
    }
}

/// Find the codespace to use, prompting when it is ambiguous.
///
/// `gh` must be installed even when a name is given, since every later step
/// goes through it.
pub fn select_codespace(
    gh_bin: &str,
    explicit: Option<&str>,
    filter_available: bool,
) -> Result<CodespaceInfo, SelectionError> {
    ensure_gh_installed(gh_bin)?;
    let codespaces = match (explicit, list_codespaces(gh_bin)) {
        (_, Ok(list)) => list,
        // An explicit name does not need the list; it only adds the repository.
        (Some(name), Err(e)) => {
            tracing::debug!(codespace = name, error = %e, "could not list codespaces");
            Vec::new()
        }
        (None, Err(e)) => return Err(e),
    };

    choose(codespaces, explicit, filter_available, |candidates| {
        let width = console::Term::stdout().size().1 as usize;
        let (header, rows) = format_rows(candidates, width);
        pick_one("Select Codespace", &header, &rows)
    })
}

/// Column layout for the picker: header plus one row per codespace.
pub fn format_rows(codespaces: &[CodespaceInfo], terminal_width: usize) -> (String, Vec<String>) {
    let available = terminal_width.saturating_sub(18);
    let name_width = (available * 35 / 100).max(15);
    let branch_width = (available * 65 / 100).max(20);

    let header = format!(
        "{:<name_width$}  {:<branch_width$}  {}",
        "NAME", "BRANCH", "STATE"
    );
    let rows = codespaces
        .iter()
        .map(|cs| {
            format!(
                "{:<name_width$}  {:<branch_width$}  {}",
                truncate(&cs.name, name_width),
                truncate(cs.branch(), branch_width),
                cs.state.as_deref().unwrap_or("unknown")
            )
        })
        .collect();
    (header, rows)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
