//! User configuration.
//!
//! Read from `<config dir>/codespace-sync/config.toml`, falling back to
//! `~/.codespace-sync.toml`. The first file that exists wins; every key is
//! optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::sync::DEFAULT_WINDOW_DAYS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    days: Option<u32>,
    projects_dir: Option<String>,
    extra_workspace_prefixes: Option<Vec<String>>,
    gh_bin: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Recency window for session candidates.
    pub days: u32,
    /// Local `~/.claude/projects`.
    pub projects_dir: PathBuf,
    /// Extra roots under which project checkouts live.
    pub extra_workspace_prefixes: Vec<String>,
    pub gh_bin: String,
    /// File the values came from, if any.
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            days: DEFAULT_WINDOW_DAYS,
            projects_dir: default_projects_dir(),
            extra_workspace_prefixes: Vec::new(),
            gh_bin: "gh".to_string(),
            source: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_paths())
    }

    /// Load from the first existing file among `paths`.
    pub fn load_from(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let Some(path) = paths.iter().find(|p| p.exists()) else {
            return Ok(config);
        };

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed: PartialConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        if let Some(days) = parsed.days {
            config.days = days;
        }
        if let Some(dir) = parsed.projects_dir
            && !dir.trim().is_empty()
        {
            config.projects_dir = expand_home(dir.trim());
        }
        if let Some(prefixes) = parsed.extra_workspace_prefixes {
            config.extra_workspace_prefixes = prefixes;
        }
        if let Some(gh_bin) = parsed.gh_bin
            && !gh_bin.trim().is_empty()
        {
            config.gh_bin = gh_bin;
        }
        config.source = Some(path.clone());
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("codespace-sync").join("config.toml"));
    }
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".codespace-sync.toml"));
    }
    paths
}

/// `~/.claude/projects` on this machine.
pub fn default_projects_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".claude")
        .join("projects")
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        _ => Path::new(path).to_path_buf(),
    }
}
