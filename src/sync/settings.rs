//! `.claude/settings.local.json` document handling.
//!
//! Only `permissions.allow` is interpreted. Appending grants edits the JSON
//! value in place, so every other key keeps its value and its position.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Settings file location relative to a project root.
pub const SETTINGS_SUBPATH: &str = ".claude/settings.local.json";

/// Path of the settings document for a project root.
pub fn settings_path(project_root: &Path) -> PathBuf {
    project_root.join(SETTINGS_SUBPATH)
}

/// Typed view of the parts of a settings document this crate reads.
///
/// A `null` where an object or list is expected reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Permissions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub allow: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deny: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors while loading or saving a settings document.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected shape in {path}: `{key}` is not {expected}")]
    Shape {
        path: PathBuf,
        key: &'static str,
        expected: &'static str,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Settings {
    /// Parse a settings document from text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Append `grants` to `permissions.allow` in the document at `path`.
///
/// A missing document starts as `{"permissions": {"allow": [], "deny": []}}`.
/// A missing or `null` `permissions` / `allow` is initialized in place. All
/// other keys, and their order, are left as they were. An existing document
/// that cannot be parsed is an error; it is never silently replaced.
pub fn append_allowed(path: &Path, grants: &[String]) -> Result<usize, SettingsError> {
    let mut doc = load_document(path)?;
    let shape = |key, expected| SettingsError::Shape {
        path: path.to_path_buf(),
        key,
        expected,
    };

    let permissions = doc.entry("permissions").or_insert(Value::Null);
    if permissions.is_null() {
        *permissions = Value::Object(Map::new());
    }
    let Value::Object(permissions) = permissions else {
        return Err(shape("permissions", "an object"));
    };

    let allow = permissions.entry("allow").or_insert(Value::Null);
    if allow.is_null() {
        *allow = Value::Array(Vec::new());
    }
    let Value::Array(allow) = allow else {
        return Err(shape("permissions.allow", "a list"));
    };
    allow.extend(grants.iter().cloned().map(Value::String));

    write_document(path, &Value::Object(doc))?;
    Ok(grants.len())
}

fn load_document(path: &Path) -> Result<Map<String, Value>, SettingsError> {
    if !path.exists() {
        let mut permissions = Map::new();
        permissions.insert("allow".into(), Value::Array(Vec::new()));
        permissions.insert("deny".into(), Value::Array(Vec::new()));
        let mut doc = Map::new();
        doc.insert("permissions".into(), Value::Object(permissions));
        return Ok(doc);
    }
    let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `doc` as pretty JSON with a trailing newline.
///
/// The parent directory is created if needed. The content goes to a sibling
/// temp file first and is renamed into place, so a crash never leaves a
/// truncated document behind.
fn write_document(path: &Path, doc: &Value) -> Result<(), SettingsError> {
    let write_err = |source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut content = serde_json::to_string_pretty(doc)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    content.push('\n');

    let tmp = temp_path(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// The allow-list from a settings file.
///
/// Missing and malformed documents both read as an empty list.
pub fn read_allow_list(path: &Path) -> Vec<String> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    allow_list_from_str(&text)
}

/// The allow-list from settings text; malformed text reads as empty.
pub fn allow_list_from_str(text: &str) -> Vec<String> {
    match Settings::parse(text) {
        Ok(settings) => settings.permissions.allow,
        Err(e) => {
            tracing::debug!(error = %e, "unparsable settings document; treating allow-list as empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_malformed_read_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.local.json");
        assert!(read_allow_list(&path).is_empty());

        fs::write(&path, "{ not json").unwrap();
        assert!(read_allow_list(&path).is_empty());

        fs::write(&path, r#"{"permissions": {"allow": [1, 2]}}"#).unwrap();
        assert!(read_allow_list(&path).is_empty());
    }

    #[test]
    fn test_reads_allow_list() {
        assert_eq!(
            allow_list_from_str(r#"{"permissions":{"allow":["Bash(ls)","Read(/etc/hosts)"]}}"#),
            vec!["Bash(ls)", "Read(/etc/hosts)"]
        );
        assert!(allow_list_from_str(r#"{"model":"opus"}"#).is_empty());
    }

    #[test]
    fn test_null_sections_read_empty() {
        assert!(allow_list_from_str(r#"{"permissions": null}"#).is_empty());
        assert!(allow_list_from_str(r#"{"permissions": {"allow": null, "deny": null}}"#).is_empty());
        assert_eq!(
            allow_list_from_str(r#"{"permissions": {"allow": ["A"], "deny": null}}"#),
            vec!["A"]
        );
    }

    #[test]
    fn test_append_creates_default_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".claude/settings.local.json");
        assert_eq!(append_allowed(&path, &["Bash(ls)".to_string()]).unwrap(), 1);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"permissions": {"allow": ["Bash(ls)"], "deny": []}})
        );
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_append_initializes_null_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.local.json");

        fs::write(&path, r#"{"model": "opus", "permissions": null}"#).unwrap();
        append_allowed(&path, &["Bash(ls)".to_string()]).unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, json!({"model": "opus", "permissions": {"allow": ["Bash(ls)"]}}));

        fs::write(&path, r#"{"permissions": {"allow": null, "deny": ["D"]}}"#).unwrap();
        append_allowed(&path, &["Bash(ls)".to_string()]).unwrap();
        assert_eq!(read_allow_list(&path), vec!["Bash(ls)"]);
    }

    #[test]
    fn test_append_keeps_key_order_and_adds_nothing_else() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.local.json");
        fs::write(
            &path,
            r#"{"enableAllProjectMcpServers":true,"permissions":{"defaultMode":"plan","allow":["A"]},"model":"opus"}"#,
        )
        .unwrap();

        append_allowed(&path, &["B".to_string()]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mcp = text.find("enableAllProjectMcpServers").unwrap();
        let perms = text.find("\"permissions\"").unwrap();
        let model = text.find("\"model\"").unwrap();
        assert!(mcp < perms && perms < model);
        assert!(text.find("defaultMode").unwrap() < text.find("\"allow\"").unwrap());
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["permissions"],
            json!({"defaultMode": "plan", "allow": ["A", "B"]})
        );
    }

    #[test]
    fn test_append_rejects_malformed_and_odd_shapes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.local.json");

        fs::write(&path, "[]").unwrap();
        assert!(matches!(
            append_allowed(&path, &["A".to_string()]),
            Err(SettingsError::Parse { .. })
        ));

        fs::write(&path, r#"{"permissions": {"allow": "A"}}"#).unwrap();
        assert!(matches!(
            append_allowed(&path, &["B".to_string()]),
            Err(SettingsError::Shape { key: "permissions.allow", .. })
        ));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"permissions": {"allow": "A"}}"#
        );
    }

    #[test]
    fn test_settings_path() {
        assert_eq!(
            settings_path(Path::new("/w/repo")),
            PathBuf::from("/w/repo/.claude/settings.local.json")
        );
    }
}
