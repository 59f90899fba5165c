//! Last-activity extraction for session logs.
//!
//! A session log is newline-delimited JSON. Its last activity is taken from
//! the physically last line only; the rest of the log is never parsed. Each
//! record may carry its timestamp at the top level or, for snapshot records,
//! under `snapshot.timestamp`.
//!
//! Timestamps are parsed as RFC 3339 and compared as instants, so
//! `2024-01-01T12:00:00+02:00` and `2024-01-01T10:00:00Z` are equal even
//! though their strings differ.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

/// Point in time a session was last active.
pub type ActivityTime = DateTime<FixedOffset>;

/// Bytes read per step when scanning backwards for the final line.
const TAIL_CHUNK: u64 = 8 * 1024;

/// Extract the activity instant from a decoded record.
///
/// Prefers `timestamp`, falls back to `snapshot.timestamp`. A record that is
/// not an object, has neither key, or holds an unparsable value yields `None`.
pub fn extract_timestamp(record: &Value) -> Option<ActivityTime> {
    let obj = record.as_object()?;
    let raw = match obj.get("timestamp") {
        Some(value) if !value.is_null() => value,
        _ => obj.get("snapshot")?.get("timestamp")?,
    };
    parse_instant(raw.as_str()?)
}

/// Parse a single log line into its activity instant.
pub fn last_record_instant(line: &str) -> Option<ActivityTime> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let record: Value = serde_json::from_str(line).ok()?;
    extract_timestamp(&record)
}

/// Activity instant of a local session log, read from its last line.
///
/// Missing, empty and unreadable files all yield `None`.
pub fn local_last_instant(path: &Path) -> Option<ActivityTime> {
    match read_last_line(path) {
        Ok(Some(line)) => last_record_instant(&line),
        Ok(None) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "could not read session tail");
            }
            None
        }
    }
}

fn parse_instant(raw: &str) -> Option<ActivityTime> {
    DateTime::parse_from_rfc3339(raw.trim()).ok()
}

/// Read the final line of a file without reading the whole file.
///
/// Mirrors `tail -n 1`: a single trailing newline is ignored, and an empty
/// final line yields `None`.
pub fn read_last_line(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(None);
    }

    let mut end = len;
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        end -= 1;
    }

    let mut line: Vec<u8> = Vec::new();
    let mut pos = end;
    while pos > 0 {
        let start = pos.saturating_sub(TAIL_CHUNK);
        let mut chunk = vec![0u8; (pos - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk)?;

        let newline = chunk.iter().rposition(|&b| b == b'\n');
        if let Some(idx) = newline {
            chunk.drain(..=idx);
        }
        chunk.extend_from_slice(&line);
        line = chunk;
        if newline.is_some() {
            break;
        }
        pos = start;
    }

    let text = String::from_utf8_lossy(&line);
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}
