use crate::session::{SessionSnapshot, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn app_dir() -> PathBuf {
    home_dir().join(".tablechat")
}

fn session_path() -> PathBuf {
    app_dir().join("session.json")
}

fn greeting_flag_path() -> PathBuf {
    app_dir().join("greeted")
}

fn prefs_path() -> PathBuf {
    app_dir().join("prefs.json")
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prefs {
    #[serde(default)]
    pub dark_mode: bool,
}

pub fn ensure_app_dir() -> io::Result<PathBuf> {
    let dir = app_dir();
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = ensure_app_dir()?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("out");
    let tmp_path = dir.join(format!("{file_name}.tmp"));

    fs::write(&tmp_path, bytes)?;
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path)?;
                fs::rename(&tmp_path, path)?;
                Ok(())
            } else {
                Err(rename_err)
            }
        }
    }
}

fn read_snapshot_file(path: &Path) -> Result<SessionSnapshot, String> {
    let data = fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let snapshot: SessionSnapshot = serde_json::from_slice(&data)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))?;
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(format!(
            "unknown schema_version in {}: {}",
            path.display(),
            snapshot.schema_version
        ));
    }
    Ok(snapshot)
}

/// Persist the snapshot; an empty session removes the file instead so a
/// later start is a clean fresh state.
pub fn save_session(snapshot: &SessionSnapshot) -> io::Result<()> {
    if snapshot.is_empty() {
        return clear_session();
    }
    let bytes = serde_json::to_vec_pretty(snapshot)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    write_atomic(&session_path(), &bytes)
}

/// A missing or malformed snapshot is "no session", never an error; the
/// corrupt file is discarded so it cannot poison the next start either.
pub fn load_session() -> (Option<SessionSnapshot>, Option<String>) {
    let path = session_path();
    if !path.exists() {
        return (None, None);
    }
    match read_snapshot_file(&path) {
        Ok(snapshot) => (Some(snapshot), None),
        Err(warning) => {
            let _ = fs::remove_file(&path);
            (None, Some(warning))
        }
    }
}

pub fn clear_session() -> io::Result<()> {
    let path = session_path();
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

pub fn greeting_shown() -> bool {
    greeting_flag_path().exists()
}

pub fn mark_greeting_shown() {
    if ensure_app_dir().is_ok() {
        let _ = fs::write(greeting_flag_path(), b"true");
    }
}

pub fn load_prefs() -> Prefs {
    let path = prefs_path();
    let Ok(data) = fs::read(&path) else {
        return Prefs::default();
    };
    serde_json::from_slice(&data).unwrap_or_default()
}

pub fn save_prefs(prefs: &Prefs) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(prefs)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    write_atomic(&prefs_path(), &bytes)
}

#[cfg(test)]
mod tests {
    use super::read_snapshot_file;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "tablechat_store_{prefix}_{}_{}.json",
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn read_snapshot_file_loads_a_full_session() {
        let path = temp_file("full");
        let data = r#"{
  "schema_version": 1,
  "messages": [
    { "sender": "user", "body": { "kind": "text", "text": "sort it" }, "timestamp": "1" },
    { "sender": "system", "body": { "kind": "text", "text": "done" }, "timestamp": "2" }
  ],
  "workspace": [
    { "name": "sales.csv", "originalData": "a,b\n1,2", "currentData": "a,b\n2,1" }
  ],
  "activeTableName": "sales.csv"
}"#;
        fs::write(&path, data).expect("session fixture should write");

        let snapshot = read_snapshot_file(&path).expect("session should load");
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.active_table_name, "sales.csv");
        assert_eq!(
            snapshot.workspace.get("sales.csv").map(|table| table.current_data.as_str()),
            Some("a,b\n2,1")
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_snapshot_file_rejects_malformed_json() {
        let path = temp_file("malformed");
        fs::write(&path, "{ not json").expect("fixture should write");

        let error = read_snapshot_file(&path).expect_err("malformed session should fail");
        assert!(error.contains("failed to parse"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_snapshot_file_rejects_unknown_schema() {
        let path = temp_file("unknown");
        let data = r#"{
  "schema_version": 99,
  "messages": [],
  "workspace": [],
  "activeTableName": ""
}"#;
        fs::write(&path, data).expect("fixture should write");

        let error = read_snapshot_file(&path).expect_err("unknown schema should fail");
        assert!(error.contains("unknown schema_version"));

        let _ = fs::remove_file(path);
    }
}
