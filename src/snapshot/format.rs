//! Snapshot file format and canonical serialization.
//!
//! Format: <batch snap dir>/<name>.snap.json
//! {
//!   "<record identity>": <recorded JSON value>,
//!   ...
//! }
//!
//! Notes:
//! - Comparison is textual over the canonical form below, so recorded
//!   values survive a disk round-trip without reference identity.
//! - Writes merge into the existing object (unrelated records in the same
//!   file are preserved) and are atomic via tmp+rename.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::consts::SNAP_FILE_EXT;

/// Canonical, stable serialization of a value.
///
/// serde_json::Value objects are BTreeMap-backed, so pretty-printing yields
/// a key-order-insensitive text: two structurally equal values always
/// canonicalize to the same string.
pub fn canonical(value: &Value) -> String {
    serde_json::to_string_pretty(value)
        .expect("serde_json::Value serialization cannot fail")
}

fn is_snap_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(&format!(".{SNAP_FILE_EXT}")))
        .unwrap_or(false)
}

/// Parse one snapshot file into identity -> value.
pub fn read_snap_file(path: &Path) -> Result<BTreeMap<String, Value>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let map: BTreeMap<String, Value> =
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
    Ok(map)
}

/// Snapshot files in a directory, sorted by file name so load order is
/// deterministic. A missing directory is an empty result, not an error
/// (the batch simply has no recordings yet).
pub fn list_snap_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_snap_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Parse every snapshot file in a directory.
pub fn read_snap_dir(dir: &Path) -> Result<Vec<(PathBuf, BTreeMap<String, Value>)>> {
    let files = list_snap_files(dir)?;
    let mut out = Vec::with_capacity(files.len());
    for f in files {
        let map = read_snap_file(&f)?;
        out.push((f, map));
    }
    Ok(out)
}

/// Merge `updates` into the file's existing object and persist atomically.
/// Records already in the file and absent from `updates` are kept.
pub fn merge_into_file(path: &Path, updates: &BTreeMap<String, Value>) -> Result<()> {
    let mut merged = if path.exists() {
        read_snap_file(path)?
    } else {
        BTreeMap::new()
    };
    for (k, v) in updates {
        merged.insert(k.clone(), v.clone());
    }

    let dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let tmp = path.with_extension("json.tmp");
    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .with_context(|| format!("open {}", tmp.display()))?;

    let data = serde_json::to_vec_pretty(&merged)
        .with_context(|| format!("serialize {}", path.display()))?;
    f.write_all(&data)?;
    let _ = f.sync_all();

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_ignores_key_order() {
        let a = json!({"b": 1, "a": [1, 2, {"z": true, "y": null}]});
        let b = json!({"a": [1, 2, {"y": null, "z": true}], "b": 1});
        assert_eq!(canonical(&a), canonical(&b));
    }

    #[test]
    fn canonical_distinguishes_values() {
        assert_ne!(canonical(&json!({"a": 1})), canonical(&json!({"a": 2})));
        assert_ne!(canonical(&json!(1)), canonical(&json!("1")));
    }

    #[test]
    fn list_snap_files_filters_and_sorts() {
        let dir = std::env::temp_dir().join(format!(
            "sb-fmt-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.snap.json"), b"{}").unwrap();
        fs::write(dir.join("a.snap.json"), b"{}").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();

        let files = list_snap_files(&dir).unwrap();
        let names: Vec<&str> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.snap.json", "b.snap.json"]);

        assert!(list_snap_files(&dir.join("missing")).unwrap().is_empty());
    }
}
