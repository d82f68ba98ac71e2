use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use SnapBatch::snapshot::format;

/// Parse-check every snapshot file in the directory. Corrupt files are
/// reported, not fatal: the point is a full report in one pass.
pub fn exec(dir: PathBuf, json_out: bool) -> Result<()> {
    let files = format::list_snap_files(&dir)?;

    let mut ok = 0usize;
    let mut corrupt = 0usize;
    let mut records = 0usize;
    let mut reports = Vec::new();

    for file in &files {
        match format::read_snap_file(file) {
            Ok(map) => {
                ok += 1;
                records += map.len();
                reports.push(json!({
                    "file": file.display().to_string(),
                    "ok": true,
                    "records": map.len(),
                }));
            }
            Err(e) => {
                corrupt += 1;
                reports.push(json!({
                    "file": file.display().to_string(),
                    "ok": false,
                    "error": format!("{e:#}"),
                }));
            }
        }
    }

    if json_out {
        let report = json!({
            "dir": dir.display().to_string(),
            "files_ok": ok,
            "files_corrupt": corrupt,
            "records": records,
            "files": reports,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("doctor: {}", dir.display());
        for r in &reports {
            if r["ok"].as_bool().unwrap_or(false) {
                println!("  ok      {} ({} record(s))", r["file"].as_str().unwrap_or(""), r["records"]);
            } else {
                println!("  CORRUPT {} : {}", r["file"].as_str().unwrap_or(""), r["error"]);
            }
        }
        println!("{} file(s) ok, {} corrupt, {} record(s)", ok, corrupt, records);
    }
    Ok(())
}
