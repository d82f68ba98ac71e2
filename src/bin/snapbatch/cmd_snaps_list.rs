use anyhow::Result;
use std::path::PathBuf;

use SnapBatch::snapshot::format;

pub fn exec(dir: PathBuf) -> Result<()> {
    let files = format::read_snap_dir(&dir)?;
    if files.is_empty() {
        println!("no snapshot files in {}", dir.display());
        return Ok(());
    }
    for (file, map) in files {
        println!("{} ({} record(s))", file.display(), map.len());
        for identity in map.keys() {
            println!("  {}", identity);
        }
    }
    Ok(())
}
