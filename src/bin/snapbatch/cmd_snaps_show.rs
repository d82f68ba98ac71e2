use anyhow::{anyhow, Result};
use std::path::PathBuf;

use SnapBatch::snapshot::format;

pub fn exec(dir: PathBuf, identity: String) -> Result<()> {
    for (file, map) in format::read_snap_dir(&dir)? {
        if let Some(value) = map.get(&identity) {
            println!("{} (from {})", format::canonical(value), file.display());
            return Ok(());
        }
    }
    Err(anyhow!("no record '{}' under {}", identity, dir.display()))
}
