//! snapshot — the store behind snapshot assertions.
//!
//! Split into submodules:
//! - format.rs — on-disk layout: one JSON object per *.snap.json file
//!   (identity -> recorded value), canonical pretty-printing, merge writes.
//! - store.rs  — in-memory per-directory cache, compare(), dirty tracking,
//!   update_snapshots() persistence, the sticky one-shot update flag.

pub mod format;
pub mod store;

pub use store::{SnapshotRecord, SnapshotStore};
