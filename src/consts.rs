//! Shared constants (batch keys, batch-root naming, snapshot files, env vars).

// -------- Batch keys --------
// Convention: <namespace>.<identifier>. The namespace is everything before
// the first separator; validation against the host namespace set is soft.
pub const KEY_SEPARATOR: char = '.';

// -------- Batch-root suites --------
// Synthetic suite wrapping one batch's declarations: "<key>_root".
// Tagged is_batch_root and excluded from user-facing display.
pub const BATCH_ROOT_SUFFIX: &str = "_root";

// -------- Snapshot files --------
// Each file under a batch snapshot directory is one JSON object
// mapping record identity -> recorded value. Persistence merges into
// the existing object instead of overwriting the file.
pub const SNAP_FILE_EXT: &str = "snap.json";
pub const SNAP_DEFAULT_FILE: &str = "default.snap.json";

// Joiner for hierarchical test titles used as snapshot identities.
pub const TITLE_JOINER: &str = " / ";

// -------- Environment --------
pub const ENV_SNAP_ROOT: &str = "SB_SNAP_ROOT";
pub const ENV_UPDATE_SNAPSHOTS: &str = "SB_UPDATE_SNAPSHOTS";
pub const ENV_KNOWN_NAMESPACES: &str = "SB_KNOWN_NAMESPACES";

// Default snapshot root when SB_SNAP_ROOT is not set.
pub const DEFAULT_SNAP_ROOT: &str = "snapshots";
