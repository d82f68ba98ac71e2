//! Tagged error types for snapshot comparison and test failures.
//!
//! Snapshot failures are a distinct, matchable kind (not a stringly
//! assertion error): `SnapError::Missing` carries the file path the record
//! would live at, `SnapError::Mismatch` carries both serialized forms so a
//! surface can render a diff. Both answer `offers_update()` so a UI can
//! offer the "record snapshots" action.
//!
//! Plumbing I/O errors elsewhere in the crate stay on anyhow::Result.

use std::path::PathBuf;

use thiserror::Error;

/// Snapshot comparison failure.
#[derive(Debug, Clone, Error)]
pub enum SnapError {
    /// No record exists for this identity and update mode is off.
    #[error("missing snapshot '{identity}' (expected at {})", path.display())]
    Missing { identity: String, path: PathBuf },

    /// A record exists but its canonical serialization differs.
    #[error("snapshot mismatch for '{identity}'")]
    Mismatch {
        identity: String,
        /// Canonical serialization of the stored (expected) value.
        expected: String,
        /// Canonical serialization of the actual value.
        actual: String,
    },
}

impl SnapError {
    /// Whether a results surface should offer the snapshot-update action.
    /// True for both kinds: recording would make the test pass.
    pub fn offers_update(&self) -> bool {
        matches!(self, SnapError::Missing { .. } | SnapError::Mismatch { .. })
    }
}

/// Failure of a single test body (or of a hook charged to a test).
#[derive(Debug, Clone, Error)]
pub enum TestError {
    /// Plain assertion failure (check!/check_eq! or explicit fail).
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Snapshot comparison failure; kept as its own variant so callers
    /// can match it without string inspection.
    #[error(transparent)]
    Snapshot(#[from] SnapError),

    /// The body panicked; payload converted to text when possible.
    #[error("panicked: {0}")]
    Panic(String),
}

impl TestError {
    pub fn assertion<S: Into<String>>(msg: S) -> Self {
        TestError::Assertion(msg.into())
    }

    /// Convert a caught panic payload into a TestError.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TestError::Panic(msg)
    }

    /// Snapshot-update hint, lifted from the inner SnapError.
    pub fn offers_update(&self) -> bool {
        match self {
            TestError::Snapshot(e) => e.offers_update(),
            _ => false,
        }
    }
}
