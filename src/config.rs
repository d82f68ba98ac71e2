//! Centralized configuration and builder for SnapBatch.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - HarnessConfig::from_env() reads the SB_* env vars; fluent with_* and
//!   HarnessBuilder allow programmatic overrides on top of that.
//!
//! Tunables:
//! - snap_root: root directory default snapshot directories hang off.
//!   Env: SB_SNAP_ROOT (default "snapshots").
//! - update_snapshots: pre-arm the one-shot snapshot update flag for the
//!   next run. Env: SB_UPDATE_SNAPSHOTS (default false).
//! - known_namespaces: optional comma-separated namespace allow-list used
//!   for soft key validation. Env: SB_KNOWN_NAMESPACES (default: accept
//!   everything).

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::consts::{
    DEFAULT_SNAP_ROOT, ENV_KNOWN_NAMESPACES, ENV_SNAP_ROOT, ENV_UPDATE_SNAPSHOTS,
};
use crate::util::env_bool;

/// Top-level configuration for the harness (registry + orchestrator + store).
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Root under which default batch snapshot directories are derived.
    /// Env: SB_SNAP_ROOT (default "snapshots")
    pub snap_root: PathBuf,

    /// Pre-arm the sticky one-shot update flag for the next run.
    /// Env: SB_UPDATE_SNAPSHOTS (default false; "1|true|on|yes" => true)
    pub update_snapshots: bool,

    /// Optional namespace allow-list for soft batch-key validation.
    /// None means every namespace is accepted without warning.
    /// Env: SB_KNOWN_NAMESPACES = "ns1,ns2,..." (default None)
    pub known_namespaces: Option<HashSet<String>>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            snap_root: PathBuf::from(DEFAULT_SNAP_ROOT),
            update_snapshots: false,
            known_namespaces: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var(ENV_SNAP_ROOT) {
            let s = v.trim();
            if !s.is_empty() {
                cfg.snap_root = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var(ENV_UPDATE_SNAPSHOTS) {
            cfg.update_snapshots = env_bool(&v);
        }

        if let Ok(v) = std::env::var(ENV_KNOWN_NAMESPACES) {
            let set: HashSet<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !set.is_empty() {
                cfg.known_namespaces = Some(set);
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_snap_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.snap_root = root.into();
        self
    }

    pub fn with_update_snapshots(mut self, on: bool) -> Self {
        self.update_snapshots = on;
        self
    }

    pub fn with_known_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_namespaces = Some(namespaces.into_iter().map(Into::into).collect());
        self
    }
}

impl fmt::Display for HarnessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HarnessConfig {{ snap_root: {}, update_snapshots: {}, known_namespaces: {} }}",
            self.snap_root.display(),
            self.update_snapshots,
            self.known_namespaces
                .as_ref()
                .map(|s| {
                    let mut v: Vec<&str> = s.iter().map(|x| x.as_str()).collect();
                    v.sort_unstable();
                    v.join(",")
                })
                .unwrap_or_else(|| "any".to_string()),
        )
    }
}

/// Lightweight builder that produces a HarnessConfig.
#[derive(Clone, Debug)]
pub struct HarnessBuilder {
    cfg: HarnessConfig,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: HarnessConfig::from_env(),
        }
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: HarnessConfig::default(),
        }
    }

    pub fn snap_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.cfg.snap_root = root.into();
        self
    }

    pub fn update_snapshots(mut self, on: bool) -> Self {
        self.cfg.update_snapshots = on;
        self
    }

    pub fn known_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.known_namespaces = Some(namespaces.into_iter().map(Into::into).collect());
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> HarnessConfig {
        self.cfg
    }
}
