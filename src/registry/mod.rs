//! registry — deferred batch registration.
//!
//! A batch is a named group of suites/tests registered ahead of time and
//! compiled into a run only when selected. The registry is a replace-by-key,
//! insertion-ordered mapping from batch key to an immutable BatchDef; the
//! iteration order is load-bearing (it is the default run order).
//!
//! Failure policy: register() never fails. All key validation is soft —
//! a third party registering a batch at module-load time must not be able
//! to crash the host by mistyping a key. Problems surface as log warnings
//! and RegistryEvent::Warning on the sink registry.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use log::warn;

use crate::consts::KEY_SEPARATOR;
use crate::engine::DeclContext;
use crate::events::{RegistryEvent, SinkRegistry};
use crate::metrics;

/// Registration callback: invoked lazily, once per run that includes the
/// batch, to declare suites/tests into the run context.
pub type RegistrationFn = Arc<dyn Fn(&mut DeclContext) -> anyhow::Result<()> + Send + Sync>;

/// Host-side namespace validation. The host decides which namespaces are
/// known; unknown ones only produce a warning, never a failure.
pub trait NamespaceHost: Send + Sync {
    fn is_known_namespace(&self, ns: &str) -> bool;
}

/// Default host: every namespace is known.
pub struct OpenHost;

impl NamespaceHost for OpenHost {
    fn is_known_namespace(&self, _ns: &str) -> bool {
        true
    }
}

/// Host backed by an explicit namespace allow-list.
pub struct SetHost {
    namespaces: HashSet<String>,
}

impl SetHost {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }
}

impl NamespaceHost for SetHost {
    fn is_known_namespace(&self, ns: &str) -> bool {
        self.namespaces.contains(ns)
    }
}

/// Optional per-batch settings for register().
#[derive(Clone, Default)]
pub struct BatchOptions {
    /// Human-facing name; defaults to the key.
    pub display_name: Option<String>,
    /// Explicit snapshot directory; None means the store derives it
    /// deterministically from the key.
    pub snap_dir: Option<PathBuf>,
    /// Initial UI selection state; display-only, default true.
    pub pre_selected: Option<bool>,
}

/// One registered batch. Immutable once stored; re-registering the same
/// key replaces the whole entry.
#[derive(Clone)]
pub struct BatchDef {
    pub key: String,
    pub display_name: String,
    pub snap_dir: Option<PathBuf>,
    pub pre_selected: bool,
    pub callback: RegistrationFn,
}

impl std::fmt::Debug for BatchDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDef")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("snap_dir", &self.snap_dir)
            .field("pre_selected", &self.pre_selected)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered batch registry.
pub struct BatchRegistry {
    defs: IndexMap<String, BatchDef>,
    host: Box<dyn NamespaceHost>,
    sinks: Arc<SinkRegistry<RegistryEvent>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::with_host(Box::new(OpenHost))
    }

    pub fn with_host(host: Box<dyn NamespaceHost>) -> Self {
        Self {
            defs: IndexMap::new(),
            host,
            sinks: SinkRegistry::new(),
        }
    }

    /// Sink registry for change/warning notifications (results surface).
    pub fn sinks(&self) -> &Arc<SinkRegistry<RegistryEvent>> {
        &self.sinks
    }

    /// Register (or replace) a batch. Never fails; validation is soft.
    ///
    /// - A key without a `<namespace>.<identifier>` separator warns.
    /// - A namespace the host does not know warns.
    /// - An existing key warns and is replaced in its original insertion
    ///   position, so default run order stays stable across re-registration.
    pub fn register<F>(&mut self, key: &str, callback: F, options: BatchOptions)
    where
        F: Fn(&mut DeclContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_key(key);

        if self.defs.contains_key(key) {
            self.warn(format!("batch '{}' already exists; replacing", key));
            metrics::record_registry_overwrite();
        }

        let def = BatchDef {
            key: key.to_string(),
            display_name: options.display_name.unwrap_or_else(|| key.to_string()),
            snap_dir: options.snap_dir,
            pre_selected: options.pre_selected.unwrap_or(true),
            callback: Arc::new(callback),
        };

        // IndexMap keeps the original position on replace.
        self.defs.insert(key.to_string(), def);
        metrics::record_batch_registered();

        self.sinks.publish(&RegistryEvent::Changed {
            key: key.to_string(),
        });
    }

    pub fn get(&self, key: &str) -> Option<&BatchDef> {
        self.defs.get(key)
    }

    /// Keys in insertion order (default run order).
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.defs.keys().map(|k| k.as_str())
    }

    /// Definitions in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &BatchDef> + '_ {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    fn validate_key(&self, key: &str) {
        match key.split_once(KEY_SEPARATOR) {
            None => {
                self.warn(format!(
                    "batch key '{}' has no '{}' namespace separator",
                    key, KEY_SEPARATOR
                ));
            }
            Some((ns, id)) => {
                if ns.is_empty() || id.is_empty() {
                    self.warn(format!(
                        "batch key '{}' has an empty namespace or identifier",
                        key
                    ));
                } else if !self.host.is_known_namespace(ns) {
                    self.warn(format!("batch key '{}' uses unknown namespace '{}'", key, ns));
                }
            }
        }
    }

    fn warn(&self, message: String) {
        warn!("{}", message);
        metrics::record_registry_warning();
        self.sinks.publish(&RegistryEvent::Warning { message });
    }
}

impl Default for BatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn noop(_: &mut DeclContext) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn insertion_order_survives_replacement() {
        let mut reg = BatchRegistry::new();
        reg.register("a.one", noop, BatchOptions::default());
        reg.register("b.two", noop, BatchOptions::default());
        reg.register("a.one", noop, BatchOptions::default());

        let keys: Vec<&str> = reg.keys().collect();
        assert_eq!(keys, vec!["a.one", "b.two"]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn defaults_fill_in() {
        let mut reg = BatchRegistry::new();
        reg.register("demo.case", noop, BatchOptions::default());
        let def = reg.get("demo.case").expect("registered");
        assert_eq!(def.display_name, "demo.case");
        assert!(def.snap_dir.is_none());
        assert!(def.pre_selected);
    }

    #[test]
    fn unknown_namespace_warns_but_registers() {
        let mut reg = BatchRegistry::with_host(Box::new(SetHost::new(["known"])));
        let warnings = std::sync::Arc::new(AtomicU64::new(0));
        let w = warnings.clone();
        let _h = reg.sinks().subscribe(move |ev| {
            if matches!(ev, RegistryEvent::Warning { .. }) {
                w.fetch_add(1, Ordering::Relaxed);
            }
        });

        reg.register("stranger.case", noop, BatchOptions::default());
        assert!(reg.get("stranger.case").is_some(), "registration proceeds");
        assert_eq!(warnings.load(Ordering::Relaxed), 1);

        reg.register("known.case", noop, BatchOptions::default());
        assert_eq!(warnings.load(Ordering::Relaxed), 1, "known namespace is quiet");
    }

    #[test]
    fn missing_separator_warns() {
        let mut reg = BatchRegistry::new();
        let warnings = std::sync::Arc::new(AtomicU64::new(0));
        let w = warnings.clone();
        let _h = reg.sinks().subscribe(move |ev| {
            if matches!(ev, RegistryEvent::Warning { .. }) {
                w.fetch_add(1, Ordering::Relaxed);
            }
        });
        reg.register("nodots", noop, BatchOptions::default());
        assert_eq!(warnings.load(Ordering::Relaxed), 1);
        assert!(reg.get("nodots").is_some());
    }
}
