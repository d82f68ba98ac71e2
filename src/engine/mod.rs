//! engine — declaration tree and execution contexts.
//!
//! The orchestrator treats the BDD engine as a capability set: a way to
//! declare suites/tests/hooks and a way to run the resulting tree. This
//! module is that boundary. Registration callbacks receive a DeclContext
//! and build an explicit tree; exec.rs walks it.
//!
//! Ownership tagging: every node created through a DeclContext carries the
//! batch key the context was built for. The key is threaded explicitly
//! through child contexts (never captured in shared mutable closures), so
//! one batch's declarations can never leak into another's.

pub mod exec;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::consts::TITLE_JOINER;
use crate::errors::TestError;
use crate::snapshot::SnapshotStore;

/// Per-suite hook set. `*_each` hooks accumulate down the tree; `*_all`
/// run once at suite entry/exit.
pub type HookFn = Arc<dyn Fn() -> Result<(), TestError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct Hooks {
    pub before_all: Vec<HookFn>,
    pub after_all: Vec<HookFn>,
    pub before_each: Vec<HookFn>,
    pub after_each: Vec<HookFn>,
}

/// Body of a declared test. Pending tests have no body and report the
/// Pending state instead of running.
#[derive(Clone)]
pub enum TestBody {
    Pending,
    Run(Arc<dyn Fn(&mut TestCtx) -> Result<(), TestError> + Send + Sync>),
}

#[derive(Clone)]
pub struct TestNode {
    pub title: String,
    pub batch_key: String,
    /// Snapshot directory of the owning batch, resolved at declaration.
    pub snap_dir: PathBuf,
    pub body: TestBody,
}

#[derive(Clone)]
pub enum Node {
    Suite(SuiteNode),
    Test(TestNode),
}

#[derive(Clone)]
pub struct SuiteNode {
    pub title: String,
    pub batch_key: String,
    /// Synthetic per-batch wrapper; excluded from user-facing display and
    /// from snapshot identities.
    pub is_batch_root: bool,
    /// Set when the batch's registration callback failed: the suite as a
    /// whole is reported failed and its children are not executed.
    pub failure: Option<TestError>,
    pub hooks: Hooks,
    pub children: Vec<Node>,
}

impl SuiteNode {
    pub fn new(title: &str, batch_key: &str) -> Self {
        Self {
            title: title.to_string(),
            batch_key: batch_key.to_string(),
            is_batch_root: false,
            failure: None,
            hooks: Hooks::default(),
            children: Vec::new(),
        }
    }

    pub fn batch_root(title: &str, batch_key: &str) -> Self {
        let mut s = Self::new(title, batch_key);
        s.is_batch_root = true;
        s
    }

    /// Total declared (non-pending and pending) tests under this node.
    pub fn test_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                Node::Test(_) => 1,
                Node::Suite(s) => s.test_count(),
            })
            .sum()
    }
}

/// Declaration context handed to registration callbacks.
///
/// Suites and tests nest in declaration order; that order is exactly the
/// execution order (depth-first, no reordering).
pub struct DeclContext<'a> {
    node: &'a mut SuiteNode,
    batch_key: String,
    snap_dir: PathBuf,
}

impl<'a> DeclContext<'a> {
    pub fn new(node: &'a mut SuiteNode, batch_key: &str, snap_dir: &Path) -> Self {
        Self {
            node,
            batch_key: batch_key.to_string(),
            snap_dir: snap_dir.to_path_buf(),
        }
    }

    /// Owning batch of everything declared through this context.
    pub fn batch_key(&self) -> &str {
        &self.batch_key
    }

    /// Snapshot directory assertions in this batch resolve against.
    pub fn snap_dir(&self) -> &Path {
        &self.snap_dir
    }

    /// Declare a nested suite; `f` declares its content immediately.
    pub fn suite<F>(&mut self, title: &str, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut DeclContext) -> anyhow::Result<()>,
    {
        let mut child = SuiteNode::new(title, &self.batch_key);
        {
            let mut ctx = DeclContext::new(&mut child, &self.batch_key, &self.snap_dir);
            f(&mut ctx)?;
        }
        self.node.children.push(Node::Suite(child));
        Ok(())
    }

    /// Declare a test.
    pub fn test<F>(&mut self, title: &str, body: F)
    where
        F: Fn(&mut TestCtx) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.node.children.push(Node::Test(TestNode {
            title: title.to_string(),
            batch_key: self.batch_key.clone(),
            snap_dir: self.snap_dir.clone(),
            body: TestBody::Run(Arc::new(body)),
        }));
    }

    /// Declare a pending (not yet implemented) test.
    pub fn pending(&mut self, title: &str) {
        self.node.children.push(Node::Test(TestNode {
            title: title.to_string(),
            batch_key: self.batch_key.clone(),
            snap_dir: self.snap_dir.clone(),
            body: TestBody::Pending,
        }));
    }

    pub fn before_all<F>(&mut self, f: F)
    where
        F: Fn() -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.node.hooks.before_all.push(Arc::new(f));
    }

    pub fn after_all<F>(&mut self, f: F)
    where
        F: Fn() -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.node.hooks.after_all.push(Arc::new(f));
    }

    pub fn before_each<F>(&mut self, f: F)
    where
        F: Fn() -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.node.hooks.before_each.push(Arc::new(f));
    }

    pub fn after_each<F>(&mut self, f: F)
    where
        F: Fn() -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.node.hooks.after_each.push(Arc::new(f));
    }
}

/// Execution context handed to test bodies: assertion entry points plus
/// the snapshot primitives, scoped to the owning batch's directory and the
/// test's full hierarchical title.
pub struct TestCtx<'a> {
    store: &'a mut SnapshotStore,
    snap_dir: &'a Path,
    full_title: &'a str,
}

impl<'a> TestCtx<'a> {
    pub(crate) fn new(store: &'a mut SnapshotStore, snap_dir: &'a Path, full_title: &'a str) -> Self {
        Self {
            store,
            snap_dir,
            full_title,
        }
    }

    /// Full hierarchical title (batch-root titles excluded).
    pub fn full_title(&self) -> &str {
        self.full_title
    }

    /// Assert that `value` matches the recorded snapshot for this test.
    /// Identity is the full hierarchical title.
    pub fn snapshot<T: Serialize>(&mut self, value: &T) -> Result<(), TestError> {
        let identity = self.full_title.to_string();
        self.compare(&identity, value)
    }

    /// Like `snapshot`, with an extra name for tests asserting several
    /// values: identity is "<full title> / <name>".
    pub fn named_snapshot<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), TestError> {
        let identity = format!("{}{}{}", self.full_title, TITLE_JOINER, name);
        self.compare(&identity, value)
    }

    fn compare<T: Serialize>(&mut self, identity: &str, value: &T) -> Result<(), TestError> {
        let v = serde_json::to_value(value)
            .map_err(|e| TestError::assertion(format!("snapshot value is not serializable: {e}")))?;
        self.store
            .compare(self.snap_dir, identity, &v)
            .map_err(TestError::from)
    }

    /// Explicit failure with a message.
    pub fn fail<S: Into<String>>(&self, msg: S) -> Result<(), TestError> {
        Err(TestError::assertion(msg))
    }
}

/// Assert a condition inside a test body; returns TestError::Assertion on
/// failure. With extra arguments, formats the failure message.
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            return Err($crate::errors::TestError::assertion(concat!(
                "check failed: ",
                stringify!($cond)
            )));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::errors::TestError::assertion(format!($($arg)+)));
        }
    };
}

/// Assert equality inside a test body; the message carries both sides.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr) => {{
        let (l, r) = (&$left, &$right);
        if l != r {
            return Err($crate::errors::TestError::assertion(format!(
                "check_eq failed: {:?} != {:?}",
                l, r
            )));
        }
    }};
}
