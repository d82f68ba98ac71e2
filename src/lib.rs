#![allow(non_snake_case)]

// Base modules
pub mod consts;
pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;

// Core components
pub mod registry; // src/registry/mod.rs — deferred batch registration
pub mod engine;   // src/engine/{mod,exec}.rs — declaration tree + reference runner
pub mod run;      // src/run/mod.rs — run orchestrator
pub mod snapshot; // src/snapshot/{mod,format,store}.rs — snapshot store

// Helpers (now_millis, env_bool, ...)
pub mod util; // src/util/mod.rs

// Convenience re-exports
pub use config::{HarnessBuilder, HarnessConfig};
pub use errors::{SnapError, TestError};
pub use events::{RegistryEvent, RunEvent, SinkHandle, SinkRegistry, TestState};
pub use registry::{BatchDef, BatchOptions, BatchRegistry, NamespaceHost, OpenHost, SetHost};
pub use run::{RunOptions, RunOrchestrator, RunPhase, RunReport, RunStats};
pub use snapshot::{SnapshotRecord, SnapshotStore};

pub use engine::{DeclContext, TestCtx};
