//! Module system traits and shared types
//!
//! Defines the module lifecycle states, the error taxonomy of a single
//! module load attempt, and the callback contract the host implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::module::registry::RegistrySnapshot;

/// Contract version of the `[entry]` marker this host understands
pub const MODULE_API_VERSION: u32 = 1;

/// Module lifecycle state
///
/// `Discovered → Loading → {Loaded | Failed}`. `Internal` is an absorbing
/// initial state for built-in modules and is never entered from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleState {
    /// Archive parsed, not yet attempted in this pass
    Discovered,
    /// Bootstrap in progress
    Loading,
    /// Sub-container started
    Loaded,
    /// Load attempt failed; see the record's error
    Failed,
    /// Built-in module, always satisfied
    Internal,
}

impl ModuleState {
    /// Whether dependents may start on top of a module in this state
    pub fn is_satisfied(self) -> bool {
        matches!(self, ModuleState::Loaded | ModuleState::Internal)
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleState::Discovered => "discovered",
            ModuleState::Loading => "loading",
            ModuleState::Loaded => "loaded",
            ModuleState::Failed => "failed",
            ModuleState::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Errors of one module's load attempt
///
/// Every variant is local to the module it names: the orchestrator records
/// it on that module and carries on with the rest of the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("No module.toml found in archive {archive}")]
    DescriptorNotFound { archive: String },

    #[error("Invalid module descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Module {module} has no entry point (no type marked as module configuration)")]
    NoEntryPoint { module: String },

    #[error("Module {module} has more than one entry point: {}", .candidates.join(", "))]
    AmbiguousEntryPoint {
        module: String,
        candidates: Vec<String>,
    },

    #[error("Type {type_name} is marked as module configuration but has no [entry] marker")]
    NotAConfigurationClass { type_name: String },

    #[error(
        "Type {type_name} was built against an incompatible module API (found {}, expected {expected})",
        .found.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
    )]
    IncompatibleModuleApi {
        type_name: String,
        found: Option<u32>,
        expected: u32,
    },

    #[error("Module {module} failed to start: {reason}")]
    ModuleStartFailed { module: String, reason: String },

    #[error("Failed to extract archive {archive}: {reason}")]
    ExtractionFailed { archive: String, reason: String },

    #[error("Module {module} depends on {dependency}, which was never discovered")]
    MissingDependency { module: String, dependency: String },

    #[error("Module {module} depends on {dependency}, which failed to load: {reason}")]
    DependencyFailed {
        module: String,
        dependency: String,
        reason: String,
    },

    #[error("Cyclic module dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Load pass aborted: {0}")]
    PassAborted(String),
}

impl ModuleError {
    pub(crate) fn extraction(archive: impl std::fmt::Debug, reason: impl std::fmt::Display) -> Self {
        ModuleError::ExtractionFailed {
            archive: format!("{:?}", archive),
            reason: reason.to_string(),
        }
    }
}

/// Callback contract the host implements to consume load results
///
/// Invoked after every load pass with the full registry snapshot. Hosts use
/// it to let loaded modules register UI pages, device drivers, console
/// plugins and so on.
#[async_trait]
pub trait ModuleLifecycle: Send + Sync {
    /// Called once per completed load pass
    async fn modules_published(&self, snapshot: &RegistrySnapshot);
}
