//! Dynamic module loader
//!
//! Modules are zip archives dropped beside the hub. Each one is staged into
//! a private working directory, gets its own isolated code loader, and is
//! bootstrapped into a dependency-injection sub-container of the host's root
//! container, dependencies first.
//!
//! ## Architecture
//!
//! - **Registry**: archive discovery, `module.toml` descriptors, per-module records
//! - **Loader**: working directories and isolated code resolution
//! - **Context**: environments, containers, entry-point bootstrapping
//! - **Orchestrator**: dependency-ordered load passes with failure isolation
//! - **Manager**: async facade serializing passes and notifying the host

pub mod context;
pub mod loader;
pub mod manager;
pub mod orchestrator;
pub mod registry;
pub mod traits;
pub mod validation;

pub use context::{
    Container, ContainerBuilder, Environment, EnvironmentProvider, HostContext,
    ModuleContextBuilder,
};
pub use loader::{CodeResolver, CodeUnit, HostResolver, ModuleCodeLoader, ResourceLocator};
pub use manager::ModuleManager;
pub use orchestrator::{LoadReport, ModuleOrchestrator};
pub use registry::{ArchiveStore, ModuleDescriptor, ModuleView, Registry, RegistrySnapshot};
pub use traits::{ModuleError, ModuleLifecycle, ModuleState, MODULE_API_VERSION};
