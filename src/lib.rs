//! homehub-modules - dynamic module loader for the HomeHub control hub
//!
//! Optional hub features (device drivers, UI pages, console plugins) ship as
//! zip archives dropped beside the host. This crate discovers those archives,
//! stages each into a private working directory, gives every module an
//! isolated code loader, resolves inter-module dependencies, and starts a
//! dependency-injection sub-container per module on top of the host's root
//! container while the host keeps running.
//!
//! ## Design Principles
//!
//! 1. **Failure Isolation**: a broken module never stops its siblings or the host
//! 2. **Dependencies First**: a module starts only after everything it declares
//! 3. **Isolated Resolution**: own archive first, then explicitly wired delegates
//! 4. **Trusted Modules**: modules run in the host's address space, no sandbox

pub mod config;
pub mod module;
pub mod utils;

pub use config::{HubConfig, LoggingConfig, ModuleConfig};
pub use module::{
    ArchiveStore, Container, HostContext, LoadReport, ModuleError, ModuleLifecycle,
    ModuleManager, ModuleOrchestrator, ModuleState, RegistrySnapshot,
};
