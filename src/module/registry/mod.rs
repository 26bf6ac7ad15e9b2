//! Module registry and discovery
//!
//! Handles archive discovery, descriptor reading, and the per-module records
//! the orchestrator drives through their lifecycle.

pub mod descriptor;
pub mod discovery;
pub mod manifest;
pub mod record;

pub use descriptor::ModuleDescriptor;
pub use discovery::ArchiveStore;
pub use manifest::ModuleManifest;
pub use record::{ModuleRecord, ModuleView, Registry, RegistrySnapshot};
