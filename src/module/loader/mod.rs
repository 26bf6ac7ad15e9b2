//! Module code loading
//!
//! Stages module archives into private working directories and resolves
//! code units and resources for each module in isolation.

pub mod code_loader;
pub mod extraction;
pub mod resolver;

pub use code_loader::ModuleCodeLoader;
pub use extraction::{create_working_dir, stage_archive};
pub use resolver::{CodeResolver, CodeUnit, HostResolver, Package, ResourceLocator};
