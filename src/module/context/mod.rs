//! Module dependency-injection contexts
//!
//! Host root container, per-module sub-containers, and the builder that
//! bootstraps a module's container from its entry-point type.

pub mod builder;
pub mod component;
pub mod container;
pub mod entry;
pub mod environment;
pub mod host;

pub use builder::{EntryPoint, ModuleContextBuilder, ENV_OVERRIDES_SOURCE};
pub use component::{bean, component_fn, Bean, Component, ComponentCatalog, ComponentContext};
pub use container::{Container, ContainerBuilder};
pub use entry::{EnvOverride, TypeDescriptor};
pub use environment::{
    Environment, EnvironmentProvider, LayeredEnvironment, PropertySource, SystemEnvironment,
};
pub use host::HostContext;
