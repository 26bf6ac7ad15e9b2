//! Components the host can instantiate inside module containers
//!
//! Module archives describe their types; the behaviour behind a type name is
//! trusted code registered by the host in a [`ComponentCatalog`]. A module
//! container instantiates the catalog components whose types the module
//! actually ships.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::module::context::container::Container;
use crate::module::context::environment::Environment;
use crate::module::loader::{CodeUnit, ModuleCodeLoader, ResourceLocator};

/// A started component instance
pub type Bean = Arc<dyn Any + Send + Sync>;

/// Factory for one component type
pub trait Component: Send + Sync {
    /// Create the component's bean inside a starting container
    fn create(&self, ctx: &ComponentContext<'_>) -> anyhow::Result<Bean>;
}

impl<F> Component for F
where
    F: Fn(&ComponentContext<'_>) -> anyhow::Result<Bean> + Send + Sync,
{
    fn create(&self, ctx: &ComponentContext<'_>) -> anyhow::Result<Bean> {
        self(ctx)
    }
}

/// Pin a closure's signature so it can be registered as a [`Component`]
pub fn component_fn<F>(f: F) -> F
where
    F: Fn(&ComponentContext<'_>) -> anyhow::Result<Bean> + Send + Sync,
{
    f
}

/// Wrap a value as a [`Bean`]
pub fn bean<T: Any + Send + Sync>(value: T) -> Bean {
    Arc::new(value)
}

/// What a component sees while it is being created
pub struct ComponentContext<'a> {
    pub(crate) container_name: &'a str,
    pub(crate) type_name: &'a str,
    pub(crate) environment: &'a Environment,
    pub(crate) loader: Option<&'a ModuleCodeLoader>,
    pub(crate) parent: Option<&'a Container>,
    pub(crate) beans: &'a HashMap<String, Bean>,
}

impl<'a> ComponentContext<'a> {
    /// Name of the container being started (the module id for modules)
    pub fn container_name(&self) -> &str {
        self.container_name
    }

    /// Type name of the component being created
    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn environment(&self) -> &Environment {
        self.environment
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.environment.property(key)
    }

    /// Look up a code unit or resource through the module's loader
    pub fn resource(&self, name: &str) -> Option<Arc<CodeUnit>> {
        self.loader.and_then(|loader| loader.load(name))
    }

    pub fn locate(&self, name: &str) -> Option<ResourceLocator> {
        self.loader.and_then(|loader| loader.locate(name))
    }

    /// Bean created earlier in this container, else from the parent chain
    pub fn bean<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        if let Some(bean) = self.beans.get(name) {
            return Arc::clone(bean).downcast::<T>().ok();
        }
        self.parent.and_then(|parent| parent.bean::<T>(name))
    }
}

/// Host registry of component factories keyed by type name
#[derive(Default, Clone)]
pub struct ComponentCatalog {
    components: HashMap<String, Arc<dyn Component>>,
}

impl fmt::Debug for ComponentCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.components.keys().collect();
        names.sort();
        f.debug_struct("ComponentCatalog").field("types", &names).finish()
    }
}

impl ComponentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a type name; a later registration replaces it
    pub fn register<C>(&mut self, type_name: impl Into<String>, component: C)
    where
        C: Component + 'static,
    {
        self.components.insert(type_name.into(), Arc::new(component));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<C>(mut self, type_name: impl Into<String>, component: C) -> Self
    where
        C: Component + 'static,
    {
        self.register(type_name, component);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.components.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
