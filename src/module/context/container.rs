//! Dependency-injection containers
//!
//! The host owns one root [`Container`]. Each loaded module gets a child
//! container whose parent is the root, whose code scope is the module's
//! isolated loader, and whose environment layers the module's overrides in
//! front of the host's property sources.

use anyhow::{anyhow, Context as _};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::module::context::component::{Bean, ComponentCatalog, ComponentContext};
use crate::module::context::environment::{Environment, PropertySource};
use crate::module::loader::{CodeUnit, ModuleCodeLoader, ResourceLocator};
use crate::module::registry::manifest::in_namespace;

/// A started container
pub struct Container {
    name: String,
    parent: Option<Arc<Container>>,
    environment: Environment,
    loader: Option<Arc<ModuleCodeLoader>>,
    beans: HashMap<String, Bean>,
    /// Bean names in start order
    bean_order: Vec<String>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("beans", &self.bean_order)
            .finish()
    }
}

impl Container {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Container>> {
        self.parent.as_ref()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Code-resolution scope (`None` for the host root container)
    pub fn code_loader(&self) -> Option<&Arc<ModuleCodeLoader>> {
        self.loader.as_ref()
    }

    /// Bean by name, searching this container then its parents
    pub fn bean<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.beans.get(name) {
            Some(bean) => Arc::clone(bean).downcast::<T>().ok(),
            None => self.parent.as_ref().and_then(|p| p.bean::<T>(name)),
        }
    }

    /// Whether this container itself (not a parent) holds the bean
    pub fn contains_local_bean(&self, name: &str) -> bool {
        self.beans.contains_key(name)
    }

    /// Local bean names in start order
    pub fn bean_names(&self) -> &[String] {
        &self.bean_order
    }

    /// Resource lookup bound to the module's loader
    pub fn resource(&self, name: &str) -> Option<Arc<CodeUnit>> {
        self.loader.as_ref().and_then(|l| l.load(name))
    }

    pub fn locate(&self, name: &str) -> Option<ResourceLocator> {
        self.loader.as_ref().and_then(|l| l.locate(name))
    }
}

/// Builder for root and module containers
pub struct ContainerBuilder {
    name: String,
    parent: Option<Arc<Container>>,
    environment: Environment,
    loader: Option<Arc<ModuleCodeLoader>>,
    scan_namespaces: Vec<String>,
    registrations: Vec<String>,
    prebuilt: Vec<(String, Bean)>,
}

impl ContainerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            environment: Environment::new(),
            loader: None,
            scan_namespaces: Vec::new(),
            registrations: Vec::new(),
            prebuilt: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: Arc<Container>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Bind code and resource resolution to a module loader
    pub fn code_scope(mut self, loader: Arc<ModuleCodeLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Insert a property source ahead of every other source
    pub fn property_source_first(mut self, source: PropertySource) -> Self {
        self.environment.add_first(source);
        self
    }

    /// Register every catalog component shipped by the module under `namespace`
    pub fn scan(mut self, namespace: impl Into<String>) -> Self {
        self.scan_namespaces.push(namespace.into());
        self
    }

    /// Register one component type explicitly
    pub fn register(mut self, type_name: impl Into<String>) -> Self {
        self.registrations.push(type_name.into());
        self
    }

    /// Add an already constructed bean (host services)
    pub fn bean(mut self, name: impl Into<String>, bean: Bean) -> Self {
        self.prebuilt.push((name.into(), bean));
        self
    }

    /// Component types in start order: scanned first, then explicit ones
    pub fn component_types(&self, catalog: &ComponentCatalog) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        if let Some(loader) = &self.loader {
            for namespace in &self.scan_namespaces {
                for type_name in loader.types() {
                    let package = type_name.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
                    if in_namespace(package, namespace)
                        && catalog.contains(&type_name)
                        && !types.contains(&type_name)
                    {
                        types.push(type_name);
                    }
                }
            }
        }
        for type_name in &self.registrations {
            if !types.contains(type_name) {
                types.push(type_name.clone());
            }
        }
        types
    }

    /// Instantiate every registered component and return the started container
    ///
    /// The environment inherits the parent's property sources behind its own.
    /// A component that fails or panics aborts the start.
    pub fn start(self, catalog: &ComponentCatalog) -> anyhow::Result<Container> {
        let types = self.component_types(catalog);

        let mut environment = self.environment;
        if let Some(parent) = &self.parent {
            for source in parent.environment().sources() {
                if environment.source(source.name()).is_none() {
                    environment.add_last(source.clone());
                }
            }
        }

        let mut beans: HashMap<String, Bean> = HashMap::new();
        let mut bean_order = Vec::new();
        for (name, bean) in self.prebuilt {
            if beans.insert(name.clone(), bean).is_none() {
                bean_order.push(name);
            }
        }

        for type_name in &types {
            let component = catalog
                .get(type_name)
                .ok_or_else(|| anyhow!("no component registered for type {}", type_name))?;
            let ctx = ComponentContext {
                container_name: &self.name,
                type_name,
                environment: &environment,
                loader: self.loader.as_deref(),
                parent: self.parent.as_deref(),
                beans: &beans,
            };
            let bean = match catch_unwind(AssertUnwindSafe(|| component.create(&ctx))) {
                Ok(result) => {
                    result.with_context(|| format!("component {} failed to start", type_name))?
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    return Err(anyhow!("component {} panicked: {}", type_name, message));
                }
            };
            debug!("Container {} started component {}", self.name, type_name);
            beans.insert(type_name.clone(), bean);
            bean_order.push(type_name.clone());
        }

        Ok(Container {
            name: self.name,
            parent: self.parent,
            environment,
            loader: self.loader,
            beans,
            bean_order,
        })
    }
}
