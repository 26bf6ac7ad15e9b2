//! What the host hands to the module loader

use std::sync::Arc;

use crate::module::context::component::ComponentCatalog;
use crate::module::context::container::{Container, ContainerBuilder};
use crate::module::context::environment::{Environment, EnvironmentProvider, LayeredEnvironment};
use crate::module::loader::{CodeResolver, HostResolver};

/// Host root container plus the services module bootstrapping relies on
pub struct HostContext {
    root: Arc<Container>,
    environment: Arc<dyn EnvironmentProvider>,
    catalog: ComponentCatalog,
    resolver: Arc<HostResolver>,
}

impl HostContext {
    /// Wrap an already started root container
    ///
    /// Placeholders resolve against the root's properties, then the process
    /// environment.
    pub fn new(root: Arc<Container>, catalog: ComponentCatalog) -> Self {
        let environment = Arc::new(LayeredEnvironment::new(root.environment().clone()));
        Self {
            root,
            environment,
            catalog,
            resolver: Arc::new(HostResolver::new()),
        }
    }

    /// Start a bare root container named `host` over `environment`
    pub fn from_environment(
        environment: Environment,
        catalog: ComponentCatalog,
    ) -> anyhow::Result<Self> {
        let root = ContainerBuilder::new("host")
            .environment(environment)
            .start(&catalog)?;
        Ok(Self::new(Arc::new(root), catalog))
    }

    pub fn with_environment_provider(mut self, provider: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = provider;
        self
    }

    pub fn with_resolver(mut self, resolver: HostResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn root(&self) -> &Arc<Container> {
        &self.root
    }

    pub fn environment(&self) -> &dyn EnvironmentProvider {
        self.environment.as_ref()
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    /// Last delegate of every module loader
    pub fn base_resolver(&self) -> Arc<dyn CodeResolver> {
        Arc::clone(&self.resolver) as Arc<dyn CodeResolver>
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("root", &self.root)
            .field("catalog", &self.catalog)
            .field("resolver", &self.resolver)
            .finish()
    }
}
